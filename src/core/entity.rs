//! # Entity — Unidade de Conhecimento com Identidade Estável
//!
//! Uma [`Entity`] separa duas noções de identidade:
//!
//! | Identidade | Campo | Natureza |
//! |------------|-------|----------|
//! | **Existencial** | `id` (UUID v4) | imutável, atribuída na criação |
//! | **Lógica** | `canonical_name` | derivada da [`StructuralDefinition`], recalculável |
//!
//! Duas entidades são o **mesmo objeto** somente se os `id`s coincidem.
//! Duas entidades com o mesmo `canonical_name` representam o **mesmo
//! conceito**, mas podem ser instâncias distintas
//! (veja [`same_concept`](Entity::same_concept)).
//!
//! ## Nome Canônico
//!
//! ```text
//! definição não vazia  →  "shape_" + assinatura[..16]
//! definição vazia      →  "~empty_" + id completo
//! ```
//!
//! O prefixo `~` garante que entidades sem estrutura nunca colidem entre si
//! nem com nomes estruturais reais.
//!
//! ## Timestamps
//!
//! `metadata.updated_at` só avança em mudanças **autoritativas**: troca de
//! definição, alteração real de propriedade, confiança e ids externos.
//! Labels, aliases, tags e links são não-autoritativos.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::definition::StructuralDefinition;

/// Alias de tipo para o identificador existencial de uma [Entity].
pub type EntityId = Uuid;

/// Fonte padrão de uma entidade recém-criada.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Metadados de ciclo de vida e de proveniência.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Módulo ou processo que criou/atualizou a entidade por último.
    pub source: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Identificadores em bases externas (ex: `wikidata → Q146`).
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
}

impl EntityMetadata {
    fn fresh() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            source: UNKNOWN_SOURCE.to_string(),
            tags: BTreeSet::new(),
            aliases: BTreeSet::new(),
            external_ids: BTreeMap::new(),
        }
    }
}

/// Link de saída informativo. O armazenamento autoritativo de relações
/// fica no [`KnowledgeGraph`](super::KnowledgeGraph).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    pub relation: String,
    pub target: EntityId,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Unidade de conhecimento: identidade existencial + definição estrutural
/// + atributos mutáveis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    definition: StructuralDefinition,
    canonical_name: String,

    /// Nomes legíveis por idioma (`"en" → "Cat"`).
    pub labels: BTreeMap<String, String>,

    /// Propriedades dinâmicas (cor estimada, estado, etc.).
    pub properties: BTreeMap<String, serde_json::Value>,

    pub outgoing_links: Vec<EntityLink>,

    /// Confiança de reconhecimento, sempre em `[0, 1]`.
    confidence: f64,

    pub metadata: EntityMetadata,
}

impl Entity {
    /// Cria uma entidade com um `id` novo a partir de uma definição.
    pub fn new(definition: StructuralDefinition) -> Self {
        let id = Uuid::new_v4();
        let canonical_name = derive_canonical_name(id, &definition);
        let mut metadata = EntityMetadata::fresh();
        metadata.aliases.insert(canonical_name.clone());
        tracing::debug!(id = %id, name = %canonical_name, "Entidade criada");
        Self {
            id,
            definition,
            canonical_name,
            labels: BTreeMap::new(),
            properties: BTreeMap::new(),
            outgoing_links: Vec::new(),
            confidence: 1.0,
            metadata,
        }
    }

    /// Builder: adiciona um label (e o respectivo alias).
    pub fn with_label(mut self, lang: &str, text: &str) -> Self {
        self.add_label(lang, text);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.metadata.source = source.to_string();
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn definition(&self) -> &StructuralDefinition {
        &self.definition
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Substitui a definição estrutural.
    ///
    /// Se a assinatura canônica mudou, recalcula o `canonical_name`,
    /// registra-o como alias e avança `updated_at`. Caso contrário, apenas a
    /// confiança (se informada e diferente) e o timestamp são tocados.
    ///
    /// Retorna `true` se o nome canônico mudou.
    pub fn replace_definition(
        &mut self,
        definition: StructuralDefinition,
        confidence: Option<f64>,
    ) -> bool {
        if definition.canonical_signature() != self.definition.canonical_signature() {
            self.definition = definition;
            let renamed = self.refresh_canonical_name();
            if let Some(c) = confidence {
                self.confidence = clamp_confidence(c);
            }
            self.touch();
            return renamed;
        }
        if let Some(c) = confidence {
            let c = clamp_confidence(c);
            if c != self.confidence {
                self.confidence = c;
                self.touch();
            }
        }
        false
    }

    /// Define uma propriedade. Só avança o timestamp se o valor mudou.
    ///
    /// Retorna `true` se houve mudança.
    pub fn set_property(
        &mut self,
        key: &str,
        value: serde_json::Value,
        source: Option<&str>,
    ) -> bool {
        let key = key.trim();
        if key.is_empty() {
            tracing::warn!(id = %self.id, "Propriedade com chave vazia ignorada");
            return false;
        }
        if self.properties.get(key) == Some(&value) {
            return false;
        }
        self.properties.insert(key.to_string(), value);
        if let Some(src) = source {
            self.metadata.source = src.to_string();
        }
        self.touch();
        true
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key.trim())
    }

    /// Adiciona ou atualiza um label. Não avança `updated_at`.
    pub fn add_label(&mut self, lang: &str, text: &str) -> bool {
        let lang = lang.trim().to_lowercase();
        let text = text.trim();
        if lang.is_empty() || text.is_empty() {
            tracing::warn!(id = %self.id, lang = %lang, "Label vazio ignorado");
            return false;
        }
        if self.labels.get(&lang).map(String::as_str) == Some(text) {
            return false;
        }
        self.labels.insert(lang, text.to_string());
        self.metadata.aliases.insert(text.to_string());
        true
    }

    /// Adiciona um alias. Nomes já cobertos (nome canônico, labels) são
    /// ignorados.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let alias = alias.trim();
        if alias.is_empty()
            || alias == self.canonical_name
            || self.labels.values().any(|l| l == alias)
        {
            return false;
        }
        self.metadata.aliases.insert(alias.to_string())
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        !tag.is_empty() && self.metadata.tags.insert(tag.to_string())
    }

    /// Registra um id externo (`database` normalizado para minúsculas).
    pub fn add_external_id(&mut self, database: &str, external_id: &str) -> bool {
        let database = database.trim().to_lowercase();
        let external_id = external_id.trim();
        if database.is_empty() || external_id.is_empty() {
            return false;
        }
        if self.metadata.external_ids.get(&database).map(String::as_str) == Some(external_id) {
            return false;
        }
        tracing::debug!(id = %self.id, db = %database, ext = %external_id, "Id externo registrado");
        self.metadata.external_ids.insert(database, external_id.to_string());
        self.touch();
        true
    }

    /// Anexa um link informativo. Ignora duplicatas (mesma relação e alvo).
    pub fn add_link(
        &mut self,
        relation: &str,
        target: EntityId,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> bool {
        let relation = relation.trim();
        if relation.is_empty() {
            tracing::warn!(id = %self.id, "Link com relação vazia ignorado");
            return false;
        }
        if self
            .outgoing_links
            .iter()
            .any(|l| l.relation == relation && l.target == target)
        {
            return false;
        }
        self.outgoing_links.push(EntityLink {
            relation: relation.to_string(),
            target,
            attributes,
            created_at: Utc::now(),
        });
        true
    }

    /// Links de saída, opcionalmente filtrados por relação.
    pub fn links<'a>(&'a self, relation: Option<&'a str>) -> impl Iterator<Item = &'a EntityLink> + 'a {
        self.outgoing_links
            .iter()
            .filter(move |l| relation.map_or(true, |r| l.relation == r.trim()))
    }

    /// Nome de exibição: label no idioma pedido, senão no idioma de
    /// fallback, senão o nome canônico.
    pub fn display_name(&self, lang: &str, fallback_lang: &str) -> &str {
        let lang = lang.trim().to_lowercase();
        let fallback = fallback_lang.trim().to_lowercase();
        self.labels
            .get(&lang)
            .or_else(|| self.labels.get(&fallback))
            .map(String::as_str)
            .unwrap_or(&self.canonical_name)
    }

    /// `true` se as duas entidades representam o mesmo conceito lógico.
    pub fn same_concept(&self, other: &Entity) -> bool {
        self.canonical_name == other.canonical_name
    }

    /// Incorpora uma versão mais nova da mesma entidade (mesmo `id`).
    ///
    /// Política de merge:
    ///
    /// | Campo | Regra |
    /// |-------|-------|
    /// | definição | a nova vence |
    /// | labels / propriedades | a nova sobrescreve por chave |
    /// | confiança | máximo das duas |
    /// | `source` | a nova vence, exceto `"unknown"` |
    /// | aliases / tags / links | união |
    /// | ids externos | união, a nova vence por chave |
    /// | `created_at` | preserva o existente |
    ///
    /// Retorna o nome canônico anterior se ele mudou.
    pub(crate) fn merge(&mut self, incoming: Entity) -> Option<String> {
        let old_name = self.canonical_name.clone();
        let renamed = self.replace_definition(incoming.definition, None);

        for (lang, text) in &incoming.labels {
            self.add_label(lang, text);
        }
        let mut changed = false;
        for (key, value) in incoming.properties {
            if self.properties.get(&key) != Some(&value) {
                self.properties.insert(key, value);
                changed = true;
            }
        }
        if incoming.confidence > self.confidence {
            self.confidence = incoming.confidence;
            changed = true;
        }
        if incoming.metadata.source != UNKNOWN_SOURCE && incoming.metadata.source != self.metadata.source {
            self.metadata.source = incoming.metadata.source;
            changed = true;
        }
        self.metadata.aliases.extend(incoming.metadata.aliases);
        self.metadata.tags.extend(incoming.metadata.tags);
        for (db, ext) in incoming.metadata.external_ids {
            if self.metadata.external_ids.get(&db) != Some(&ext) {
                self.metadata.external_ids.insert(db, ext);
                changed = true;
            }
        }
        for link in incoming.outgoing_links {
            self.add_link(&link.relation, link.target, link.attributes);
        }
        if changed {
            self.touch();
        }

        renamed.then_some(old_name)
    }

    /// Recalcula o nome canônico. Retorna `true` se ele mudou.
    fn refresh_canonical_name(&mut self) -> bool {
        let name = derive_canonical_name(self.id, &self.definition);
        if name == self.canonical_name {
            return false;
        }
        tracing::debug!(
            id = %self.id,
            old = %self.canonical_name,
            new = %name,
            "Nome canônico atualizado"
        );
        self.metadata.aliases.insert(name.clone());
        self.canonical_name = name;
        true
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn derive_canonical_name(id: EntityId, definition: &StructuralDefinition) -> String {
    if definition.is_empty() {
        format!("~empty_{}", id.simple())
    } else {
        let signature = definition.canonical_signature();
        format!("shape_{}", &signature[..16])
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
