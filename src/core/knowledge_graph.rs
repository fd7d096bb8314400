//! # KnowledgeGraph — Armazém Central de Fatos
//!
//! O [`KnowledgeGraph`] é o dono de todas as [`Entity`]s e de um
//! **multigrafo dirigido** sobre elas. É a única porta de escrita de
//! relações: toda inserção passa por [`add_relation`](KnowledgeGraph::add_relation)
//! e é encaminhada à [`RuleNetwork`] conectada, mantendo as relações
//! derivadas consistentes.
//!
//! ## Armazenamento
//!
//! | Estrutura | Tipo | Papel |
//! |-----------|------|-------|
//! | `entities` | `HashMap<EntityId, Entity>` | arena de entidades |
//! | `nodes` | `BTreeMap<EntityId, NodeSummary>` | resumo desnormalizado por nó |
//! | `outgoing` | `sujeito → objeto → chave → Edge` | arestas |
//! | `incoming` | `objeto → {sujeitos}` | adjacência reversa |
//! | `index` | nome canônico / label / alias → ids | resolução de nomes |
//!
//! Nós são identificados por `EntityId`, nunca por referência, então ciclos
//! (`A → B → A`) não custam nada.
//!
//! ## Fluxo de uma Inserção
//!
//! ```text
//! add_relation(A, "parent", B)
//!   ├── endpoints existem?            não → GraphError::MissingEndpoint
//!   ├── predicado novo?               registra com propriedades padrão
//!   ├── aresta idêntica existe?       merge de atributos (maior confiança)
//!   ├── inverso na direção oposta?    warn + GraphWarning (não bloqueia)
//!   ├── insere aresta
//!   └── RuleNetwork::add_fact ──▶ regras disparam ──▶ store_relation ──▶ ...
//! ```
//!
//! ## Resolução de Nomes
//!
//! [`lookup`](KnowledgeGraph::lookup) tenta, nesta ordem: `id` exato, nome
//! canônico, label no idioma pedido, alias, label em qualquer idioma. Labels
//! e aliases comparam após NFC + minúsculas. Empates devolvem o menor `id`.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::entity::{clamp_confidence, Entity, EntityId};
use super::predicate::{PredicateProperties, PredicateRegistry};
use super::relation::{GraphWarning, InsertOptions, RelationAttributes, RelationRecord};
use crate::config::EngineConfig;
use crate::error::{GraphError, RuleError, SnapshotError};
use crate::inference::pattern::Fact;
use crate::inference::rete::{NetworkSnapshot, RuleNetwork};
use crate::inference::rules::{predicate_rules, Rule};

/// Grafo compartilhado: um escritor, vários leitores.
pub type SharedKnowledgeGraph = Arc<RwLock<KnowledgeGraph>>;

/// Resumo desnormalizado de uma entidade, guardado no nó do grafo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub label: String,
    pub canonical_name: String,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl NodeSummary {
    fn of(entity: &Entity, lang: &str) -> Self {
        Self {
            label: entity.display_name(lang, lang).to_string(),
            canonical_name: entity.canonical_name().to_string(),
            tags: entity.metadata.tags.iter().cloned().collect(),
            confidence: entity.confidence(),
            updated_at: entity.metadata.updated_at,
            source: entity.metadata.source.clone(),
        }
    }
}

/// Resultado de [`KnowledgeGraph::run_to_fixpoint`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceReport {
    /// Quantas vezes `run()` foi chamado.
    pub rounds: usize,
    /// Total de relações novas derivadas.
    pub derived: usize,
    /// `false` se o limite de rodadas esgotou antes do ponto fixo.
    pub converged: bool,
}

/// Estado serializável completo: entidades, arestas, predicados e
/// memórias da rede.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<RelationRecord>,
    pub predicates: Vec<PredicateProperties>,
    #[serde(default)]
    pub network: Option<NetworkSnapshot>,
    pub saved_at: DateTime<Utc>,
}

/// Resultado interno de uma escrita de relação.
#[derive(Debug)]
pub(crate) enum StoreOutcome {
    Inserted { key: String, fact: Fact },
    Merged(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Edge {
    predicate: String,
    attributes: RelationAttributes,
}

/// Índices de nomes. Reconstruídos a partir das entidades, nunca
/// serializados.
#[derive(Debug, Default)]
struct LookupIndex {
    by_name: HashMap<String, BTreeSet<EntityId>>,
    /// idioma → label normalizado → ids
    by_label: BTreeMap<String, HashMap<String, BTreeSet<EntityId>>>,
    by_alias: HashMap<String, BTreeSet<EntityId>>,
}

impl LookupIndex {
    fn insert(&mut self, entity: &Entity) {
        let id = entity.id();
        self.by_name
            .entry(entity.canonical_name().to_string())
            .or_default()
            .insert(id);
        for (lang, text) in &entity.labels {
            self.by_label
                .entry(lang.clone())
                .or_default()
                .entry(normalize(text))
                .or_default()
                .insert(id);
        }
        for alias in &entity.metadata.aliases {
            self.by_alias.entry(normalize(alias)).or_default().insert(id);
        }
    }

    fn remove(&mut self, entity: &Entity) {
        let id = entity.id();
        detach(&mut self.by_name, entity.canonical_name(), id);
        for (lang, text) in &entity.labels {
            if let Some(labels) = self.by_label.get_mut(lang) {
                detach(labels, &normalize(text), id);
                if labels.is_empty() {
                    self.by_label.remove(lang);
                }
            }
        }
        for alias in &entity.metadata.aliases {
            detach(&mut self.by_alias, &normalize(alias), id);
        }
    }

    fn canonical(&self, name: &str) -> Option<EntityId> {
        first(self.by_name.get(name))
    }

    fn label(&self, lang: &str, key: &str) -> Option<EntityId> {
        first(self.by_label.get(lang).and_then(|labels| labels.get(key)))
    }

    fn alias(&self, key: &str) -> Option<EntityId> {
        first(self.by_alias.get(key))
    }

    fn any_label(&self, key: &str) -> Option<EntityId> {
        self.by_label.values().find_map(|labels| first(labels.get(key)))
    }
}

fn detach(map: &mut HashMap<String, BTreeSet<EntityId>>, key: &str, id: EntityId) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

fn first(ids: Option<&BTreeSet<EntityId>>) -> Option<EntityId> {
    ids.and_then(|ids| ids.iter().next().copied())
}

/// Chave de comparação para labels e aliases.
fn normalize(text: &str) -> String {
    text.trim().nfc().collect::<String>().to_lowercase()
}

/// Armazém de entidades e relações com motor de regras opcional.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    config: EngineConfig,
    entities: HashMap<EntityId, Entity>,
    nodes: BTreeMap<EntityId, NodeSummary>,
    outgoing: BTreeMap<EntityId, BTreeMap<EntityId, BTreeMap<String, Edge>>>,
    incoming: BTreeMap<EntityId, BTreeSet<EntityId>>,
    edge_count: usize,
    predicates: PredicateRegistry,
    index: LookupIndex,
    engine: Option<RuleNetwork>,
    warnings: Vec<GraphWarning>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Envolve o grafo no handle compartilhado `Arc<RwLock<_>>`.
    pub fn into_shared(self) -> SharedKnowledgeGraph {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── entidades ─────────────────────────────────────────────

    /// Insere uma entidade nova ou funde com a existente de mesmo `id`.
    ///
    /// Uma entidade nunca é sobrescrita: o merge segue a política de
    /// [`Entity::merge`]. Se o nome canônico mudar, os índices são
    /// refeitos e um [`GraphWarning::IdentityConflict`] é registrado.
    pub fn add_entity(&mut self, entity: Entity) -> &Entity {
        let id = entity.id();
        let lang = self.config.default_language.as_str();
        let stored = match self.entities.entry(id) {
            Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                self.index.remove(existing);
                if let Some(old_name) = existing.merge(entity) {
                    tracing::warn!(
                        id = %id,
                        old = %old_name,
                        new = %existing.canonical_name(),
                        "Nome canônico divergente para id existente, reindexando"
                    );
                    self.warnings.push(GraphWarning::IdentityConflict {
                        id,
                        old_name,
                        new_name: existing.canonical_name().to_string(),
                    });
                }
                tracing::debug!(id = %id, "KG: entidade atualizada");
                existing
            }
            Entry::Vacant(slot) => {
                tracing::info!(id = %id, name = %entity.canonical_name(), "KG: entidade adicionada");
                slot.insert(entity)
            }
        };
        self.index.insert(stored);
        self.nodes.insert(id, NodeSummary::of(stored, lang));
        stored
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn node_summary(&self, id: EntityId) -> Option<&NodeSummary> {
        self.nodes.get(&id)
    }

    /// Altera uma entidade no lugar e refaz seus índices.
    pub fn update_entity<F>(&mut self, id: EntityId, f: F) -> Result<&Entity, GraphError>
    where
        F: FnOnce(&mut Entity),
    {
        let entity = self.entities.get_mut(&id).ok_or(GraphError::UnknownEntity(id))?;
        self.index.remove(entity);
        f(entity);
        self.index.insert(entity);
        self.nodes
            .insert(id, NodeSummary::of(entity, &self.config.default_language));
        Ok(entity)
    }

    /// Resolve um identificador textual para uma entidade.
    ///
    /// Ordem: `id` → nome canônico → label em `lang` → alias → label em
    /// qualquer idioma. O primeiro que casar vence.
    pub fn lookup(&self, identifier: &str, lang: Option<&str>) -> Option<&Entity> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        if let Ok(id) = Uuid::parse_str(identifier) {
            if let Some(entity) = self.entities.get(&id) {
                return Some(entity);
            }
        }
        let key = normalize(identifier);
        let found = self
            .index
            .canonical(identifier)
            .or_else(|| lang.and_then(|l| self.index.label(&l.trim().to_lowercase(), &key)))
            .or_else(|| self.index.alias(&key))
            .or_else(|| self.index.any_label(&key));
        match found {
            Some(id) => self.entities.get(&id),
            None => {
                tracing::debug!(identifier = %identifier, lang = ?lang, "KG: identificador não encontrado");
                None
            }
        }
    }

    // ─── predicados ────────────────────────────────────────────

    /// Registra as propriedades de um predicado (inverso bidirecional).
    pub fn define_predicate(
        &mut self,
        name: &str,
        symmetric: bool,
        inverse: Option<&str>,
        transitive: bool,
    ) -> Result<(), GraphError> {
        self.predicates
            .define(name, symmetric, inverse, transitive)
            .map(|_| ())
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateProperties> {
        self.predicates.get(name)
    }

    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    // ─── relações ──────────────────────────────────────────────

    /// Insere `subject -[predicate]-> object` com as opções padrão
    /// (deduplicação e checagem de conflito ligadas). Devolve a chave da
    /// aresta criada ou fundida.
    pub fn add_relation(
        &mut self,
        subject: EntityId,
        predicate: &str,
        object: EntityId,
        attributes: RelationAttributes,
    ) -> Result<String, GraphError> {
        self.add_relation_with(subject, predicate, object, attributes, InsertOptions::default())
    }

    /// Como [`add_relation`](Self::add_relation), com opções explícitas.
    ///
    /// # Erros
    ///
    /// [`GraphError::MissingEndpoint`] se uma das pontas não estiver no
    /// grafo; nada é inserido nesse caso.
    pub fn add_relation_with(
        &mut self,
        subject: EntityId,
        predicate: &str,
        object: EntityId,
        attributes: RelationAttributes,
        options: InsertOptions,
    ) -> Result<String, GraphError> {
        match self.store_relation(subject, predicate, object, attributes, options)? {
            StoreOutcome::Merged(key) => Ok(key),
            StoreOutcome::Inserted { key, fact } => {
                if let Some(mut engine) = self.engine.take() {
                    engine.add_fact(fact, self);
                    self.engine = Some(engine);
                }
                Ok(key)
            }
        }
    }

    /// Escrita da aresta sem encaminhar à rede. A rede usa este caminho para
    /// fatos derivados e propaga por conta própria.
    pub(crate) fn store_relation(
        &mut self,
        subject: EntityId,
        predicate: &str,
        object: EntityId,
        mut attributes: RelationAttributes,
        options: InsertOptions,
    ) -> Result<StoreOutcome, GraphError> {
        attributes.confidence = clamp_confidence(attributes.confidence);
        let predicate = predicate.trim();
        if predicate.is_empty() {
            return Err(GraphError::EmptyPredicate);
        }
        for id in [subject, object] {
            if !self.entities.contains_key(&id) {
                return Err(GraphError::MissingEndpoint(id));
            }
        }
        self.predicates.ensure(predicate);

        if options.dedupe {
            let existing = self
                .outgoing
                .get_mut(&subject)
                .and_then(|targets| targets.get_mut(&object))
                .and_then(|bundle| bundle.iter_mut().find(|(_, edge)| edge.predicate == predicate));
            if let Some((key, edge)) = existing {
                if edge.attributes.absorb(attributes) {
                    tracing::debug!(key = %key, confidence = edge.attributes.confidence, "KG: relação duplicada fundida");
                }
                return Ok(StoreOutcome::Merged(key.clone()));
            }
        }

        if options.check_conflict {
            self.check_inverse_conflict(subject, predicate, object);
        }

        let bundle = self
            .outgoing
            .entry(subject)
            .or_default()
            .entry(object)
            .or_default();
        let key = free_key(bundle, predicate);
        bundle.insert(
            key.clone(),
            Edge {
                predicate: predicate.to_string(),
                attributes,
            },
        );
        self.incoming.entry(object).or_default().insert(subject);
        self.edge_count += 1;
        tracing::debug!(
            subject = %subject,
            predicate = %predicate,
            object = %object,
            key = %key,
            "KG: relação armazenada"
        );
        Ok(StoreOutcome::Inserted {
            key,
            fact: Fact::new(subject, predicate, object),
        })
    }

    fn check_inverse_conflict(&mut self, subject: EntityId, predicate: &str, object: EntityId) {
        let inverse = match self.predicates.inverse_of(predicate) {
            Some(inv) if inv != predicate => inv.to_string(),
            _ => return,
        };
        if !self.has_relation(object, &inverse, subject) {
            return;
        }
        tracing::warn!(
            subject = %subject,
            predicate = %predicate,
            object = %object,
            inverse = %inverse,
            "Conflito potencial: relação inversa já existe, inserindo mesmo assim"
        );
        self.warnings.push(GraphWarning::InverseConflict {
            subject,
            predicate: predicate.to_string(),
            object,
            inverse,
        });
    }

    pub fn has_relation(&self, subject: EntityId, predicate: &str, object: EntityId) -> bool {
        let predicate = predicate.trim();
        self.outgoing
            .get(&subject)
            .and_then(|targets| targets.get(&object))
            .is_some_and(|bundle| bundle.values().any(|edge| edge.predicate == predicate))
    }

    /// Remove uma aresta. `key` padrão é o nome do predicado. Devolve
    /// `false` se não havia nada a remover.
    ///
    /// Fatos derivados dela permanecem: as memórias da rede são caches
    /// somente-acréscimo.
    pub fn remove_relation(
        &mut self,
        subject: EntityId,
        predicate: &str,
        object: EntityId,
        key: Option<&str>,
    ) -> bool {
        let predicate = predicate.trim();
        let key = key.map(str::trim).unwrap_or(predicate);
        let Some(targets) = self.outgoing.get_mut(&subject) else {
            return false;
        };
        let Some(bundle) = targets.get_mut(&object) else {
            return false;
        };
        match bundle.get(key) {
            Some(edge) if edge.predicate == predicate => {}
            _ => return false,
        }
        bundle.remove(key);
        if bundle.is_empty() {
            targets.remove(&object);
            if let Some(sources) = self.incoming.get_mut(&object) {
                sources.remove(&subject);
                if sources.is_empty() {
                    self.incoming.remove(&object);
                }
            }
        }
        if targets.is_empty() {
            self.outgoing.remove(&subject);
        }
        self.edge_count -= 1;
        tracing::info!(subject = %subject, key = %key, object = %object, "KG: relação removida");
        true
    }

    /// Consulta com especificação parcial. Cada `None` é um coringa.
    pub fn find_relations(
        &self,
        subject: Option<EntityId>,
        predicate: Option<&str>,
        object: Option<EntityId>,
    ) -> Vec<RelationRecord> {
        let predicate = predicate.map(str::trim);
        let mut out = Vec::new();
        let mut collect = |source: EntityId, target: EntityId, bundle: &BTreeMap<String, Edge>| {
            for (key, edge) in bundle {
                if predicate.map_or(true, |p| edge.predicate == p) {
                    out.push(RelationRecord {
                        source,
                        target,
                        key: key.clone(),
                        predicate: edge.predicate.clone(),
                        attributes: edge.attributes.clone(),
                    });
                }
            }
        };

        match (subject, object) {
            (Some(s), Some(o)) => {
                if let Some(bundle) = self.outgoing.get(&s).and_then(|targets| targets.get(&o)) {
                    collect(s, o, bundle);
                }
            }
            (Some(s), None) => {
                for (o, bundle) in self.outgoing.get(&s).into_iter().flatten() {
                    collect(s, *o, bundle);
                }
            }
            (None, Some(o)) => {
                for s in self.incoming.get(&o).into_iter().flatten() {
                    if let Some(bundle) = self.outgoing.get(s).and_then(|targets| targets.get(&o)) {
                        collect(*s, o, bundle);
                    }
                }
            }
            (None, None) => {
                for (s, targets) in &self.outgoing {
                    for (o, bundle) in targets {
                        collect(*s, *o, bundle);
                    }
                }
            }
        }
        out
    }

    /// Todas as relações como fatos distintos, em ordem estável.
    pub fn facts(&self) -> Vec<Fact> {
        let mut facts = BTreeSet::new();
        for (s, targets) in &self.outgoing {
            for (o, bundle) in targets {
                for edge in bundle.values() {
                    facts.insert(Fact::new(*s, &edge.predicate, *o));
                }
            }
        }
        facts.into_iter().collect()
    }

    pub fn relation_count(&self) -> usize {
        self.edge_count
    }

    /// Forma legível de uma relação, com nomes de exibição.
    pub fn describe_relation(&self, record: &RelationRecord) -> String {
        let lang = self.config.default_language.as_str();
        let name = |id: EntityId| {
            self.entities
                .get(&id)
                .map(|e| e.display_name(lang, lang).to_string())
                .unwrap_or_else(|| id.to_string())
        };
        format!(
            "{} -[{}]-> {} ({:.2}, {})",
            name(record.source),
            record.predicate,
            name(record.target),
            record.attributes.confidence,
            record.attributes.source.as_deref().unwrap_or("?")
        )
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<GraphWarning> {
        std::mem::take(&mut self.warnings)
    }

    // ─── motor de regras ───────────────────────────────────────

    /// Conecta uma rede de regras. Toda relação futura é encaminhada a ela,
    /// e as relações já armazenadas são reproduzidas.
    pub fn attach_rule_engine(&mut self, mut network: RuleNetwork) {
        network.set_max_depth(self.config.max_propagation_depth);
        if self.engine.take().is_some() {
            tracing::warn!("Substituindo motor de regras já conectado");
        }
        network.seed(self);
        let facts = self.facts();
        tracing::info!(
            rules = network.rules().len(),
            facts = facts.len(),
            "Motor de regras conectado"
        );
        for fact in facts {
            network.add_fact(fact, self);
        }
        self.engine = Some(network);
    }

    pub fn detach_rule_engine(&mut self) -> Option<RuleNetwork> {
        self.engine.take()
    }

    pub fn rule_engine(&self) -> Option<&RuleNetwork> {
        self.engine.as_ref()
    }

    /// Compila uma regra na rede conectada (criando uma se necessário) e a
    /// alimenta com os fatos já existentes.
    ///
    /// Devolve `false` se já havia uma regra com o mesmo nome.
    pub fn add_rule(&mut self, rule: Rule) -> Result<bool, RuleError> {
        let mut engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let mut engine = RuleNetwork::new();
                engine.set_max_depth(self.config.max_propagation_depth);
                engine
            }
        };
        let result = engine.add_rule(rule);
        if matches!(result, Ok(true)) {
            engine.seed(self);
        }
        self.engine = Some(engine);
        result
    }

    /// Adiciona as regras de simetria, inverso e transitividade dos
    /// predicados registrados. Devolve quantas eram novas.
    pub fn install_predicate_rules(&mut self) -> Result<usize, RuleError> {
        let mut added = 0;
        for rule in predicate_rules(&self.predicates) {
            if self.add_rule(rule)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Uma rodada de `run()` da rede: drena a fila pendente e devolve
    /// quantos fatos novos foram derivados desde a última rodada.
    pub fn run_inference(&mut self) -> usize {
        let Some(mut engine) = self.engine.take() else {
            return 0;
        };
        let derived = engine.run(self);
        self.engine = Some(engine);
        derived
    }

    /// Repete [`run_inference`](Self::run_inference) até zero ou até
    /// `max_rule_rounds`.
    pub fn run_to_fixpoint(&mut self) -> InferenceReport {
        let mut report = InferenceReport::default();
        if self.engine.is_none() {
            report.converged = true;
            return report;
        }
        while report.rounds < self.config.max_rule_rounds {
            let derived = self.run_inference();
            report.rounds += 1;
            report.derived += derived;
            let pending = self.engine.as_ref().map_or(0, RuleNetwork::pending_len);
            if derived == 0 && pending == 0 {
                report.converged = true;
                break;
            }
        }
        if report.converged {
            tracing::info!(rounds = report.rounds, derived = report.derived, "Ponto fixo atingido");
        } else {
            tracing::warn!(
                rounds = report.rounds,
                derived = report.derived,
                "Limite de rodadas esgotado antes do ponto fixo"
            );
        }
        report
    }

    // ─── snapshots ─────────────────────────────────────────────

    pub fn snapshot(&self) -> GraphSnapshot {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by_key(Entity::id);
        GraphSnapshot {
            entities,
            relations: self.find_relations(None, None, None),
            predicates: self.predicates.iter().cloned().collect(),
            network: self.engine.as_ref().map(RuleNetwork::snapshot),
            saved_at: Utc::now(),
        }
    }

    /// Reconstrói um grafo a partir de um snapshot.
    ///
    /// Se `network` vier com as mesmas regras (mesma ordem) do snapshot, as
    /// memórias são restauradas sem reprocessar fatos. Sem memórias no
    /// snapshot, a rede é conectada normalmente (com replay).
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        config: EngineConfig,
        network: Option<RuleNetwork>,
    ) -> Result<Self, SnapshotError> {
        let mut graph = Self::with_config(config);
        for props in snapshot.predicates {
            graph.predicates.restore(props);
        }
        for entity in snapshot.entities {
            graph.add_entity(entity);
        }
        for record in snapshot.relations {
            graph.restore_edge(record)?;
        }
        if let Some(mut network) = network {
            match &snapshot.network {
                Some(memories) => {
                    network.restore(memories)?;
                    network.set_max_depth(graph.config.max_propagation_depth);
                    graph.engine = Some(network);
                }
                None => graph.attach_rule_engine(network),
            }
        }
        tracing::info!(
            entities = graph.entity_count(),
            relations = graph.relation_count(),
            "KG: snapshot restaurado"
        );
        Ok(graph)
    }

    fn restore_edge(&mut self, record: RelationRecord) -> Result<(), GraphError> {
        for id in [record.source, record.target] {
            if !self.entities.contains_key(&id) {
                return Err(GraphError::MissingEndpoint(id));
            }
        }
        self.predicates.ensure(&record.predicate);
        let bundle = self
            .outgoing
            .entry(record.source)
            .or_default()
            .entry(record.target)
            .or_default();
        let previous = bundle.insert(
            record.key,
            Edge {
                predicate: record.predicate,
                attributes: record.attributes,
            },
        );
        if previous.is_none() {
            self.edge_count += 1;
        }
        self.incoming
            .entry(record.target)
            .or_default()
            .insert(record.source);
        Ok(())
    }
}

/// Primeira chave livre: o nome do predicado, depois `predicado#1`, ...
fn free_key(bundle: &BTreeMap<String, Edge>, predicate: &str) -> String {
    if !bundle.contains_key(predicate) {
        return predicate.to_string();
    }
    (1..)
        .map(|n| format!("{}#{}", predicate, n))
        .find(|key| !bundle.contains_key(key))
        .unwrap_or_else(|| predicate.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::component::StructuralComponent;
    use crate::core::definition::StructuralDefinition;
    use crate::core::value::Scalar;

    fn shape(kind: &str, params: Vec<Scalar>) -> StructuralDefinition {
        StructuralDefinition::single(StructuralComponent::new(kind, params).unwrap())
    }

    fn named(graph: &mut KnowledgeGraph, label: &str) -> EntityId {
        let def = shape("point", vec![Scalar::from(label)]);
        graph.add_entity(Entity::new(def).with_label("en", label)).id()
    }

    // ─── entidades ─────────────────────────────────────────────

    #[test]
    fn logically_equal_entities_share_canonical_name() {
        let mut kg = KnowledgeGraph::new();
        let a = kg
            .add_entity(Entity::new(shape("circle", vec![1.into(), 1.into(), 2.into()])))
            .id();
        let b = kg
            .add_entity(Entity::new(shape("CIRCLE", vec![1.0.into(), 1.0.into(), 2.into()])))
            .id();
        assert_ne!(a, b);
        let name = kg.entity(a).unwrap().canonical_name().to_string();
        assert_eq!(kg.entity(b).unwrap().canonical_name(), name);
        assert_eq!(kg.lookup(&name, None).unwrap().id(), a.min(b));
        assert_eq!(kg.entity_count(), 2);
    }

    #[test]
    fn lookup_resolution_order() {
        let mut kg = KnowledgeGraph::new();
        let cat = kg
            .add_entity(Entity::new(shape("point", vec![0.into(), 0.into()])).with_label("en", "Cat"))
            .id();
        let gato = kg
            .add_entity(Entity::new(shape("point", vec![1.into(), 1.into()])).with_label("pt", "Gato"))
            .id();
        kg.update_entity(gato, |e| {
            e.add_alias("kitty");
        })
        .unwrap();

        assert_eq!(kg.lookup(&cat.to_string(), None).unwrap().id(), cat);
        assert_eq!(kg.lookup(" cat ", Some("EN")).unwrap().id(), cat);
        assert_eq!(kg.lookup("KITTY", None).unwrap().id(), gato);
        assert_eq!(kg.lookup("gato", Some("fr")).unwrap().id(), gato);
        assert!(kg.lookup("dog", Some("en")).is_none());
        assert!(kg.lookup(&Uuid::new_v4().to_string(), None).is_none());
    }

    #[test]
    fn labels_match_after_unicode_normalization() {
        let mut kg = KnowledgeGraph::new();
        // "é" pré-composto vs "e" + acento combinante
        let id = kg
            .add_entity(Entity::new(StructuralDefinition::empty()).with_label("fr", "caf\u{e9}"))
            .id();
        assert_eq!(kg.lookup("CAFE\u{301}", Some("fr")).unwrap().id(), id);
    }

    #[test]
    fn reinserting_merges_instead_of_overwriting() {
        let mut kg = KnowledgeGraph::new();
        let original = Entity::new(shape("circle", vec![0.into(), 0.into(), 1.into()]))
            .with_label("en", "Ring")
            .with_confidence(0.8);
        let id = original.id();
        kg.add_entity(original.clone());

        let mut update = original.with_confidence(0.2);
        update.set_property("color", json!("gold"), Some("vision"));
        let merged = kg.add_entity(update);

        assert_eq!(merged.confidence(), 0.8);
        assert_eq!(merged.property("color"), Some(&json!("gold")));
        assert_eq!(kg.entity_count(), 1);
        assert!(kg.warnings().is_empty());
        assert_eq!(kg.node_summary(id).unwrap().source, "vision");
    }

    #[test]
    fn identity_conflict_reindexes_and_warns() {
        let mut kg = KnowledgeGraph::new();
        let entity = Entity::new(shape("circle", vec![0.into(), 0.into(), 1.into()]));
        let id = entity.id();
        let old_name = entity.canonical_name().to_string();
        kg.add_entity(entity.clone());

        let mut changed = entity;
        changed.replace_definition(shape("circle", vec![0.into(), 0.into(), 9.into()]), None);
        let new_name = changed.canonical_name().to_string();
        kg.add_entity(changed);

        assert_eq!(kg.lookup(&new_name, None).unwrap().id(), id);
        assert_eq!(kg.index.canonical(&old_name), None);
        // o nome antigo continua resolvível como alias
        assert_eq!(kg.lookup(&old_name, None).unwrap().id(), id);
        assert_eq!(
            kg.warnings(),
            [GraphWarning::IdentityConflict { id, old_name, new_name }]
        );
    }

    #[test]
    fn update_entity_refreshes_indices() {
        let mut kg = KnowledgeGraph::new();
        let id = named(&mut kg, "Old");
        kg.update_entity(id, |e| {
            e.labels.clear();
            e.metadata.aliases.clear();
            e.add_label("en", "New");
        })
        .unwrap();
        assert!(kg.lookup("old", Some("en")).is_none());
        assert_eq!(kg.lookup("new", Some("en")).unwrap().id(), id);
        assert_eq!(kg.node_summary(id).unwrap().label, "New");
        assert!(matches!(
            kg.update_entity(Uuid::new_v4(), |_| {}),
            Err(GraphError::UnknownEntity(_))
        ));
    }

    // ─── relações ──────────────────────────────────────────────

    #[test]
    fn parent_child_inverse_conflict_is_a_warning() {
        let mut kg = KnowledgeGraph::new();
        kg.define_predicate("parent", false, Some("child"), false).unwrap();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");

        kg.add_relation(a, "parent", b, RelationAttributes::default()).unwrap();
        let parents = kg.find_relations(None, Some("parent"), None);
        assert_eq!(parents.len(), 1);
        assert_eq!((parents[0].source, parents[0].target), (a, b));
        assert!(kg.warnings().is_empty());

        let key = kg.add_relation(b, "child", a, RelationAttributes::default()).unwrap();
        assert_eq!(key, "child");
        assert_eq!(kg.find_relations(Some(b), Some("child"), Some(a)).len(), 1);
        assert!(matches!(
            kg.take_warnings().as_slice(),
            [GraphWarning::InverseConflict { inverse, .. }] if inverse == "parent"
        ));
        assert!(kg.warnings().is_empty());
    }

    #[test]
    fn missing_endpoint_rejects_whole_insert() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let ghost = Uuid::new_v4();
        assert_eq!(
            kg.add_relation(a, "knows", ghost, RelationAttributes::default()),
            Err(GraphError::MissingEndpoint(ghost))
        );
        assert_eq!(kg.relation_count(), 0);
        assert!(kg.predicate("knows").is_none());
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        let attrs = RelationAttributes::default().with_confidence(0.4).with_source("user");
        kg.add_relation(a, "likes", b, attrs.clone()).unwrap();
        kg.add_relation(a, "likes", b, attrs).unwrap();
        kg.add_relation(a, "likes", b, RelationAttributes::default().with_confidence(0.7))
            .unwrap();

        let found = kg.find_relations(Some(a), Some("likes"), Some(b));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attributes.confidence, 0.7);
        assert_eq!(found[0].attributes.source.as_deref(), Some("user"));
        assert_eq!(kg.relation_count(), 1);
    }

    #[test]
    fn without_dedupe_keys_are_suffixed() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        let raw = InsertOptions { dedupe: false, check_conflict: true };
        let k0 = kg.add_relation_with(a, "met", b, RelationAttributes::default(), raw).unwrap();
        let k1 = kg.add_relation_with(a, "met", b, RelationAttributes::default(), raw).unwrap();
        assert_eq!((k0.as_str(), k1.as_str()), ("met", "met#1"));
        assert_eq!(kg.find_relations(Some(a), Some("met"), Some(b)).len(), 2);

        assert!(kg.remove_relation(a, "met", b, Some("met#1")));
        assert!(!kg.remove_relation(a, "met", b, Some("met#1")));
        assert_eq!(kg.relation_count(), 1);
    }

    #[test]
    fn undeclared_predicates_get_default_properties() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        kg.add_relation(a, " near ", b, RelationAttributes::default()).unwrap();
        assert_eq!(kg.predicate("near"), Some(&PredicateProperties::plain("near")));
    }

    #[test]
    fn find_relations_with_partial_patterns() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        let c = named(&mut kg, "C");
        for (s, p, o) in [(a, "knows", b), (a, "likes", b), (b, "knows", c), (c, "knows", a)] {
            kg.add_relation(s, p, o, RelationAttributes::default()).unwrap();
        }
        assert_eq!(kg.find_relations(Some(a), None, Some(b)).len(), 2);
        assert_eq!(kg.find_relations(Some(a), None, None).len(), 2);
        assert_eq!(kg.find_relations(None, None, Some(a)).len(), 1);
        assert_eq!(kg.find_relations(None, Some("knows"), None).len(), 3);
        assert_eq!(kg.find_relations(None, None, None).len(), 4);
        assert!(kg.find_relations(Some(b), Some("likes"), None).is_empty());
        assert_eq!(kg.facts().len(), 4);
    }

    #[test]
    fn removing_absent_relation_is_false() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        assert!(!kg.remove_relation(a, "knows", b, None));
        kg.add_relation(a, "knows", b, RelationAttributes::default()).unwrap();
        assert!(!kg.remove_relation(a, "likes", b, Some("knows")));
        assert!(kg.remove_relation(a, "knows", b, None));
        assert!(kg.find_relations(None, None, Some(b)).is_empty());
        assert_eq!(kg.relation_count(), 0);
    }

    #[test]
    fn describe_uses_display_names() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "Alice");
        let b = named(&mut kg, "Bob");
        kg.add_relation(a, "knows", b, RelationAttributes::default().with_source("user"))
            .unwrap();
        let record = &kg.find_relations(Some(a), None, None)[0];
        assert_eq!(kg.describe_relation(record), "Alice -[knows]-> Bob (1.00, user)");
    }

    // ─── snapshots ─────────────────────────────────────────────

    #[test]
    fn snapshot_round_trip_through_json() {
        let mut kg = KnowledgeGraph::new();
        kg.define_predicate("parent", false, Some("child"), false).unwrap();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        kg.add_relation(a, "parent", b, RelationAttributes::default().with_confidence(0.6))
            .unwrap();

        let json = serde_json::to_string(&kg.snapshot()).unwrap();
        let snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();
        let restored = KnowledgeGraph::from_snapshot(snapshot, EngineConfig::default(), None).unwrap();

        assert_eq!(restored.entity_count(), 2);
        assert_eq!(restored.lookup("b", Some("en")).unwrap().id(), b);
        assert_eq!(restored.predicates().inverse_of("child"), Some("parent"));
        let edges = restored.find_relations(Some(a), Some("parent"), Some(b));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].attributes.confidence, 0.6);
        assert_eq!(restored.find_relations(None, None, Some(b)).len(), 1);
    }

    #[test]
    fn snapshot_with_dangling_edge_is_rejected() {
        let mut kg = KnowledgeGraph::new();
        let a = named(&mut kg, "A");
        let b = named(&mut kg, "B");
        kg.add_relation(a, "knows", b, RelationAttributes::default()).unwrap();
        let mut snapshot = kg.snapshot();
        snapshot.entities.retain(|e| e.id() != b);
        assert!(matches!(
            KnowledgeGraph::from_snapshot(snapshot, EngineConfig::default(), None),
            Err(SnapshotError::Graph(GraphError::MissingEndpoint(id))) if id == b
        ));
    }
}
