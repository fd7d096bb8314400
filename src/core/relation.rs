//! # Relações — Arestas do Grafo de Conhecimento
//!
//! Cada relação é uma aresta dirigida `sujeito -[predicado]-> objeto`
//! identificada por `(sujeito, objeto, chave)`. A chave é o próprio nome do
//! predicado; inserções sem deduplicação ganham chaves `predicado#n`.
//!
//! ```text
//!   A ──parent──▶ B ──parent──▶ C
//!   │                           ▲
//!   └────────grandparent────────┘   (derivada: source = "infer:grandparent")
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{clamp_confidence, EntityId};

/// Atributos de uma aresta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationAttributes {
    pub confidence: f64,
    /// Origem da relação (`"user"`, `"infer:<regra>"`, ...).
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for RelationAttributes {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            source: None,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }
}

impl RelationAttributes {
    /// Confiança limitada a `[0, 1]`; `NaN` vira `0`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Política de duplicatas: a maior confiança vence e leva junto sua
    /// fonte e timestamp. Metadados são unidos.
    ///
    /// Retorna `true` se algo mudou.
    pub(crate) fn absorb(&mut self, incoming: RelationAttributes) -> bool {
        let mut changed = false;
        if incoming.confidence > self.confidence {
            self.confidence = incoming.confidence;
            if incoming.source.is_some() {
                self.source = incoming.source;
            }
            self.timestamp = incoming.timestamp;
            changed = true;
        }
        for (key, value) in incoming.metadata {
            if !self.metadata.contains_key(&key) {
                self.metadata.insert(key, value);
                changed = true;
            }
        }
        changed
    }
}

/// Descritor de relação devolvido pelas consultas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub source: EntityId,
    pub target: EntityId,
    pub key: String,
    pub predicate: String,
    pub attributes: RelationAttributes,
}

impl fmt::Display for RelationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}]-> {} ({:.2})",
            self.source, self.predicate, self.target, self.attributes.confidence
        )
    }
}

/// Opções de [`add_relation_with`](super::KnowledgeGraph::add_relation_with).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertOptions {
    /// Funde com uma aresta idêntica existente em vez de duplicar.
    pub dedupe: bool,
    /// Verifica se o inverso já existe na direção oposta.
    pub check_conflict: bool,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            dedupe: true,
            check_conflict: true,
        }
    }
}

/// Anomalias não fatais retidas pelo grafo além do log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GraphWarning {
    /// `subject -[predicate]-> object` inserida enquanto
    /// `object -[inverse]-> subject` já existia.
    InverseConflict {
        subject: EntityId,
        predicate: String,
        object: EntityId,
        inverse: String,
    },
    /// Um `id` existente foi reinserido com outro nome canônico.
    IdentityConflict {
        id: EntityId,
        old_name: String,
        new_name: String,
    },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::InverseConflict { subject, predicate, object, inverse } => write!(
                f,
                "conflito potencial: {subject} -[{predicate}]-> {object} com inverso {object} -[{inverse}]-> {subject} já presente"
            ),
            GraphWarning::IdentityConflict { id, old_name, new_name } => {
                write!(f, "entidade {id} mudou de nome canônico: {old_name} → {new_name}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_confidence_wins() {
        let mut stored = RelationAttributes::default().with_confidence(0.5).with_source("a");
        assert!(!stored.absorb(RelationAttributes::default().with_confidence(0.4).with_source("b")));
        assert_eq!(stored.source.as_deref(), Some("a"));

        assert!(stored.absorb(RelationAttributes::default().with_confidence(0.8).with_source("c")));
        assert_eq!(stored.confidence, 0.8);
        assert_eq!(stored.source.as_deref(), Some("c"));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(RelationAttributes::default().with_confidence(f64::NAN).confidence, 0.0);
        assert_eq!(RelationAttributes::default().with_confidence(f64::INFINITY).confidence, 1.0);
        assert_eq!(RelationAttributes::default().with_confidence(-3.0).confidence, 0.0);
    }

    #[test]
    fn metadata_is_unioned_without_overwrite() {
        let mut stored = RelationAttributes::default().with_metadata("k", serde_json::json!(1));
        let incoming = RelationAttributes::default()
            .with_metadata("k", serde_json::json!(2))
            .with_metadata("z", serde_json::json!(3));
        assert!(stored.absorb(incoming));
        assert_eq!(stored.metadata["k"], serde_json::json!(1));
        assert_eq!(stored.metadata["z"], serde_json::json!(3));
    }
}
