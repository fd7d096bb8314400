//! # Módulo Core — Conhecimento Estrutural
//!
//! Tipos que descrevem **o que existe** e **como se relaciona**:
//!
//! | Tipo | Papel |
//! |------|-------|
//! | [`Scalar`] | parâmetro numérico, booleano ou textual |
//! | [`StructuralComponent`] | primitiva com parâmetros, faixa e estilo |
//! | [`StructuralDefinition`] | componentes combinados por operadores |
//! | [`Entity`] | identidade existencial + definição + metadados |
//! | [`PredicateRegistry`] | propriedades lógicas dos predicados |
//! | [`KnowledgeGraph`] | entidades + multigrafo de relações |
//!
//! ## Duas Identidades
//!
//! ```text
//! Entity
//!   ├── id              (uuid v4, existencial, nunca muda)
//!   └── canonical_name  ("shape_" + 16 hex do SHA-256 da definição)
//! ```
//!
//! Duas entidades com definições logicamente iguais compartilham o
//! `canonical_name` mas continuam sendo entidades distintas.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use omni_kb::core::{Entity, KnowledgeGraph, RelationAttributes, StructuralDefinition};
//!
//! let mut kg = KnowledgeGraph::new();
//! kg.define_predicate("parent", false, Some("child"), false).unwrap();
//!
//! let a = kg.add_entity(Entity::new(StructuralDefinition::empty()).with_label("en", "Ada")).id();
//! let b = kg.add_entity(Entity::new(StructuralDefinition::empty()).with_label("en", "Byron")).id();
//! kg.add_relation(a, "parent", b, RelationAttributes::default()).unwrap();
//!
//! assert_eq!(kg.lookup("ada", Some("en")).map(|e| e.id()), Some(a));
//! ```

pub mod component;
pub mod definition;
pub mod entity;
pub mod knowledge_graph;
pub mod predicate;
pub mod relation;
pub mod value;

pub use component::{ComponentCategory, ComponentKind, StructuralComponent};
pub use definition::StructuralDefinition;
pub use entity::{Entity, EntityId, EntityLink, EntityMetadata};
pub use knowledge_graph::{GraphSnapshot, InferenceReport, KnowledgeGraph, NodeSummary, SharedKnowledgeGraph};
pub use predicate::{PredicateProperties, PredicateRegistry};
pub use relation::{GraphWarning, InsertOptions, RelationAttributes, RelationRecord};
pub use value::Scalar;
