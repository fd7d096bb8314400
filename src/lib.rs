//! # omni-kb — Grafo de Conhecimento com Inferência Rete
//!
//! Armazém de conhecimento em que cada [`Entity`](core::Entity) tem duas
//! identidades (existencial e canônica), relações tipadas formam um
//! multigrafo dirigido, e uma rede Rete deriva novas relações
//! incrementalmente a cada inserção.
//!
//! ## Camadas
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ persistence   snapshot JSON com escrita atômica      │
//! ├──────────────────────────────────────────────────────┤
//! │ inference     Pattern → Rule → RuleNetwork (Rete)    │
//! ├──────────────────────────────────────────────────────┤
//! │ core          Scalar → Component → Definition        │
//! │               Entity, PredicateRegistry, Graph       │
//! ├──────────────────────────────────────────────────────┤
//! │ config, error                                        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exemplo
//!
//! ```rust
//! use omni_kb::core::{Entity, KnowledgeGraph, RelationAttributes, StructuralDefinition};
//! use omni_kb::inference::{Pattern, Rule};
//!
//! let mut kg = KnowledgeGraph::new();
//! let ids: Vec<_> = ["Ana", "Bia", "Caio"]
//!     .iter()
//!     .map(|name| kg.add_entity(Entity::new(StructuralDefinition::empty()).with_label("pt", name)).id())
//!     .collect();
//!
//! kg.add_rule(Rule::derive(
//!     "grandparent",
//!     vec![Pattern::parse("?x", "parent", "?y"), Pattern::parse("?y", "parent", "?z")],
//!     vec![Pattern::parse("?x", "grandparent", "?z")],
//! ))
//! .unwrap();
//!
//! kg.add_relation(ids[0], "parent", ids[1], RelationAttributes::default()).unwrap();
//! kg.add_relation(ids[1], "parent", ids[2], RelationAttributes::default()).unwrap();
//! assert!(kg.has_relation(ids[0], "grandparent", ids[2]));
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod inference;
pub mod persistence;

pub use crate::config::EngineConfig;
pub use crate::core::{Entity, EntityId, KnowledgeGraph, SharedKnowledgeGraph};
pub use crate::error::{ConstructionError, GraphError, RuleError, SnapshotError};
pub use crate::inference::{Rule, RuleNetwork};
