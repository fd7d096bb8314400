//! # Módulo Inference — Regras e Rede Rete
//!
//! Encadeamento progressivo sobre as relações do
//! [`KnowledgeGraph`](crate::core::KnowledgeGraph).
//!
//! ```text
//! add_relation ──▶ RuleNetwork::add_fact ──▶ Alpha ──▶ Beta ──▶ Terminal
//!      ▲                                                           │
//!      └──────────────── Derivation (store_relation) ◀─────────────┘
//! ```
//!
//! - [`pattern`] — fatos, termos, padrões e ligações
//! - [`rules`] — regras, ações e as regras implícitas dos predicados
//! - [`rete`] — a rede compilada e suas memórias

pub mod pattern;
pub mod rete;
pub mod rules;

pub use pattern::{Bindings, Fact, Pattern, Position, Term, Value};
pub use rete::{NetworkSnapshot, NetworkStats, RuleNetwork};
pub use rules::{predicate_rules, Derivation, Derive, Rule, RuleAction};
