//! # Padrões de Triplas
//!
//! Tipos básicos do casamento de padrões da rede de regras:
//!
//! - [`Fact`] — uma relação concreta `(sujeito, predicado, objeto)`
//! - [`Term`] — posição de um padrão: variável, constante ou coringa
//! - [`Pattern`] — tripla de [`Term`]s, ex: `(?x parent ?y)`
//! - [`Bindings`] — mapa variável → [`Value`] produzido pelos joins
//!
//! Todo [`Value`] é `Hash + Eq` por construção: entidades comparam por
//! `id` existencial, predicados por nome.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::entity::EntityId;

/// Valor ligável a uma variável.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Entity(EntityId),
    Symbol(String),
}

impl Value {
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Value::Entity(id) => Some(*id),
            Value::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            Value::Entity(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Entity(id) => write!(f, "#{}", &id.simple().to_string()[..8]),
            Value::Symbol(s) => f.write_str(s),
        }
    }
}

/// Mapa de variáveis ligadas (ordenado, para hash e comparação estáveis).
pub type Bindings = BTreeMap<String, Value>;

/// Posição dentro de uma tripla.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Subject,
    Predicate,
    Object,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Subject, Position::Predicate, Position::Object];
}

/// Relação concreta que entra na rede.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub subject: EntityId,
    pub predicate: String,
    pub object: EntityId,
}

impl Fact {
    pub fn new(subject: EntityId, predicate: &str, object: EntityId) -> Self {
        Self {
            subject,
            predicate: predicate.to_string(),
            object,
        }
    }

    pub fn value(&self, position: Position) -> Value {
        match position {
            Position::Subject => Value::Entity(self.subject),
            Position::Predicate => Value::Symbol(self.predicate.clone()),
            Position::Object => Value::Entity(self.object),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {})",
            self.predicate,
            Value::Entity(self.subject),
            Value::Entity(self.object)
        )
    }
}

/// Posição de um padrão.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(String),
    Constant(Value),
    /// Casa qualquer valor sem ligar variável.
    Any,
}

impl Term {
    pub fn var(name: &str) -> Self {
        Term::Variable(name.trim_start_matches('?').to_string())
    }

    pub fn entity(id: EntityId) -> Self {
        Term::Constant(Value::Entity(id))
    }

    pub fn symbol(name: &str) -> Self {
        Term::Constant(Value::Symbol(name.to_string()))
    }

    /// `?x` → variável, `_` ou `?` → coringa, qualquer outro texto → símbolo.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "_" | "?" => Term::Any,
            _ if raw.starts_with('?') => Term::var(raw),
            _ => Term::symbol(raw),
        }
    }

    pub fn variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn constant(&self) -> Option<&Value> {
        match self {
            Term::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "?{}", name),
            Term::Constant(value) => write!(f, "{}", value),
            Term::Any => f.write_str("_"),
        }
    }
}

/// Tripla de termos casada contra [`Fact`]s.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Pattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self { subject, predicate, object }
    }

    /// Atalho textual: `Pattern::parse("?x", "parent", "?y")`.
    pub fn parse(subject: &str, predicate: &str, object: &str) -> Self {
        Self::new(Term::parse(subject), Term::parse(predicate), Term::parse(object))
    }

    pub fn term(&self, position: Position) -> &Term {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }

    /// Variáveis do padrão na ordem das posições, com repetição.
    pub fn variables(&self) -> Vec<(String, Position)> {
        Position::ALL
            .iter()
            .filter_map(|&pos| self.term(pos).variable().map(|v| (v.to_string(), pos)))
            .collect()
    }

    /// Nome do predicado se ele for constante.
    pub fn predicate_name(&self) -> Option<&str> {
        self.predicate.constant().and_then(Value::as_symbol)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn terms_parse_from_text() {
        assert_eq!(Term::parse("?x"), Term::Variable("x".into()));
        assert_eq!(Term::parse("_"), Term::Any);
        assert_eq!(Term::parse(" parent "), Term::symbol("parent"));
    }

    #[test]
    fn variables_keep_position_order() {
        let p = Pattern::parse("?a", "?rel", "?a");
        assert_eq!(
            p.variables(),
            vec![
                ("a".to_string(), Position::Subject),
                ("rel".to_string(), Position::Predicate),
                ("a".to_string(), Position::Object),
            ]
        );
        assert_eq!(p.predicate_name(), None);
        assert_eq!(Pattern::parse("?a", "near", "_").predicate_name(), Some("near"));
    }

    #[test]
    fn fact_values_by_position() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let fact = Fact::new(a, "parent", b);
        assert_eq!(fact.value(Position::Subject), Value::Entity(a));
        assert_eq!(fact.value(Position::Predicate), Value::Symbol("parent".into()));
        assert_eq!(fact.value(Position::Object), Value::Entity(b));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(Pattern::parse("?x", "parent", "_").to_string(), "(?x parent _)");
    }
}
