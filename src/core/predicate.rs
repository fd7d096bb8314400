//! # Predicados — Tipos de Relação e suas Propriedades
//!
//! Um predicado é o nome de uma relação (`parent`, `part_of`, `near`)
//! acompanhado de três propriedades lógicas:
//!
//! | Propriedade | Significado | Regra derivada |
//! |-------------|-------------|----------------|
//! | `symmetric` | `p(a,b) ⇒ p(b,a)` | `sym:p` |
//! | `inverse` | `p(a,b) ⇒ q(b,a)` | `inv:p` |
//! | `transitive` | `p(a,b) ∧ p(b,c) ⇒ p(a,c)` | `trans:p` |
//!
//! O [`PredicateRegistry`] garante a **consistência bidirecional** dos
//! inversos na escrita: declarar `parent ↔ child` também grava
//! `child.inverse = parent`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Propriedades declaradas de um predicado.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateProperties {
    pub name: String,
    #[serde(default)]
    pub symmetric: bool,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub transitive: bool,
}

impl PredicateProperties {
    /// Propriedades padrão: não simétrico, sem inverso, não transitivo.
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Registro de predicados indexado por nome.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, PredicateProperties>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (ou redefine) um predicado.
    ///
    /// Se `inverse` for informado, o predicado inverso é criado com
    /// propriedades padrão quando necessário e aponta de volta para `name`.
    /// Parceiros antigos que ainda apontavam para um dos dois têm o
    /// ponteiro limpo.
    pub fn define(
        &mut self,
        name: &str,
        symmetric: bool,
        inverse: Option<&str>,
        transitive: bool,
    ) -> Result<&PredicateProperties, GraphError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GraphError::EmptyPredicate);
        }
        let inverse = inverse.map(str::trim).filter(|inv| !inv.is_empty());

        let previous_inverse = self.predicates.get(name).and_then(|p| p.inverse.clone());
        if let Some(old) = previous_inverse {
            if Some(old.as_str()) != inverse {
                self.clear_inverse_of(&old, name);
            }
        }

        if let Some(inv) = inverse {
            if inv != name {
                let partner = self
                    .predicates
                    .entry(inv.to_string())
                    .or_insert_with(|| PredicateProperties::plain(inv));
                let stale = partner.inverse.replace(name.to_string());
                if let Some(stale) = stale.filter(|s| s != name) {
                    self.clear_inverse_of(&stale, inv);
                }
                tracing::debug!(predicate = %inv, inverse = %name, "Inverso sincronizado");
            }
        }

        tracing::info!(
            predicate = %name,
            symmetric,
            inverse = ?inverse,
            transitive,
            "Predicado definido"
        );
        let props = PredicateProperties {
            name: name.to_string(),
            symmetric,
            inverse: inverse.map(str::to_string),
            transitive,
        };
        self.predicates.insert(name.to_string(), props);
        self.predicates.get(name).ok_or(GraphError::EmptyPredicate)
    }

    /// Garante que o predicado existe, registrando-o com propriedades
    /// padrão se for novo. Retorna `true` se foi criado.
    pub fn ensure(&mut self, name: &str) -> bool {
        if self.predicates.contains_key(name) {
            return false;
        }
        tracing::warn!(predicate = %name, "Predicado não declarado, registrado com propriedades padrão");
        self.predicates
            .insert(name.to_string(), PredicateProperties::plain(name));
        true
    }

    /// Reinsere propriedades já consistentes (carga de snapshot).
    pub(crate) fn restore(&mut self, props: PredicateProperties) {
        self.predicates.insert(props.name.clone(), props);
    }

    pub fn get(&self, name: &str) -> Option<&PredicateProperties> {
        self.predicates.get(name.trim())
    }

    pub fn inverse_of(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|p| p.inverse.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredicateProperties> {
        self.predicates.values()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Remove `partner` como inverso de `name`, se ainda for o caso.
    fn clear_inverse_of(&mut self, name: &str, partner: &str) {
        if let Some(props) = self.predicates.get_mut(name) {
            if props.inverse.as_deref() == Some(partner) {
                props.inverse = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_is_bidirectional() {
        let mut reg = PredicateRegistry::new();
        reg.define("parent", false, Some("child"), false).unwrap();
        assert_eq!(reg.inverse_of("parent"), Some("child"));
        assert_eq!(reg.inverse_of("child"), Some("parent"));
        assert!(!reg.get("child").unwrap().transitive);
    }

    #[test]
    fn redefining_inverse_clears_stale_partner() {
        let mut reg = PredicateRegistry::new();
        reg.define("owns", false, Some("owned_by"), false).unwrap();
        reg.define("owns", false, Some("belongs_to"), false).unwrap();
        assert_eq!(reg.inverse_of("owned_by"), None);
        assert_eq!(reg.inverse_of("belongs_to"), Some("owns"));

        // o parceiro troca de par: "owns" perde o inverso
        reg.define("belongs_to", false, Some("held_by"), false).unwrap();
        assert_eq!(reg.inverse_of("owns"), None);
        assert_eq!(reg.inverse_of("held_by"), Some("belongs_to"));
    }

    #[test]
    fn partner_stealing_clears_old_pair() {
        let mut reg = PredicateRegistry::new();
        reg.define("a", false, Some("b"), false).unwrap();
        reg.define("c", false, Some("b"), false).unwrap();
        assert_eq!(reg.inverse_of("b"), Some("c"));
        assert_eq!(reg.inverse_of("a"), None);
    }

    #[test]
    fn self_inverse_and_empty_names() {
        let mut reg = PredicateRegistry::new();
        reg.define("married_to", true, Some("married_to"), false).unwrap();
        assert_eq!(reg.inverse_of("married_to"), Some("married_to"));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.define("  ", false, None, false).unwrap_err(),
            GraphError::EmptyPredicate
        );
    }

    #[test]
    fn ensure_only_creates_once() {
        let mut reg = PredicateRegistry::new();
        assert!(reg.ensure("near"));
        assert!(!reg.ensure("near"));
        assert_eq!(reg.get("near"), Some(&PredicateProperties::plain("near")));
    }
}
