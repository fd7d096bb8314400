//! # Regras de Produção
//!
//! Uma [`Rule`] é um registro de dados: um nome, uma lista ordenada de
//! [`Pattern`]s (as premissas) e uma [`RuleAction`] chamada com as
//! variáveis ligadas quando todas as premissas casam.
//!
//! ```text
//! grandparent:  (?x parent ?y) ∧ (?y parent ?z)  ⇒  (?x grandparent ?z)
//!               ─────────── premissas ─────────      ──── conclusão ────
//! ```
//!
//! A ação **não** escreve no grafo: ela devolve [`Derivation`]s, que a
//! rede insere pelo caminho normal de inserção e propaga de volta.
//!
//! ## Regras de Propriedades de Predicado
//!
//! [`predicate_rules`] converte as flags do [`PredicateRegistry`] em regras
//! comuns. A dedução clássica `S→M ∧ M→P ⊢ S→P` é a regra de
//! transitividade:
//!
//! | Flag | Regra | Padrões |
//! |------|-------|---------|
//! | `symmetric` | `sym:p` | `(?a p ?b) ⇒ (?b p ?a)` |
//! | `inverse = q` | `inv:p` | `(?a p ?b) ⇒ (?b q ?a)` |
//! | `transitive` | `trans:p` | `(?a p ?b) ∧ (?b p ?c) ⇒ (?a p ?c)` |

use std::fmt;
use std::sync::Arc;

use crate::core::entity::EntityId;
use crate::core::predicate::PredicateRegistry;
use crate::core::relation::RelationAttributes;
use crate::core::KnowledgeGraph;
use crate::error::RuleError;

use super::pattern::{Bindings, Pattern, Term, Value};

/// Confiança padrão das relações derivadas por [`Derive`].
pub const DEFAULT_DERIVED_CONFIDENCE: f64 = 0.9;

/// Nova relação proposta por uma ação de regra.
#[derive(Clone, Debug, PartialEq)]
pub struct Derivation {
    pub subject: EntityId,
    pub predicate: String,
    pub object: EntityId,
    pub attributes: RelationAttributes,
}

/// Ação disparada por um nó terminal com um conjunto completo de ligações.
///
/// O grafo é passado por referência imutável: a ação consulta, mas toda
/// escrita passa pelas [`Derivation`]s devolvidas.
pub trait RuleAction: Send + Sync {
    fn apply(&self, bindings: &Bindings, graph: &KnowledgeGraph) -> Result<Vec<Derivation>, RuleError>;
}

impl<F> RuleAction for F
where
    F: Fn(&Bindings, &KnowledgeGraph) -> Result<Vec<Derivation>, RuleError> + Send + Sync,
{
    fn apply(&self, bindings: &Bindings, graph: &KnowledgeGraph) -> Result<Vec<Derivation>, RuleError> {
        self(bindings, graph)
    }
}

/// Regra de produção: premissas + ação.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub patterns: Vec<Pattern>,
    pub action: Arc<dyn RuleAction>,
}

impl Rule {
    pub fn new(name: &str, patterns: Vec<Pattern>, action: impl RuleAction + 'static) -> Self {
        Self {
            name: name.trim().to_string(),
            patterns,
            action: Arc::new(action),
        }
    }

    /// Regra declarativa cujas conclusões são padrões instanciados com as
    /// ligações.
    pub fn derive(name: &str, patterns: Vec<Pattern>, conclusions: Vec<Pattern>) -> Self {
        let action = Derive::new(name, conclusions);
        Self::new(name, patterns, action)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let premises: Vec<String> = self.patterns.iter().map(|p| p.to_string()).collect();
        write!(f, "{}: {}", self.name, premises.join(" ∧ "))
    }
}

/// Ação declarativa: instancia cada padrão de conclusão.
#[derive(Clone, Debug)]
pub struct Derive {
    rule: String,
    conclusions: Vec<Pattern>,
    confidence: f64,
}

impl Derive {
    pub fn new(rule: &str, conclusions: Vec<Pattern>) -> Self {
        Self {
            rule: rule.trim().to_string(),
            conclusions,
            confidence: DEFAULT_DERIVED_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    fn entity(&self, term: &Term, bindings: &Bindings) -> Result<EntityId, RuleError> {
        match self.resolve(term, bindings)? {
            Value::Entity(id) => Ok(id),
            Value::Symbol(s) => Err(self.unresolved(format!("'{}' não é uma entidade", s))),
        }
    }

    fn resolve(&self, term: &Term, bindings: &Bindings) -> Result<Value, RuleError> {
        match term {
            Term::Constant(value) => Ok(value.clone()),
            Term::Variable(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| self.unresolved(format!("?{} não está ligada", name))),
            Term::Any => Err(self.unresolved("coringa em conclusão".to_string())),
        }
    }

    fn unresolved(&self, detail: String) -> RuleError {
        RuleError::UnresolvedConclusion {
            rule: self.rule.clone(),
            detail,
        }
    }
}

impl RuleAction for Derive {
    fn apply(&self, bindings: &Bindings, _graph: &KnowledgeGraph) -> Result<Vec<Derivation>, RuleError> {
        self.conclusions
            .iter()
            .map(|conclusion| {
                let predicate = match self.resolve(&conclusion.predicate, bindings)? {
                    Value::Symbol(name) => name,
                    Value::Entity(id) => {
                        return Err(self.unresolved(format!("entidade {} usada como predicado", id)))
                    }
                };
                Ok(Derivation {
                    subject: self.entity(&conclusion.subject, bindings)?,
                    predicate,
                    object: self.entity(&conclusion.object, bindings)?,
                    attributes: RelationAttributes::default().with_confidence(self.confidence),
                })
            })
            .collect()
    }
}

/// Gera as regras implícitas nas propriedades dos predicados registrados.
///
/// Relações de simetria e inverso são definicionais (confiança 1.0).
/// Um predicado que é seu próprio inverso gera apenas a regra simétrica.
/// O resultado é ordenado por nome.
pub fn predicate_rules(registry: &PredicateRegistry) -> Vec<Rule> {
    let mut rules = Vec::new();
    for props in registry.iter() {
        let p = props.name.as_str();
        let self_inverse = props.inverse.as_deref() == Some(p);

        if props.symmetric || self_inverse {
            rules.push(definitional(
                &format!("sym:{}", p),
                vec![Pattern::parse("?a", p, "?b")],
                Pattern::parse("?b", p, "?a"),
            ));
        }
        if let Some(q) = props.inverse.as_deref().filter(|_| !self_inverse) {
            rules.push(definitional(
                &format!("inv:{}", p),
                vec![Pattern::parse("?a", p, "?b")],
                Pattern::parse("?b", q, "?a"),
            ));
        }
        if props.transitive {
            rules.push(definitional(
                &format!("trans:{}", p),
                vec![Pattern::parse("?a", p, "?b"), Pattern::parse("?b", p, "?c")],
                Pattern::parse("?a", p, "?c"),
            ));
        }
    }
    rules.sort_by(|a, b| a.name.cmp(&b.name));
    rules
}

fn definitional(name: &str, patterns: Vec<Pattern>, conclusion: Pattern) -> Rule {
    let action = Derive::new(name, vec![conclusion]).with_confidence(1.0);
    Rule::new(name, patterns, action)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn bind(pairs: &[(&str, Value)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    // ─── Derive ────────────────────────────────────────────────

    #[test]
    fn derive_instantiates_conclusions() {
        let (a, c) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = Rule::derive(
            "grandparent",
            vec![Pattern::parse("?x", "parent", "?y"), Pattern::parse("?y", "parent", "?z")],
            vec![Pattern::parse("?x", "grandparent", "?z")],
        );
        let graph = KnowledgeGraph::new();
        let out = rule
            .action
            .apply(&bind(&[("x", Value::Entity(a)), ("z", Value::Entity(c))]), &graph)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].subject, out[0].predicate.as_str(), out[0].object), (a, "grandparent", c));
        assert_eq!(out[0].attributes.confidence, DEFAULT_DERIVED_CONFIDENCE);
    }

    #[test]
    fn derive_reports_unbound_variables() {
        let action = Derive::new("broken", vec![Pattern::parse("?x", "rel", "?missing")]);
        let graph = KnowledgeGraph::new();
        let err = action
            .apply(&bind(&[("x", Value::Entity(Uuid::new_v4()))]), &graph)
            .unwrap_err();
        assert!(matches!(err, RuleError::UnresolvedConclusion { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn derive_accepts_predicate_variables() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let action = Derive::new("flip", vec![Pattern::parse("?o", "?p", "?s")]);
        let graph = KnowledgeGraph::new();
        let out = action
            .apply(
                &bind(&[
                    ("s", Value::Entity(a)),
                    ("p", Value::Symbol("near".into())),
                    ("o", Value::Entity(b)),
                ]),
                &graph,
            )
            .unwrap();
        assert_eq!((out[0].subject, out[0].predicate.as_str(), out[0].object), (b, "near", a));
    }

    #[test]
    fn closures_are_actions() {
        let rule = Rule::new(
            "noop",
            vec![Pattern::parse("?a", "x", "?b")],
            |_: &Bindings, _: &KnowledgeGraph| -> Result<Vec<Derivation>, RuleError> { Ok(Vec::new()) },
        );
        assert!(rule.action.apply(&Bindings::new(), &KnowledgeGraph::new()).unwrap().is_empty());
        assert_eq!(rule.to_string(), "noop: (?a x ?b)");
    }

    // ─── predicate_rules ───────────────────────────────────────

    #[test]
    fn registry_flags_become_rules() {
        let mut reg = PredicateRegistry::new();
        reg.define("parent", false, Some("child"), false).unwrap();
        reg.define("near", true, None, false).unwrap();
        reg.define("ancestor", false, None, true).unwrap();
        reg.define("spouse", false, Some("spouse"), false).unwrap();

        let names: Vec<String> = predicate_rules(&reg).into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["inv:child", "inv:parent", "sym:near", "sym:spouse", "trans:ancestor"]
        );
    }

    #[test]
    fn transitive_rule_has_two_premises() {
        let mut reg = PredicateRegistry::new();
        reg.define("part_of", false, None, true).unwrap();
        let rules = predicate_rules(&reg);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].patterns.len(), 2);
    }
}
