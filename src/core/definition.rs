//! # StructuralDefinition — Composição Canônica de Componentes
//!
//! Uma [`StructuralDefinition`] é uma sequência ordenada de
//! [`StructuralComponent`]s unidos por operadores binários:
//!
//! ```text
//! circle(0,0,1)  +  line(0,0,1,1)  *  color("red")
//!      c0       op0      c1       op1      c2
//! ```
//!
//! Invariante: `operators.len() == max(0, components.len() - 1)`.
//!
//! ## Assinatura Canônica
//!
//! A assinatura é o **SHA-256 (hex, 64 caracteres)** da concatenação das
//! assinaturas dos componentes intercaladas com tokens de operador
//! explicitamente marcados:
//!
//! ```text
//! sig(c0) || OPERATOR("+") || sig(c1) || OPERATOR("*") || sig(c2)
//! ```
//!
//! A definição vazia tem um valor sentinela fixo. Igualdade e hash
//! passam **somente** pela assinatura.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::component::{StructuralComponent, DEFAULT_PRECISION};
use crate::error::ConstructionError;

/// Conteúdo hasheado para a definição vazia.
const EMPTY_SENTINEL: &str = "__EMPTY_STRUCTURAL_DEFINITION__";

/// Operador usado por [`StructuralDefinition::push`].
pub const DEFAULT_OPERATOR: &str = "+";

/// Composição ordenada de componentes estruturais.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StructuralDefinition {
    components: Vec<StructuralComponent>,
    operators: Vec<String>,
}

impl StructuralDefinition {
    /// Definição vazia (assinatura sentinela).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cria uma definição validando a contagem de operadores.
    ///
    /// # Erros
    ///
    /// - [`ConstructionError::OperatorCountMismatch`] se
    ///   `operators.len() != max(0, components.len() - 1)`
    /// - [`ConstructionError::EmptyOperator`] se algum operador for vazio
    pub fn new(
        components: Vec<StructuralComponent>,
        operators: Vec<String>,
    ) -> Result<Self, ConstructionError> {
        let def = Self {
            components,
            operators: operators.into_iter().map(|op| op.trim().to_string()).collect(),
        };
        def.validate()?;
        Ok(def)
    }

    /// Definição de um único componente.
    pub fn single(component: StructuralComponent) -> Self {
        Self {
            components: vec![component],
            operators: Vec::new(),
        }
    }

    /// Anexa um componente. O operador só é registrado se já houver um
    /// componente anterior.
    pub fn add(
        &mut self,
        component: StructuralComponent,
        operator: &str,
    ) -> Result<&mut Self, ConstructionError> {
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(ConstructionError::EmptyOperator);
        }
        if !self.components.is_empty() {
            self.operators.push(operator.to_string());
        }
        self.components.push(component);
        Ok(self)
    }

    /// Variante consumidora de [`add`](Self::add) com o operador `+`.
    pub fn push(mut self, component: StructuralComponent) -> Self {
        if !self.components.is_empty() {
            self.operators.push(DEFAULT_OPERATOR.to_string());
        }
        self.components.push(component);
        self
    }

    /// Verifica a invariante de operadores (útil após desserialização).
    pub fn validate(&self) -> Result<(), ConstructionError> {
        let expected = self.components.len().saturating_sub(1);
        if self.operators.len() != expected {
            return Err(ConstructionError::OperatorCountMismatch {
                components: self.components.len(),
                operators: self.operators.len(),
                expected,
            });
        }
        if self.operators.iter().any(|op| op.is_empty()) {
            return Err(ConstructionError::EmptyOperator);
        }
        Ok(())
    }

    pub fn components(&self) -> &[StructuralComponent] {
        &self.components
    }

    pub fn operators(&self) -> &[String] {
        &self.operators
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Assinatura canônica: SHA-256 hex, sem estilo, precisão 8.
    pub fn canonical_signature(&self) -> String {
        self.signature_with(false, DEFAULT_PRECISION)
    }

    /// Assinatura com estilo e precisão configuráveis.
    pub fn signature_with(&self, include_style: bool, precision: usize) -> String {
        let mut hasher = Sha256::new();
        if self.components.is_empty() {
            hasher.update(EMPTY_SENTINEL.as_bytes());
            return hex::encode(hasher.finalize());
        }
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                let op = self.operators.get(i - 1).map(String::as_str).unwrap_or(DEFAULT_OPERATOR);
                hasher.update(format!("||OPERATOR({:?})||", op).as_bytes());
            }
            hasher.update(component.signature_with(include_style, precision).as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl PartialEq for StructuralDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_signature() == other.canonical_signature()
    }
}

impl Eq for StructuralDefinition {}

impl Hash for StructuralDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_signature().hash(state);
    }
}

impl fmt::Display for StructuralDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("<empty definition>");
        }
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                let op = self.operators.get(i - 1).map(String::as_str).unwrap_or(DEFAULT_OPERATOR);
                write!(f, " {} ", op)?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl From<StructuralComponent> for StructuralDefinition {
    fn from(component: StructuralComponent) -> Self {
        Self::single(component)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::core::value::Scalar;

    fn comp(kind: &str, params: Vec<Scalar>) -> StructuralComponent {
        StructuralComponent::new(kind, params).unwrap()
    }

    // ─── construção ────────────────────────────────────────────

    #[test]
    fn operator_count_is_enforced() {
        let err = StructuralDefinition::new(
            vec![comp("point", vec![0.into(), 0.into()])],
            vec!["+".into()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::OperatorCountMismatch { components: 1, operators: 1, expected: 0 }
        );
    }

    #[test]
    fn add_skips_operator_for_first_component() {
        let mut def = StructuralDefinition::empty();
        def.add(comp("point", vec![0.into(), 0.into()]), "*").unwrap();
        assert!(def.operators().is_empty());
        def.add(comp("point", vec![1.into(), 1.into()]), "-").unwrap();
        assert_eq!(def.operators(), ["-".to_string()]);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn add_rejects_empty_operator() {
        let mut def = StructuralDefinition::empty();
        assert_eq!(
            def.add(comp("point", vec![]), "  ").unwrap_err(),
            ConstructionError::EmptyOperator
        );
        assert!(def.is_empty());
    }

    // ─── assinatura ────────────────────────────────────────────

    #[test]
    fn case_and_number_formatting_do_not_matter() {
        let a = StructuralDefinition::single(comp("circle", vec![1.into(), 1.into(), 2.into()]));
        let b = StructuralDefinition::single(comp("CIRCLE", vec![1.0.into(), 1.0.into(), 2.into()]));
        assert_eq!(a.canonical_signature(), b.canonical_signature());
        assert_eq!(a.canonical_signature().len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn operators_change_the_signature() {
        let c0 = comp("point", vec![0.into(), 0.into()]);
        let c1 = comp("point", vec![1.into(), 1.into()]);
        let plus = StructuralDefinition::new(vec![c0.clone(), c1.clone()], vec!["+".into()]).unwrap();
        let minus = StructuralDefinition::new(vec![c0.clone(), c1.clone()], vec!["-".into()]).unwrap();
        let swapped = StructuralDefinition::new(vec![c1, c0], vec!["+".into()]).unwrap();
        assert_ne!(plus.canonical_signature(), minus.canonical_signature());
        assert_ne!(plus.canonical_signature(), swapped.canonical_signature());
    }

    #[test]
    fn empty_definition_has_fixed_sentinel() {
        let a = StructuralDefinition::empty();
        let b = StructuralDefinition::default();
        assert_eq!(a.canonical_signature(), b.canonical_signature());
        let non_empty = StructuralDefinition::single(comp("point", vec![]));
        assert_ne!(a.canonical_signature(), non_empty.canonical_signature());
    }

    #[test]
    fn style_is_optional_in_signature() {
        let plain = StructuralDefinition::single(comp("line", vec![0.into(), 0.into(), 1.into(), 1.into()]));
        let styled = StructuralDefinition::single(
            comp("line", vec![0.into(), 0.into(), 1.into(), 1.into()]).with_style("color", "red"),
        );
        assert_eq!(plain, styled);
        assert_ne!(plain.signature_with(true, 8), styled.signature_with(true, 8));
    }

    #[test]
    fn hash_routes_through_signature() {
        let set: HashSet<StructuralDefinition> = [
            StructuralDefinition::single(comp("circle", vec![1.into(), 1.into(), 2.into()])),
            StructuralDefinition::single(comp("Circle", vec![1.0.into(), 1.0.into(), 2.0.into()])),
            StructuralDefinition::empty(),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_joins_with_operators() {
        let def = StructuralDefinition::empty()
            .push(comp("circle", vec![0.into(), 0.into(), 1.into()]))
            .push(comp("point", vec![0.5.into(), 0.5.into()]));
        assert_eq!(def.to_string(), "circle(0,0,1) + point(0.5,0.5)");
        assert_eq!(StructuralDefinition::empty().to_string(), "<empty definition>");
    }

    #[test]
    fn deserialized_definition_can_be_validated() {
        let json = r#"{"components":[{"kind":"point","parameters":[0,0],"range":null}],"operators":["+"]}"#;
        let def: StructuralDefinition = serde_json::from_str(json).unwrap();
        assert!(matches!(
            def.validate(),
            Err(ConstructionError::OperatorCountMismatch { .. })
        ));
    }
}
