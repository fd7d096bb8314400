//! # StructuralComponent — Descritor Atômico Tipado
//!
//! Um [`StructuralComponent`] é o menor bloco de uma
//! [`StructuralDefinition`](super::StructuralDefinition): um tipo
//! ([`ComponentKind`]), uma lista ordenada de parâmetros ([`Scalar`]),
//! um estilo de exibição, um intervalo numérico opcional e metadados.
//!
//! ## Identidade Lógica
//!
//! Dois componentes são **iguais** se e somente se suas assinaturas
//! canônicas são iguais. A assinatura considera apenas:
//!
//! - o `kind` (normalizado para minúsculas)
//! - os parâmetros (formatação `%g` com precisão fixa)
//! - o intervalo, se houver
//!
//! Estilo e metadados são apenas de exibição e podem ser editados sem
//! alterar a identidade.
//!
//! ## Formato da Assinatura
//!
//! ```text
//! circle|-|P(1,1,2)|-|R(0:6.283185)
//! ```
//!
//! Cada parte é marcada (`P(...)`, `R(...)`, `S{...}`) e separada por `|-|`,
//! um separador improvável dentro dos próprios valores.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::value::{float_repr, format_general, Scalar};
use crate::error::ConstructionError;

/// Precisão padrão (dígitos significativos) usada nas assinaturas.
pub const DEFAULT_PRECISION: usize = 8;

/// Separador entre as partes da assinatura de um componente.
const SIGNATURE_SEPARATOR: &str = "|-|";

/// Categoria de um [`ComponentKind`], usada como dica de renderização.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentCategory {
    /// Forma geométrica primitiva (ponto, linha, círculo...).
    Primitive,
    /// Função matemática de uma variável (seno, exponencial...).
    Function,
    /// Transformação aplicada aos componentes anteriores.
    Transform,
    /// Atributo visual (cor, estilo).
    Attribute,
    /// Tipo desconhecido — parâmetros opacos.
    Opaque,
}

/// Tipo de um componente estrutural.
///
/// Conjunto fechado dos tipos conhecidos, com [`ComponentKind::Other`] como
/// saída para tipos arbitrários. A forma textual é sempre minúscula.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Point,
    Line,
    Circle,
    Ellipse,
    Rectangle,
    Polygon,
    Bezier,
    Sine,
    Exp,
    Log,
    Parabola,
    Translate,
    Rotate,
    Scale,
    Color,
    SetStyle,
    /// Tipo não catalogado (já normalizado, nunca vazio).
    Other(String),
}

impl ComponentKind {
    /// Normaliza e classifica um nome de tipo.
    ///
    /// Remove espaços das bordas e converte para minúsculas.
    /// Falha com [`ConstructionError::EmptyKind`] se nada sobrar.
    pub fn parse(raw: &str) -> Result<Self, ConstructionError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ConstructionError::EmptyKind);
        }
        Ok(match normalized.as_str() {
            "point" => ComponentKind::Point,
            "line" => ComponentKind::Line,
            "circle" => ComponentKind::Circle,
            "ellipse" => ComponentKind::Ellipse,
            "rectangle" | "rect" => ComponentKind::Rectangle,
            "polygon" => ComponentKind::Polygon,
            "bezier" => ComponentKind::Bezier,
            "sine" | "sin" => ComponentKind::Sine,
            "exp" => ComponentKind::Exp,
            "log" => ComponentKind::Log,
            "parabola" => ComponentKind::Parabola,
            "translate" => ComponentKind::Translate,
            "rotate" => ComponentKind::Rotate,
            "scale" => ComponentKind::Scale,
            "color" => ComponentKind::Color,
            "setstyle" => ComponentKind::SetStyle,
            _ => ComponentKind::Other(normalized),
        })
    }

    /// Nome canônico (minúsculo) do tipo.
    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Point => "point",
            ComponentKind::Line => "line",
            ComponentKind::Circle => "circle",
            ComponentKind::Ellipse => "ellipse",
            ComponentKind::Rectangle => "rectangle",
            ComponentKind::Polygon => "polygon",
            ComponentKind::Bezier => "bezier",
            ComponentKind::Sine => "sine",
            ComponentKind::Exp => "exp",
            ComponentKind::Log => "log",
            ComponentKind::Parabola => "parabola",
            ComponentKind::Translate => "translate",
            ComponentKind::Rotate => "rotate",
            ComponentKind::Scale => "scale",
            ComponentKind::Color => "color",
            ComponentKind::SetStyle => "setstyle",
            ComponentKind::Other(name) => name.as_str(),
        }
    }

    pub fn category(&self) -> ComponentCategory {
        match self {
            ComponentKind::Point
            | ComponentKind::Line
            | ComponentKind::Circle
            | ComponentKind::Ellipse
            | ComponentKind::Rectangle
            | ComponentKind::Polygon
            | ComponentKind::Bezier => ComponentCategory::Primitive,
            ComponentKind::Sine
            | ComponentKind::Exp
            | ComponentKind::Log
            | ComponentKind::Parabola => ComponentCategory::Function,
            ComponentKind::Translate | ComponentKind::Rotate | ComponentKind::Scale => {
                ComponentCategory::Transform
            }
            ComponentKind::Color | ComponentKind::SetStyle => ComponentCategory::Attribute,
            ComponentKind::Other(_) => ComponentCategory::Opaque,
        }
    }

    /// Quantidade de parâmetros esperada: `(mínimo, máximo)`.
    ///
    /// `None` para tipos de aridade livre (`Other`). Polígonos e curvas de
    /// Bézier aceitam qualquer número par de coordenadas a partir do mínimo.
    pub fn arity(&self) -> Option<(usize, usize)> {
        match self {
            ComponentKind::Point => Some((2, 2)),
            ComponentKind::Line => Some((4, 4)),
            ComponentKind::Circle => Some((3, 3)),
            ComponentKind::Ellipse => Some((4, 5)),
            ComponentKind::Rectangle => Some((4, 4)),
            ComponentKind::Polygon => Some((6, usize::MAX)),
            ComponentKind::Bezier => Some((6, usize::MAX)),
            ComponentKind::Sine => Some((0, 3)),
            ComponentKind::Exp => Some((0, 2)),
            ComponentKind::Log => Some((0, 2)),
            ComponentKind::Parabola => Some((0, 3)),
            ComponentKind::Translate => Some((2, 2)),
            ComponentKind::Rotate => Some((1, 3)),
            ComponentKind::Scale => Some((1, 2)),
            ComponentKind::Color => Some((1, 4)),
            ComponentKind::SetStyle => Some((0, 0)),
            ComponentKind::Other(_) => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ComponentKind::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Descritor atômico e tipado de uma estrutura.
///
/// O conteúdo lógico (`kind`, `parameters`, `range`) é imutável após a
/// construção; `style` e `metadata` podem ser editados livremente.
///
/// Igualdade e hash passam **exclusivamente** pela assinatura canônica
/// (sem estilo).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuralComponent {
    kind: ComponentKind,
    parameters: Vec<Scalar>,
    /// Atributos de exibição (cor, espessura...). Fora da assinatura padrão.
    #[serde(default)]
    pub style: BTreeMap<String, Scalar>,
    #[serde(default, with = "float_repr::range")]
    range: Option<(f64, f64)>,
    /// Metadados livres (fonte, confiança...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StructuralComponent {
    /// Cria um componente validando o tipo.
    ///
    /// # Erros
    ///
    /// [`ConstructionError::EmptyKind`] se o tipo for vazio após `trim`.
    pub fn new(kind: &str, parameters: Vec<Scalar>) -> Result<Self, ConstructionError> {
        let kind = ComponentKind::parse(kind)?;
        if let Some((min, max)) = kind.arity() {
            if parameters.len() < min || parameters.len() > max {
                tracing::warn!(
                    kind = %kind,
                    params = parameters.len(),
                    "Componente com quantidade de parâmetros inesperada"
                );
            }
        }
        Ok(Self {
            kind,
            parameters,
            style: BTreeMap::new(),
            range: None,
            metadata: BTreeMap::new(),
        })
    }

    /// Define o intervalo `(min, max)` do componente.
    ///
    /// # Erros
    ///
    /// [`ConstructionError::MalformedRange`] se algum limite for `NaN`.
    pub fn with_range(mut self, min: f64, max: f64) -> Result<Self, ConstructionError> {
        if min.is_nan() || max.is_nan() {
            return Err(ConstructionError::MalformedRange {
                kind: self.kind.to_string(),
                min,
                max,
            });
        }
        self.range = Some((min, max));
        Ok(self)
    }

    /// Adiciona um atributo de estilo (não afeta a identidade).
    pub fn with_style(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.style.insert(key.trim().to_string(), value.into());
        self
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn parameters(&self) -> &[Scalar] {
        &self.parameters
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Assinatura canônica com os parâmetros padrão (sem estilo, precisão 8).
    pub fn signature(&self) -> String {
        self.signature_with(false, DEFAULT_PRECISION)
    }

    /// Gera a assinatura canônica determinística do componente.
    ///
    /// # Parâmetros
    ///
    /// - `include_style` — inclui o estilo (chaves ordenadas) na assinatura
    /// - `precision` — dígitos significativos usados nos números
    ///
    /// # Exemplo
    ///
    /// ```text
    /// line|-|P(0,0,10.5,10.555556)
    /// color|-|P("blue")|-|S{"alpha":0.5}
    /// ```
    pub fn signature_with(&self, include_style: bool, precision: usize) -> String {
        let mut parts = Vec::with_capacity(4);
        parts.push(self.kind.as_str().to_string());

        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.signature_token(precision))
            .collect();
        parts.push(format!("P({})", params.join(",")));

        if let Some((min, max)) = self.range {
            parts.push(format!(
                "R({}:{})",
                format_general(min, precision),
                format_general(max, precision)
            ));
        }

        if include_style && !self.style.is_empty() {
            // BTreeMap já itera em ordem de chave
            let style: Vec<String> = self
                .style
                .iter()
                .map(|(k, v)| format!("{:?}:{}", k, v.signature_token(precision)))
                .collect();
            parts.push(format!("S{{{}}}", style.join(";")));
        }

        parts.join(SIGNATURE_SEPARATOR)
    }
}

impl PartialEq for StructuralComponent {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature()
    }
}

impl Eq for StructuralComponent {}

impl Hash for StructuralComponent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature().hash(state);
    }
}

impl fmt::Display for StructuralComponent {
    /// Forma legível: `circle(5,5,3)[0:6.2832]{fill=true}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.kind, params.join(","))?;
        if let Some((min, max)) = self.range {
            write!(f, "[{}:{}]", format_general(min, 5), format_general(max, 5))?;
        }
        if !self.style.is_empty() {
            let style: Vec<String> = self.style.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "{{{}}}", style.join(","))?;
        }
        Ok(())
    }
}
