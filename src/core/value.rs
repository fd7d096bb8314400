//! # Scalar — Valores Atômicos dos Componentes
//!
//! Os parâmetros de um [`StructuralComponent`](super::StructuralComponent)
//! são sequências de [`Scalar`]: número, texto ou booleano.
//!
//! ## Formatação Canônica
//!
//! Para que duas descrições independentes do mesmo conceito produzam a
//! **mesma assinatura**, todo número passa por [`format_general`], que
//! reproduz a notação `%g` do C com precisão fixa de dígitos significativos:
//!
//! | Valor | `precision = 8` |
//! |-------|-----------------|
//! | `1` / `1.0` | `1` |
//! | `0.5` | `0.5` |
//! | `10.5555555` | `10.555556` |
//! | `1e10` | `1e+10` |
//! | `NaN` | `nan` |
//! | `-∞` | `-inf` |
//!
//! Assim `circle(1,1,2)` e `CIRCLE(1.0,1.0,2)` são indistinguíveis.
//!
//! ## JSON
//!
//! `serde_json` grava `NaN` e `±∞` como `null`. Números passam por
//! [`float_repr`]: finitos continuam números, os especiais viram
//! `{"special": "nan" | "inf" | "-inf"}` e voltam intactos na leitura.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Valor escalar de um parâmetro ou atributo de estilo.
///
/// A ordem das variantes importa para `#[serde(untagged)]`: `true` em JSON
/// vira `Bool`, não `Number`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(#[serde(with = "float_repr")] f64),
    Text(String),
}

impl Scalar {
    /// Token usado na assinatura canônica.
    ///
    /// - números: `%.{precision}g`, com `nan`, `inf` e `-inf` literais
    /// - textos: entre aspas (escapados), para nunca colidirem com números
    /// - booleanos: `T` / `F`
    pub fn signature_token(&self, precision: usize) -> String {
        match self {
            Scalar::Number(n) => format_general(*n, precision),
            Scalar::Text(s) => format!("{:?}", s),
            Scalar::Bool(b) => if *b { "T" } else { "F" }.to_string(),
        }
    }

    /// Retorna o valor numérico, se houver.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", format_general(*n, 5)),
            Scalar::Text(s) => write!(f, "{:?}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Number(v as f64)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Number(v as f64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(v as f64)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Serialização de `f64` que preserva `NaN` e `±∞`.
///
/// Use com `#[serde(with = "float_repr")]`; para intervalos opcionais,
/// [`float_repr::range`].
pub mod float_repr {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Special { special: String },
    }

    impl From<f64> for Repr {
        fn from(value: f64) -> Self {
            if value.is_finite() {
                Repr::Finite(value)
            } else {
                Repr::Special {
                    special: super::format_general(value, 1),
                }
            }
        }
    }

    impl Repr {
        fn into_f64<E: de::Error>(self) -> Result<f64, E> {
            match self {
                Repr::Finite(value) => Ok(value),
                Repr::Special { special } => match special.as_str() {
                    "nan" => Ok(f64::NAN),
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(E::custom(format!("número especial desconhecido: {other}"))),
                },
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Repr::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Repr::deserialize(deserializer)?.into_f64()
    }

    /// Variante para `Option<(f64, f64)>`.
    pub mod range {
        use super::Repr;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<(f64, f64)>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value
                .map(|(min, max)| (Repr::from(min), Repr::from(max)))
                .serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<(f64, f64)>, D::Error> {
            match Option::<(Repr, Repr)>::deserialize(deserializer)? {
                Some((min, max)) => Ok(Some((min.into_f64()?, max.into_f64()?))),
                None => Ok(None),
            }
        }
    }
}

/// Formata um `f64` como o `%.{precision}g` do C.
///
/// O expoente é decidido **depois** do arredondamento para `precision`
/// dígitos significativos, então `9.99999999` com precisão 8 vira `10`.
/// Zeros à direita e o ponto decimal solto são removidos. `-0.0` é
/// normalizado para `0`.
pub fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Remove zeros à direita da parte fracionária (e o ponto, se sobrar).
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── format_general ────────────────────────────────────────

    #[test]
    fn integers_and_floats_agree() {
        assert_eq!(format_general(1.0, 8), "1");
        assert_eq!(format_general(2.0, 8), "2");
        assert_eq!(format_general(-3.0, 8), "-3");
    }

    #[test]
    fn fractions_are_trimmed() {
        assert_eq!(format_general(0.5, 8), "0.5");
        assert_eq!(format_general(10.5, 8), "10.5");
        assert_eq!(format_general(0.0001, 8), "0.0001");
    }

    #[test]
    fn precision_rounds_significant_digits() {
        assert_eq!(format_general(3.14159265358979, 5), "3.1416");
        assert_eq!(format_general(9.99999999, 8), "10");
        assert_eq!(format_general(6.283185, 5), "6.2832");
    }

    #[test]
    fn large_and_small_use_exponent() {
        assert_eq!(format_general(1e10, 8), "1e+10");
        assert_eq!(format_general(123456789.0, 8), "1.2345679e+08");
        assert_eq!(format_general(0.00001, 8), "1e-05");
    }

    #[test]
    fn special_values_are_literal() {
        assert_eq!(format_general(f64::NAN, 8), "nan");
        assert_eq!(format_general(f64::INFINITY, 8), "inf");
        assert_eq!(format_general(f64::NEG_INFINITY, 8), "-inf");
        assert_eq!(format_general(-0.0, 8), "0");
    }

    // ─── Scalar ────────────────────────────────────────────────

    #[test]
    fn tokens_distinguish_types() {
        assert_eq!(Scalar::from(1).signature_token(8), "1");
        assert_eq!(Scalar::from("1").signature_token(8), "\"1\"");
        assert_eq!(Scalar::from(true).signature_token(8), "T");
        assert_eq!(Scalar::from(false).signature_token(8), "F");
    }

    #[test]
    fn untagged_json_keeps_bools() {
        let parsed: Vec<Scalar> = serde_json::from_str(r#"[true, 2.5, "x"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Scalar::Bool(true), Scalar::Number(2.5), Scalar::Text("x".into())]
        );
    }

    #[test]
    fn special_numbers_survive_json() {
        let values = vec![
            Scalar::Number(f64::NAN),
            Scalar::Number(f64::INFINITY),
            Scalar::Number(f64::NEG_INFINITY),
            Scalar::Number(1.5),
            Scalar::Text("nan".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert!(!json.contains("null"), "{}", json);

        let parsed: Vec<Scalar> = serde_json::from_str(&json).unwrap();
        assert!(parsed[0].as_number().is_some_and(f64::is_nan));
        assert_eq!(parsed[1], Scalar::Number(f64::INFINITY));
        assert_eq!(parsed[2], Scalar::Number(f64::NEG_INFINITY));
        assert_eq!(parsed[3], Scalar::Number(1.5));
        assert_eq!(parsed[4], Scalar::Text("nan".into()));
    }

    #[test]
    fn unknown_special_number_is_rejected() {
        let parsed: Result<Scalar, _> = serde_json::from_str(r#"{"special": "big"}"#);
        assert!(parsed.is_err());
    }
}
