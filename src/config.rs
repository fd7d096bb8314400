//! # Configuração do Motor
//!
//! [`EngineConfig`] reúne os poucos parâmetros ajustáveis do grafo e da
//! rede de regras. É passada explicitamente para
//! [`KnowledgeGraph::with_config`](crate::core::KnowledgeGraph::with_config);
//! não existe estado global.
//!
//! ## Arquivo
//!
//! ```json
//! {
//!   "max_rule_rounds": 64,
//!   "max_propagation_depth": 256,
//!   "snapshot_path": "data/kb.json",
//!   "default_language": "en"
//! }
//! ```
//!
//! Campos ausentes assumem o valor padrão.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Parâmetros do grafo de conhecimento e do motor de inferência.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Limite de chamadas a `run()` em
    /// [`run_to_fixpoint`](crate::core::KnowledgeGraph::run_to_fixpoint).
    pub max_rule_rounds: usize,

    /// Profundidade máxima da recursão de propagação. Fatos derivados além
    /// dela são enfileirados e drenados no próximo `run()`.
    pub max_propagation_depth: usize,

    pub snapshot_path: PathBuf,

    /// Idioma de fallback para nomes de exibição.
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rule_rounds: 64,
            max_propagation_depth: 256,
            snapshot_path: PathBuf::from("data/kb.json"),
            default_language: "en".to_string(),
        }
    }
}

impl EngineConfig {
    /// Lê a configuração de um arquivo JSON, ou usa os padrões se ele não
    /// existir.
    ///
    /// # Erros
    ///
    /// Arquivo existente mas ilegível ou com JSON inválido.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Configuração ausente, usando padrões");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Falha ao ler {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&json)
            .with_context(|| format!("Falha ao desserializar {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("omni-kb-missing-{}.json", uuid::Uuid::new_v4()));
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = std::env::temp_dir().join(format!("omni-kb-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "max_rule_rounds": 5, "default_language": "ar" }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.max_rule_rounds, 5);
        assert_eq!(config.default_language, "ar");
        assert_eq!(config.max_propagation_depth, 256);
        assert_eq!(config.snapshot_path, PathBuf::from("data/kb.json"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let path = std::env::temp_dir().join(format!("omni-kb-bad-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = EngineConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
