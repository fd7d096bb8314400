//! # omni-kb — Manutenção do Grafo de Conhecimento
//!
//! Carrega o snapshot do disco, aplica as regras implícitas nos predicados
//! registrados até o ponto fixo e grava o resultado de volta.
//!
//! ```text
//! main()
//!   ├── Configura tracing/logging
//!   ├── Lê a configuração (omni-kb.json ou caminho em argv[1])
//!   ├── Carrega o grafo (ou cria vazio)
//!   ├── Instala regras sym/inv/trans dos predicados
//!   ├── run_to_fixpoint
//!   └── Salva o snapshot (escrita atômica)
//! ```
//!
//! ```bash
//! RUST_LOG=debug cargo run -- minha-config.json
//! ```

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use omni_kb::config::EngineConfig;
use omni_kb::persistence;

const DEFAULT_CONFIG_PATH: &str = "omni-kb.json";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = EngineConfig::load(&config_path)?;
    let snapshot_path = config.snapshot_path.clone();

    // As memórias salvas só valem para a mesma rede; aqui a rede é
    // recompilada a partir dos predicados carregados.
    let mut graph = persistence::load_graph(&snapshot_path, config, None)?;
    tracing::info!(
        entities = graph.entity_count(),
        relations = graph.relation_count(),
        predicates = graph.predicates().len(),
        "Grafo carregado"
    );

    let installed = graph
        .install_predicate_rules()
        .context("Falha ao compilar regras de predicados")?;
    let report = graph.run_to_fixpoint();
    tracing::info!(
        rules = installed,
        rounds = report.rounds,
        derived = report.derived,
        converged = report.converged,
        "Inferência concluída"
    );

    for warning in graph.take_warnings() {
        tracing::warn!(%warning, "Aviso do grafo");
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        for record in graph.find_relations(None, None, None) {
            tracing::debug!("{}", graph.describe_relation(&record));
        }
    }

    let shared = graph.into_shared();
    if let Err(err) = persistence::save_snapshot(&shared, &snapshot_path) {
        tracing::error!(path = %snapshot_path.display(), error = %format!("{:#}", err), "Falha ao salvar snapshot");
        return Err(err);
    }
    Ok(())
}
