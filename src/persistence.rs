//! # Persistência — Snapshots do Grafo em Disco
//!
//! Serializa um [`GraphSnapshot`] como JSON pretty-printed: entidades,
//! arestas com suas chaves, predicados e, se houver rede conectada, o
//! conteúdo das memórias Rete.
//!
//! Os índices de nomes não são gravados; são reconstruídos na carga.
//!
//! ## Atomicidade
//!
//! A escrita vai para `<arquivo>.tmp` e depois é renomeada sobre o destino.
//! Um crash no meio deixa o snapshot anterior intacto.
//!
//! ## Rede de Regras
//!
//! Ações são código, não dados: a carga recebe a [`RuleNetwork`] já
//! compilada pelo chamador. Se as regras forem as mesmas do momento do
//! salvamento, as memórias são restauradas; senão a carga falha com
//! [`SnapshotError::FingerprintMismatch`](crate::error::SnapshotError).

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::EngineConfig;
use crate::core::{GraphSnapshot, KnowledgeGraph, SharedKnowledgeGraph};
use crate::inference::RuleNetwork;

/// Salva o grafo compartilhado em `path`.
///
/// Adquire apenas um read lock: leitores concorrentes não são bloqueados.
///
/// # Erros
///
/// Falha ao criar o diretório, serializar, escrever ou renomear.
pub fn save_snapshot(graph: &SharedKnowledgeGraph, path: impl AsRef<Path>) -> Result<()> {
    let snapshot = graph.read().snapshot();
    write_snapshot(&snapshot, path.as_ref())
}

/// Grava um snapshot já capturado.
pub fn write_snapshot(snapshot: &GraphSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Falha ao criar diretório {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot).context("Falha ao serializar snapshot")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Falha ao escrever {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Falha ao mover {} para {}", tmp.display(), path.display()))?;

    tracing::info!(
        path = %path.display(),
        entities = snapshot.entities.len(),
        relations = snapshot.relations.len(),
        "Snapshot salvo"
    );
    Ok(())
}

/// Carrega o grafo de `path`, ou cria um vazio se o arquivo não existir.
///
/// `network`, se informado, é conectado ao grafo carregado (com as memórias
/// restauradas quando o snapshot as contém).
///
/// # Erros
///
/// Arquivo existente mas ilegível, JSON incompatível, aresta apontando para
/// entidade ausente, ou regras diferentes das salvas.
pub fn load_graph(
    path: impl AsRef<Path>,
    config: EngineConfig,
    network: Option<RuleNetwork>,
) -> Result<KnowledgeGraph> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "Nenhum snapshot encontrado, iniciando grafo vazio");
        let mut graph = KnowledgeGraph::with_config(config);
        if let Some(network) = network {
            graph.attach_rule_engine(network);
        }
        return Ok(graph);
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Falha ao ler {}", path.display()))?;
    let snapshot: GraphSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("Falha ao desserializar {}", path.display()))?;
    let graph = KnowledgeGraph::from_snapshot(snapshot, config, network)
        .with_context(|| format!("Snapshot inconsistente em {}", path.display()))?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::{Entity, RelationAttributes, StructuralComponent, StructuralDefinition};
    use crate::inference::{Pattern, Rule};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("omni-kb-{}-{}", tag, uuid::Uuid::new_v4()))
            .join("kb.json")
    }

    fn symmetric_near() -> Rule {
        Rule::derive(
            "near-back",
            vec![Pattern::parse("?a", "near", "?b")],
            vec![Pattern::parse("?b", "near", "?a")],
        )
    }

    #[test]
    fn missing_file_yields_empty_graph() {
        let graph = load_graph(temp_path("missing"), EngineConfig::default(), None).unwrap();
        assert_eq!(graph.entity_count(), 0);
        assert!(graph.rule_engine().is_none());
    }

    #[test]
    fn save_then_load_preserves_graph_and_memories() {
        let path = temp_path("roundtrip");
        let mut kg = KnowledgeGraph::new();
        let a = kg.add_entity(Entity::new(StructuralDefinition::empty()).with_label("en", "A")).id();
        let b = kg.add_entity(Entity::new(StructuralDefinition::empty()).with_label("en", "B")).id();
        kg.add_rule(symmetric_near()).unwrap();
        kg.add_relation(a, "near", b, RelationAttributes::default()).unwrap();
        let shared = kg.into_shared();

        save_snapshot(&shared, &path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let mut network = RuleNetwork::new();
        network.add_rule(symmetric_near()).unwrap();
        let loaded = load_graph(&path, EngineConfig::default(), Some(network)).unwrap();
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert_eq!(loaded.entity_count(), 2);
        assert!(loaded.has_relation(b, "near", a));
        assert_eq!(loaded.rule_engine().unwrap().matches("near-back").len(), 2);
    }

    #[test]
    fn special_numbers_survive_save_and_load() {
        let path = temp_path("special");
        let point = StructuralComponent::new("point", vec![1.into(), f64::NAN.into()]).unwrap();
        let curve = StructuralComponent::new("exp", vec![])
            .unwrap()
            .with_range(0.0, f64::INFINITY)
            .unwrap()
            .with_style("scale", f64::NEG_INFINITY);

        let mut kg = KnowledgeGraph::new();
        let p = kg.add_entity(Entity::new(StructuralDefinition::single(point))).id();
        let c = kg.add_entity(Entity::new(StructuralDefinition::single(curve))).id();
        let signatures = [
            kg.entity(p).unwrap().definition().canonical_signature(),
            kg.entity(c).unwrap().definition().canonical_signature(),
        ];
        kg.add_relation(p, "on", c, RelationAttributes::default().with_confidence(f64::NAN))
            .unwrap();
        save_snapshot(&kg.into_shared(), &path).unwrap();

        let loaded = load_graph(&path, EngineConfig::default(), None);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        let loaded = loaded.unwrap();

        let curve = &loaded.entity(c).unwrap().definition().components()[0];
        assert_eq!(curve.range(), Some((0.0, f64::INFINITY)));
        assert!(loaded.entity(p).unwrap().definition().components()[0].parameters()[1]
            .as_number()
            .is_some_and(f64::is_nan));
        assert_eq!(loaded.entity(p).unwrap().definition().canonical_signature(), signatures[0]);
        assert_eq!(loaded.entity(c).unwrap().definition().canonical_signature(), signatures[1]);

        let edges = loaded.find_relations(Some(p), Some("on"), Some(c));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].attributes.confidence, 0.0);
    }

    #[test]
    fn different_rules_fail_to_load() {
        let path = temp_path("mismatch");
        let mut kg = KnowledgeGraph::new();
        kg.add_rule(symmetric_near()).unwrap();
        save_snapshot(&kg.into_shared(), &path).unwrap();

        let result = load_graph(&path, EngineConfig::default(), Some(RuleNetwork::new()));
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn corrupted_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ \"entities\": 42 }").unwrap();
        let result = load_graph(&path, EngineConfig::default(), None);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        assert!(result.is_err());
    }
}
