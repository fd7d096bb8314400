//! # Taxonomia de Erros
//!
//! Cada camada do sistema tem seu próprio enum de erro:
//!
//! | Enum | Origem | Comportamento |
//! |------|--------|---------------|
//! | [`ConstructionError`] | componentes e definições malformados | fatal, devolvido ao chamador |
//! | [`GraphError`] | inserção de relações no grafo | rejeita a operação inteira |
//! | [`RuleError`] | testes de junção e ações de regras | registrado em log, isolado no caminho |
//! | [`SnapshotError`] | restauração de snapshots | devolvido ao chamador |
//!
//! Relações duplicadas **não** são erro: são resolvidas por merge de
//! atributos (maior confiança vence).

use thiserror::Error;

use crate::core::entity::EntityId;

/// Estrutura malformada — rejeitada no momento da construção.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("o tipo (kind) do componente não pode ser vazio")]
    EmptyKind,

    #[error("intervalo malformado para '{kind}': ({min}, {max})")]
    MalformedRange { kind: String, min: f64, max: f64 },

    #[error("{components} componentes exigem {expected} operadores, recebidos {operators}")]
    OperatorCountMismatch {
        components: usize,
        operators: usize,
        expected: usize,
    },

    #[error("operador vazio")]
    EmptyOperator,
}

/// Falhas de escrita no [`KnowledgeGraph`](crate::core::KnowledgeGraph).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Relação referencia uma entidade que ainda não está no grafo.
    #[error("entidade {0} não está registrada no grafo")]
    MissingEndpoint(EntityId),

    #[error("nome de predicado vazio")]
    EmptyPredicate,

    #[error("entidade desconhecida: {0}")]
    UnknownEntity(EntityId),
}

/// Falha ao avaliar uma regra. Nunca aborta a propagação na rede.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("regra '{0}' não tem padrões")]
    EmptyRule(String),

    #[error("variável '{variable}' não está ligada no token da esquerda")]
    UnboundVariable { variable: String },

    #[error("conclusão da regra '{rule}' não resolve para uma tripla válida: {detail}")]
    UnresolvedConclusion { rule: String, detail: String },

    #[error("ação falhou: {0}")]
    Action(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Falhas ao restaurar um snapshot persistido.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot da rede foi gerado com outro conjunto de regras (esperado {expected}, encontrado {found})")]
    FingerprintMismatch { expected: String, found: String },

    #[error("nó {0} da rede não existe ou não é uma memória do tipo esperado")]
    UnknownNode(usize),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
