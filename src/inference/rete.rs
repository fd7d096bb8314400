//! # Rede Rete — Encadeamento Progressivo Incremental
//!
//! A [`RuleNetwork`] compila cada [`Rule`] em um grafo de nós de
//! casamento. Quando um fato entra, apenas o trabalho **novo** é feito:
//! cada memória guarda os casamentos parciais já encontrados, então nenhuma
//! junção é recalculada do zero.
//!
//! ## Topologia
//!
//! ```text
//!                fato (s, p, o)
//!                      │
//!            ┌─────────┴──────────┐  entrada por nome de predicado
//!            ▼                    ▼
//!       Alpha (?x parent ?y)  Alpha (?y parent ?z)   ← testes de constante
//!            │                    │                     e igualdade interna
//!       AlphaMemory           AlphaMemory            ← fatos que passaram
//!            │   (esquerda)       │ (direita)
//!            └────────┬───────────┘
//!                     ▼
//!                   Beta  ?y == ?y                   ← testes de junção
//!                     │
//!                BetaMemory {x, y, z}                ← ligações parciais
//!                     │
//!                 Terminal ──▶ ação ──▶ Derivation ──▶ grafo ──▶ add_fact
//! ```
//!
//! | Nó | Chave de compartilhamento | Estado |
//! |----|---------------------------|--------|
//! | `Alpha` | constantes + igualdades do padrão | — |
//! | `AlphaMemory` | alpha + nomes das variáveis | fatos |
//! | `Beta` | esquerda + direita + testes | — |
//! | `BetaMemory` | (uma por beta) | ligações |
//! | `Terminal` | (um por regra) | contagem de disparos |
//!
//! Padrões estruturalmente iguais em regras diferentes compartilham nós.
//!
//! ## Garantias
//!
//! - **Sem duplicatas**: toda memória rejeita entradas repetidas.
//! - **Ponto fixo**: a derivação pára quando nenhum fato novo surge, mesmo
//!   com regras recursivas (transitividade), porque um fato já presente no
//!   grafo não é repropagado.
//! - **Ordem irrelevante**: o fecho final não depende da ordem de inserção
//!   nem de a regra ter sido adicionada antes ou depois dos fatos.
//! - **Isolamento**: uma ação que falha é registrada com `warn!` e não
//!   impede as demais.
//!
//! A recursão de propagação é limitada por `max_depth`; fatos além do
//! limite vão para uma fila drenada por [`run`](RuleNetwork::run).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::knowledge_graph::StoreOutcome;
use crate::core::relation::InsertOptions;
use crate::core::KnowledgeGraph;
use crate::error::{RuleError, SnapshotError};

use super::pattern::{Bindings, Fact, Pattern, Position, Term, Value};
use super::rules::{Derivation, Rule};

/// Índice de um nó na arena da rede.
pub type NodeId = usize;

/// Profundidade padrão da recursão de propagação.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Variáveis de um padrão na primeira posição em que aparecem.
type Layout = Vec<(String, Position)>;

/// Testes intra-fato de um padrão.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct AlphaTest {
    subject: Option<Value>,
    predicate: Option<Value>,
    object: Option<Value>,
    /// Posições que precisam ter o mesmo valor (variável repetida).
    equalities: Vec<(Position, Position)>,
}

impl AlphaTest {
    fn from_pattern(pattern: &Pattern) -> Self {
        let mut first: Vec<(&str, Position)> = Vec::new();
        let mut equalities = Vec::new();
        for pos in Position::ALL {
            if let Term::Variable(name) = pattern.term(pos) {
                match first.iter().find(|(n, _)| *n == name.as_str()) {
                    Some(&(_, earlier)) => equalities.push((earlier, pos)),
                    None => first.push((name.as_str(), pos)),
                }
            }
        }
        Self {
            subject: pattern.subject.constant().cloned(),
            predicate: pattern.predicate.constant().cloned(),
            object: pattern.object.constant().cloned(),
            equalities,
        }
    }

    fn matches(&self, fact: &Fact) -> bool {
        let constants = [
            (&self.subject, Position::Subject),
            (&self.predicate, Position::Predicate),
            (&self.object, Position::Object),
        ];
        constants
            .iter()
            .all(|(constant, pos)| constant.as_ref().map_or(true, |v| *v == fact.value(*pos)))
            && self
                .equalities
                .iter()
                .all(|(a, b)| fact.value(*a) == fact.value(*b))
    }
}

fn layout_of(pattern: &Pattern) -> Layout {
    let mut layout: Layout = Vec::new();
    for (name, pos) in pattern.variables() {
        if !layout.iter().any(|(n, _)| *n == name) {
            layout.push((name, pos));
        }
    }
    layout
}

fn bindings_from(layout: &Layout, fact: &Fact) -> Bindings {
    layout
        .iter()
        .map(|(name, pos)| (name.clone(), fact.value(*pos)))
        .collect()
}

/// Teste de junção: a variável já ligada à esquerda deve valer o mesmo que
/// a posição do fato à direita.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct JoinTest {
    variable: String,
    position: Position,
}

#[derive(Debug)]
struct AlphaNode {
    test: AlphaTest,
    memories: Vec<NodeId>,
}

#[derive(Debug)]
struct AlphaMemory {
    alpha: NodeId,
    layout: Layout,
    facts: Vec<Fact>,
    seen: HashSet<Fact>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct BetaNode {
    left: NodeId,
    right: NodeId,
    tests: Vec<JoinTest>,
    /// Variáveis novas que o fato da direita acrescenta.
    contributes: Layout,
    memory: NodeId,
}

#[derive(Debug)]
struct BetaMemory {
    variables: BTreeSet<String>,
    matches: Vec<Bindings>,
    seen: HashSet<Bindings>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct TerminalNode {
    rule: usize,
    source: NodeId,
    fired: u64,
}

#[derive(Debug)]
enum Node {
    Alpha(AlphaNode),
    AlphaMemory(AlphaMemory),
    Beta(BetaNode),
    BetaMemory(BetaMemory),
    Terminal(TerminalNode),
}

/// O que chega a um nó vindo de uma memória.
enum Token {
    Fact(Fact),
    Bindings(Bindings),
}

/// Contagem de nós por tipo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub rules: usize,
    pub alpha_nodes: usize,
    pub alpha_memories: usize,
    pub beta_nodes: usize,
    pub beta_memories: usize,
    pub terminals: usize,
}

/// Conteúdo das memórias, serializável junto com o grafo.
///
/// Só pode ser restaurado numa rede com exatamente as mesmas regras, na
/// mesma ordem: a `fingerprint` garante isso.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub fingerprint: String,
    pub alpha_memories: BTreeMap<NodeId, Vec<Fact>>,
    pub beta_memories: BTreeMap<NodeId, Vec<Bindings>>,
    #[serde(default)]
    pub pending: Vec<Fact>,
}

/// Rede Rete com memórias persistentes entre inserções.
#[derive(Debug)]
pub struct RuleNetwork {
    nodes: Vec<Node>,
    alpha_index: HashMap<AlphaTest, NodeId>,
    alpha_memory_index: HashMap<(NodeId, Layout), NodeId>,
    beta_index: HashMap<(NodeId, NodeId, Vec<JoinTest>), NodeId>,
    /// predicado → nós alpha com esse predicado constante
    entry_points: HashMap<String, Vec<NodeId>>,
    /// nós alpha com predicado variável ou coringa
    wildcard_entries: Vec<NodeId>,
    rules: Vec<Rule>,
    rule_index: HashMap<String, usize>,
    /// Nós criados desde o último `seed`, em ordem de criação.
    unseeded: Vec<NodeId>,
    derived_in_session: usize,
    depth: usize,
    max_depth: usize,
    pending: VecDeque<Fact>,
}

impl Default for RuleNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleNetwork {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            nodes: Vec::new(),
            alpha_index: HashMap::new(),
            alpha_memory_index: HashMap::new(),
            beta_index: HashMap::new(),
            entry_points: HashMap::new(),
            wildcard_entries: Vec::new(),
            rules: Vec::new(),
            rule_index: HashMap::new(),
            unseeded: Vec::new(),
            derived_in_session: 0,
            depth: 0,
            max_depth: max_depth.max(1),
            pending: VecDeque::new(),
        }
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rule_index.get(name.trim()).map(|&i| &self.rules[i])
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ─── compilação ────────────────────────────────────────────

    /// Compila uma regra, reaproveitando nós equivalentes já existentes.
    ///
    /// Devolve `Ok(false)` se já há uma regra com esse nome. Os nós novos
    /// ficam vazios até [`seed`](Self::seed) ser chamado com o grafo.
    pub fn add_rule(&mut self, rule: Rule) -> Result<bool, RuleError> {
        if rule.patterns.is_empty() {
            return Err(RuleError::EmptyRule(rule.name));
        }
        if self.rule_index.contains_key(&rule.name) {
            tracing::debug!(rule = %rule.name, "Regra já compilada, ignorando");
            return Ok(false);
        }
        let rule_idx = self.rules.len();

        let mut left = self.build_alpha(&rule.patterns[0]);
        let mut bound: BTreeSet<String> = layout_of(&rule.patterns[0])
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        for pattern in &rule.patterns[1..] {
            let right = self.build_alpha(pattern);
            let (shared, fresh): (Layout, Layout) = layout_of(pattern)
                .into_iter()
                .partition(|(name, _)| bound.contains(name));
            let tests = shared
                .into_iter()
                .map(|(variable, position)| JoinTest { variable, position })
                .collect();
            bound.extend(fresh.iter().map(|(name, _)| name.clone()));
            left = self.build_beta(left, right, tests, fresh, bound.clone());
        }

        let terminal = self.push(Node::Terminal(TerminalNode {
            rule: rule_idx,
            source: left,
            fired: 0,
        }));
        self.add_child(left, terminal);

        tracing::info!(
            rule = %rule.name,
            patterns = rule.patterns.len(),
            nodes = self.nodes.len(),
            "Regra compilada"
        );
        self.rule_index.insert(rule.name.clone(), rule_idx);
        self.rules.push(rule);
        Ok(true)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.unseeded.push(id);
        id
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        match &mut self.nodes[parent] {
            Node::AlphaMemory(m) => m.children.push(child),
            Node::BetaMemory(m) => m.children.push(child),
            _ => {}
        }
    }

    /// Devolve a memória alpha do padrão, criando alpha e memória se preciso.
    fn build_alpha(&mut self, pattern: &Pattern) -> NodeId {
        let test = AlphaTest::from_pattern(pattern);
        let alpha = match self.alpha_index.get(&test) {
            Some(&id) => id,
            None => {
                let id = self.push(Node::Alpha(AlphaNode {
                    test: test.clone(),
                    memories: Vec::new(),
                }));
                match pattern.predicate_name() {
                    Some(name) => self.entry_points.entry(name.to_string()).or_default().push(id),
                    None => self.wildcard_entries.push(id),
                }
                self.alpha_index.insert(test, id);
                id
            }
        };

        let layout = layout_of(pattern);
        let key = (alpha, layout.clone());
        if let Some(&memory) = self.alpha_memory_index.get(&key) {
            return memory;
        }
        let memory = self.push(Node::AlphaMemory(AlphaMemory {
            alpha,
            layout,
            facts: Vec::new(),
            seen: HashSet::new(),
            children: Vec::new(),
        }));
        if let Node::Alpha(a) = &mut self.nodes[alpha] {
            a.memories.push(memory);
        }
        self.alpha_memory_index.insert(key, memory);
        memory
    }

    /// Devolve a memória beta da junção `left ⋈ right`.
    fn build_beta(
        &mut self,
        left: NodeId,
        right: NodeId,
        tests: Vec<JoinTest>,
        contributes: Layout,
        variables: BTreeSet<String>,
    ) -> NodeId {
        let key = (left, right, tests.clone());
        if let Some(&beta) = self.beta_index.get(&key) {
            if let Node::Beta(b) = &self.nodes[beta] {
                return b.memory;
            }
        }
        let beta = self.nodes.len();
        let memory = beta + 1;
        self.push(Node::Beta(BetaNode {
            left,
            right,
            tests,
            contributes,
            memory,
        }));
        self.push(Node::BetaMemory(BetaMemory {
            variables,
            matches: Vec::new(),
            seen: HashSet::new(),
            children: Vec::new(),
        }));
        self.add_child(left, beta);
        if right != left {
            self.add_child(right, beta);
        }
        self.beta_index.insert(key, beta);
        memory
    }

    // ─── semeadura ─────────────────────────────────────────────

    /// Preenche os nós criados desde a última chamada com o estado atual do
    /// grafo, depois dispara os terminais novos para cada casamento.
    ///
    /// Memórias pré-existentes já estão corretas e não são tocadas.
    pub fn seed(&mut self, graph: &mut KnowledgeGraph) {
        if self.unseeded.is_empty() {
            return;
        }
        let created = std::mem::take(&mut self.unseeded);
        let facts = graph.facts();
        let mut terminals = Vec::new();

        for id in created {
            match &self.nodes[id] {
                Node::AlphaMemory(_) => self.seed_alpha_memory(id, &facts),
                Node::Beta(_) => self.seed_beta(id),
                Node::Terminal(_) => terminals.push(id),
                Node::Alpha(_) | Node::BetaMemory(_) => {}
            }
        }

        for terminal in terminals {
            let source = match &self.nodes[terminal] {
                Node::Terminal(t) => t.source,
                _ => continue,
            };
            for i in 0..self.len_of(source) {
                if let Some(bindings) = self.item_bindings(source, i) {
                    self.fire(terminal, bindings, graph);
                }
            }
        }
    }

    fn seed_alpha_memory(&mut self, memory: NodeId, facts: &[Fact]) {
        let test = match &self.nodes[memory] {
            Node::AlphaMemory(m) => match &self.nodes[m.alpha] {
                Node::Alpha(a) => a.test.clone(),
                _ => return,
            },
            _ => return,
        };
        if let Node::AlphaMemory(m) = &mut self.nodes[memory] {
            for fact in facts.iter().filter(|f| test.matches(f)) {
                if m.seen.insert(fact.clone()) {
                    m.facts.push(fact.clone());
                }
            }
        }
    }

    fn seed_beta(&mut self, beta: NodeId) {
        let (left, right, memory) = match &self.nodes[beta] {
            Node::Beta(b) => (b.left, b.right, b.memory),
            _ => return,
        };
        let mut joined = Vec::new();
        for i in 0..self.len_of(left) {
            let Some(left_bindings) = self.item_bindings(left, i) else {
                continue;
            };
            for j in 0..self.len_of(right) {
                if let Some(fact) = self.alpha_fact(right, j) {
                    joined.extend(self.join(beta, &left_bindings, &fact));
                }
            }
        }
        if let Node::BetaMemory(m) = &mut self.nodes[memory] {
            for bindings in joined {
                if m.seen.insert(bindings.clone()) {
                    m.matches.push(bindings);
                }
            }
        }
    }

    // ─── propagação ────────────────────────────────────────────

    /// Propaga um fato recém-inserido no grafo.
    ///
    /// Além de `max_depth` níveis de recursão, o fato é enfileirado para o
    /// próximo [`run`](Self::run).
    pub fn add_fact(&mut self, fact: Fact, graph: &mut KnowledgeGraph) {
        if self.depth >= self.max_depth {
            tracing::debug!(fact = %fact, depth = self.depth, "Profundidade máxima, fato enfileirado");
            self.pending.push_back(fact);
            return;
        }
        self.depth += 1;
        let mut alphas = self
            .entry_points
            .get(&fact.predicate)
            .cloned()
            .unwrap_or_default();
        alphas.extend(self.wildcard_entries.iter().copied());
        for alpha in alphas {
            self.activate_alpha(alpha, &fact, graph);
        }
        self.depth -= 1;
    }

    /// Drena os fatos enfileirados e devolve quantas relações novas foram
    /// derivadas desde a chamada anterior.
    pub fn run(&mut self, graph: &mut KnowledgeGraph) -> usize {
        let batch: Vec<Fact> = self.pending.drain(..).collect();
        for fact in batch {
            self.add_fact(fact, graph);
        }
        std::mem::take(&mut self.derived_in_session)
    }

    fn activate_alpha(&mut self, alpha: NodeId, fact: &Fact, graph: &mut KnowledgeGraph) {
        let memories = match &self.nodes[alpha] {
            Node::Alpha(a) if a.test.matches(fact) => a.memories.clone(),
            _ => return,
        };
        for memory in memories {
            self.activate_alpha_memory(memory, fact, graph);
        }
    }

    fn activate_alpha_memory(&mut self, memory: NodeId, fact: &Fact, graph: &mut KnowledgeGraph) {
        let children = match &mut self.nodes[memory] {
            Node::AlphaMemory(m) => {
                if !m.seen.insert(fact.clone()) {
                    return;
                }
                m.facts.push(fact.clone());
                m.children.clone()
            }
            _ => return,
        };
        let token = Token::Fact(fact.clone());
        for child in children {
            self.activate(child, memory, &token, graph);
        }
    }

    fn activate_beta_memory(&mut self, memory: NodeId, bindings: Bindings, graph: &mut KnowledgeGraph) {
        let children = match &mut self.nodes[memory] {
            Node::BetaMemory(m) => {
                if !m.seen.insert(bindings.clone()) {
                    return;
                }
                m.matches.push(bindings.clone());
                m.children.clone()
            }
            _ => return,
        };
        let token = Token::Bindings(bindings);
        for child in children {
            self.activate(child, memory, &token, graph);
        }
    }

    /// Entrega um token vindo da memória `from` ao nó `node`.
    fn activate(&mut self, node: NodeId, from: NodeId, token: &Token, graph: &mut KnowledgeGraph) {
        match &self.nodes[node] {
            Node::Beta(b) => {
                let (left, right) = (b.left, b.right);
                // left == right: padrões repetidos, o fato ativa os dois lados
                if from == left {
                    self.left_activate(node, from, token, graph);
                }
                if from == right {
                    if let Token::Fact(fact) = token {
                        self.right_activate(node, fact, graph);
                    }
                }
            }
            Node::Terminal(_) => {
                if let Some(bindings) = self.token_bindings(from, token) {
                    self.fire(node, bindings, graph);
                }
            }
            _ => {}
        }
    }

    fn left_activate(&mut self, beta: NodeId, from: NodeId, token: &Token, graph: &mut KnowledgeGraph) {
        let Some(left_bindings) = self.token_bindings(from, token) else {
            return;
        };
        let (right, memory) = match &self.nodes[beta] {
            Node::Beta(b) => (b.right, b.memory),
            _ => return,
        };
        let count = self.len_of(right);
        for i in 0..count {
            let Some(fact) = self.alpha_fact(right, i) else {
                continue;
            };
            if let Some(joined) = self.join(beta, &left_bindings, &fact) {
                self.activate_beta_memory(memory, joined, graph);
            }
        }
    }

    fn right_activate(&mut self, beta: NodeId, fact: &Fact, graph: &mut KnowledgeGraph) {
        let (left, memory) = match &self.nodes[beta] {
            Node::Beta(b) => (b.left, b.memory),
            _ => return,
        };
        let count = self.len_of(left);
        for i in 0..count {
            let Some(left_bindings) = self.item_bindings(left, i) else {
                continue;
            };
            if let Some(joined) = self.join(beta, &left_bindings, fact) {
                self.activate_beta_memory(memory, joined, graph);
            }
        }
    }

    fn join(&self, beta: NodeId, left: &Bindings, fact: &Fact) -> Option<Bindings> {
        let Node::Beta(b) = &self.nodes[beta] else {
            return None;
        };
        for test in &b.tests {
            match left.get(&test.variable) {
                Some(value) if *value == fact.value(test.position) => {}
                Some(_) => return None,
                None => {
                    let err = RuleError::UnboundVariable {
                        variable: test.variable.clone(),
                    };
                    tracing::warn!(node = beta, error = %err, "Teste de junção descartado");
                    return None;
                }
            }
        }
        let mut joined = left.clone();
        for (name, pos) in &b.contributes {
            joined.insert(name.clone(), fact.value(*pos));
        }
        Some(joined)
    }

    fn fire(&mut self, terminal: NodeId, bindings: Bindings, graph: &mut KnowledgeGraph) {
        let rule_idx = match &mut self.nodes[terminal] {
            Node::Terminal(t) => {
                t.fired += 1;
                t.rule
            }
            _ => return,
        };
        let Some(rule) = self.rules.get(rule_idx).cloned() else {
            return;
        };
        match rule.action.apply(&bindings, graph) {
            Ok(derivations) => {
                for derivation in derivations {
                    self.assert_derived(&rule.name, derivation, graph);
                }
            }
            Err(err) => {
                tracing::warn!(rule = %rule.name, error = %err, "Ação de regra falhou");
            }
        }
    }

    fn assert_derived(&mut self, rule: &str, derivation: Derivation, graph: &mut KnowledgeGraph) {
        let Derivation {
            subject,
            predicate,
            object,
            mut attributes,
        } = derivation;
        if attributes.source.is_none() {
            attributes.source = Some(format!("infer:{}", rule));
        }
        let options = InsertOptions {
            dedupe: true,
            check_conflict: false,
        };
        match graph.store_relation(subject, &predicate, object, attributes, options) {
            Ok(StoreOutcome::Inserted { fact, .. }) => {
                self.derived_in_session += 1;
                tracing::debug!(rule = %rule, fact = %fact, "Fato derivado");
                self.add_fact(fact, graph);
            }
            Ok(StoreOutcome::Merged(_)) => {}
            Err(err) => {
                tracing::warn!(rule = %rule, error = %err, "Derivação rejeitada pelo grafo");
            }
        }
    }

    // ─── acesso às memórias ────────────────────────────────────

    fn len_of(&self, memory: NodeId) -> usize {
        match &self.nodes[memory] {
            Node::AlphaMemory(m) => m.facts.len(),
            Node::BetaMemory(m) => m.matches.len(),
            _ => 0,
        }
    }

    fn item_bindings(&self, memory: NodeId, index: usize) -> Option<Bindings> {
        match &self.nodes[memory] {
            Node::AlphaMemory(m) => m.facts.get(index).map(|f| bindings_from(&m.layout, f)),
            Node::BetaMemory(m) => m.matches.get(index).cloned(),
            _ => None,
        }
    }

    fn alpha_fact(&self, memory: NodeId, index: usize) -> Option<Fact> {
        match &self.nodes[memory] {
            Node::AlphaMemory(m) => m.facts.get(index).cloned(),
            _ => None,
        }
    }

    fn token_bindings(&self, from: NodeId, token: &Token) -> Option<Bindings> {
        match token {
            Token::Bindings(bindings) => Some(bindings.clone()),
            Token::Fact(fact) => match &self.nodes[from] {
                Node::AlphaMemory(m) => Some(bindings_from(&m.layout, fact)),
                _ => None,
            },
        }
    }

    // ─── introspecção ──────────────────────────────────────────

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            rules: self.rules.len(),
            ..NetworkStats::default()
        };
        for node in &self.nodes {
            match node {
                Node::Alpha(_) => stats.alpha_nodes += 1,
                Node::AlphaMemory(_) => stats.alpha_memories += 1,
                Node::Beta(_) => stats.beta_nodes += 1,
                Node::BetaMemory(_) => stats.beta_memories += 1,
                Node::Terminal(_) => stats.terminals += 1,
            }
        }
        stats
    }

    /// Quantas vezes o terminal da regra disparou.
    pub fn fired_count(&self, rule: &str) -> Option<u64> {
        let idx = *self.rule_index.get(rule.trim())?;
        self.nodes.iter().find_map(|node| match node {
            Node::Terminal(t) if t.rule == idx => Some(t.fired),
            _ => None,
        })
    }

    /// Ligações completas atualmente guardadas para a regra.
    pub fn matches(&self, rule: &str) -> Vec<Bindings> {
        let Some(&idx) = self.rule_index.get(rule.trim()) else {
            return Vec::new();
        };
        let source = self.nodes.iter().find_map(|node| match node {
            Node::Terminal(t) if t.rule == idx => Some(t.source),
            _ => None,
        });
        let Some(source) = source else {
            return Vec::new();
        };
        (0..self.len_of(source))
            .filter_map(|i| self.item_bindings(source, i))
            .collect()
    }

    /// Variáveis ligadas ao final das premissas da regra.
    pub fn bound_variables(&self, rule: &str) -> BTreeSet<String> {
        let Some(&idx) = self.rule_index.get(rule.trim()) else {
            return BTreeSet::new();
        };
        let source = self.nodes.iter().find_map(|node| match node {
            Node::Terminal(t) if t.rule == idx => Some(t.source),
            _ => None,
        });
        match source.map(|id| &self.nodes[id]) {
            Some(Node::BetaMemory(m)) => m.variables.clone(),
            Some(Node::AlphaMemory(m)) => m.layout.iter().map(|(name, _)| name.clone()).collect(),
            _ => BTreeSet::new(),
        }
    }

    // ─── snapshot ──────────────────────────────────────────────

    /// Hash SHA-256 dos nomes e padrões das regras, na ordem de compilação.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for rule in &self.rules {
            hasher.update(rule.name.as_bytes());
            hasher.update(b"\n");
            for pattern in &rule.patterns {
                hasher.update(format!("{:?}", pattern).as_bytes());
                hasher.update(b";");
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let mut alpha_memories = BTreeMap::new();
        let mut beta_memories = BTreeMap::new();
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::AlphaMemory(m) => {
                    alpha_memories.insert(id, m.facts.clone());
                }
                Node::BetaMemory(m) => {
                    beta_memories.insert(id, m.matches.clone());
                }
                _ => {}
            }
        }
        NetworkSnapshot {
            fingerprint: self.fingerprint(),
            alpha_memories,
            beta_memories,
            pending: self.pending.iter().cloned().collect(),
        }
    }

    /// Restaura memórias salvas por [`snapshot`](Self::snapshot).
    ///
    /// # Erros
    ///
    /// - [`SnapshotError::FingerprintMismatch`] se as regras diferem
    /// - [`SnapshotError::UnknownNode`] se um id não é uma memória do tipo
    ///   esperado; nada é alterado nesse caso
    pub fn restore(&mut self, snapshot: &NetworkSnapshot) -> Result<(), SnapshotError> {
        let expected = self.fingerprint();
        if snapshot.fingerprint != expected {
            return Err(SnapshotError::FingerprintMismatch {
                expected,
                found: snapshot.fingerprint.clone(),
            });
        }
        for &id in snapshot.alpha_memories.keys() {
            if !matches!(self.nodes.get(id), Some(Node::AlphaMemory(_))) {
                return Err(SnapshotError::UnknownNode(id));
            }
        }
        for &id in snapshot.beta_memories.keys() {
            if !matches!(self.nodes.get(id), Some(Node::BetaMemory(_))) {
                return Err(SnapshotError::UnknownNode(id));
            }
        }

        for (&id, facts) in &snapshot.alpha_memories {
            if let Some(Node::AlphaMemory(m)) = self.nodes.get_mut(id) {
                m.seen = facts.iter().cloned().collect();
                m.facts = facts.clone();
            }
        }
        for (&id, matches) in &snapshot.beta_memories {
            if let Some(Node::BetaMemory(m)) = self.nodes.get_mut(id) {
                m.seen = matches.iter().cloned().collect();
                m.matches = matches.clone();
            }
        }
        self.pending = snapshot.pending.iter().cloned().collect();
        self.unseeded.clear();
        tracing::info!(
            alpha = snapshot.alpha_memories.len(),
            beta = snapshot.beta_memories.len(),
            "Memórias da rede restauradas"
        );
        Ok(())
    }
}
