//! Coverage-guided tree search over dependent grammars.
//!
//! Each call to [`TreeGenerator::next_vector`] first folds the previous
//! test's coverage into the [`CoverageAccountant`] and backpropagates the
//! resulting uniqueness delta, then walks the tree from the root to an
//! untested terminal node. The walk runs inside a tree journal: if any
//! step fails the tree is rolled back and one random vector is produced
//! instead.

use std::f64::consts::SQRT_2;
use std::sync::Arc;

use argus_grammar::grammar::{MatchPolicy, ParameterGrammar};
use argus_grammar::value::{resolve, ValueConfig, ValueError};
use argus_ir::output::Output;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::score::{select_child, SelectError};
use super::trace::{SearchTrace, TraceStepKind};
use super::tree::{NodeId, SearchTree, TreeError};
use crate::coverage::CoverageAccountant;
use crate::solver::random::RandomGenerator;
use crate::solver::rng::{stage_rng, STAGE_FALLBACK, STAGE_TREE};
use crate::solver::ArgVector;

/// Tunables for generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight of the exploration bonus against mean uniqueness.
    pub exploration_weight: f64,
    /// How dependent entries combine when several match one prefix.
    pub match_policy: MatchPolicy,
    /// Maximum number of extra values drawn per node for open parameters.
    pub open_child_limit: u32,
    /// Upper bound on walk iterations for one generated vector.
    pub max_walk_steps: usize,
    /// Longest argument vector the generators will build.
    pub max_vector_len: usize,
    pub seed: u64,
    /// Keep a step-by-step trace of tree decisions.
    pub record_trace: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exploration_weight: SQRT_2,
            match_policy: MatchPolicy::Union,
            open_child_limit: 8,
            max_walk_steps: 10_000,
            max_vector_len: 64,
            seed: 42,
            record_trace: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Selection error: {0}")]
    Select(#[from] SelectError),

    #[error("Value resolution failed: {0}")]
    Value(#[from] ValueError),

    #[error("Walk did not reach a terminal node within {0} steps")]
    WalkLimit(usize),
}

enum Step {
    Return(NodeId),
    Move(NodeId),
    Exhausted,
}

pub struct TreeGenerator {
    grammar: Arc<ParameterGrammar>,
    values: ValueConfig,
    config: SearchConfig,
    tree: SearchTree,
    accountant: CoverageAccountant<NodeId>,
    rng: ChaCha8Rng,
    fallback: RandomGenerator,
    last: Option<NodeId>,
    exhausted: bool,
    trace: Option<SearchTrace>,
}

impl TreeGenerator {
    pub fn new(grammar: Arc<ParameterGrammar>, values: ValueConfig, config: SearchConfig) -> Self {
        let root_terminal = grammar.is_complete::<String>(&[]);
        let fallback = RandomGenerator::new(
            grammar.clone(),
            values.clone(),
            stage_rng(config.seed, STAGE_FALLBACK),
            config.max_vector_len,
        );
        Self {
            rng: stage_rng(config.seed, STAGE_TREE),
            trace: config.record_trace.then(SearchTrace::new),
            tree: SearchTree::new(root_terminal),
            accountant: CoverageAccountant::new(),
            grammar,
            values,
            config,
            fallback,
            last: None,
            exhausted: false,
        }
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn accountant(&self) -> &CoverageAccountant<NodeId> {
        &self.accountant
    }

    pub fn trace(&self) -> Option<&SearchTrace> {
        self.trace.as_ref()
    }

    /// True once every path has been tested and pruned; from then on all
    /// vectors are random.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Node that produced the most recently returned vector, if it came
    /// from the tree.
    pub fn last_node(&self) -> Option<NodeId> {
        self.last
    }

    /// Fold `prior` into the tree, then produce the next vector to test.
    pub fn next_vector(&mut self, prior: Option<Arc<Output>>) -> Result<ArgVector, ValueError> {
        let last = self.last.take();
        if let (Some(output), Some(node)) = (prior, last) {
            self.fold(node, output);
        }

        if self.exhausted {
            return self.fallback.next_vector();
        }

        self.tree.begin();
        match self.walk() {
            Ok(Some(node)) => {
                let args = self.tree.tokens(node);
                match args {
                    Ok(args) => {
                        self.tree.commit();
                        self.last = Some(node);
                        self.record(Some(node), TraceStepKind::Returned { args: args.clone() });
                        Ok(args)
                    }
                    Err(e) => self.recover(SearchError::Tree(e)),
                }
            }
            Ok(None) => {
                self.tree.commit();
                self.exhausted = true;
                tracing::info!(
                    nodes = self.tree.len(),
                    "search tree exhausted, switching to random generation"
                );
                self.record(None, TraceStepKind::Exhausted);
                self.fallback.next_vector()
            }
            Err(e) => self.recover(e),
        }
    }

    fn recover(&mut self, error: SearchError) -> Result<ArgVector, ValueError> {
        self.tree.rollback();
        tracing::warn!(error = %error, "tree search failed, generating one random vector");
        self.record(
            None,
            TraceStepKind::Fallback {
                reason: error.to_string(),
            },
        );
        self.fallback.next_vector()
    }

    fn fold(&mut self, node: NodeId, output: Arc<Output>) {
        if !self.tree.contains(node) {
            tracing::debug!(?node, "scored node no longer in tree");
            return;
        }
        match self.accountant.record(&output.coverage, node) {
            Ok(delta) => {
                if let Err(e) = self.tree.backpropagate(node, delta as f64, Some(output)) {
                    tracing::warn!(error = %e, "backpropagation failed");
                    return;
                }
                tracing::debug!(?node, delta, "folded coverage");
                self.record(Some(node), TraceStepKind::Scored { delta });
            }
            Err(e) => tracing::warn!(error = %e, "coverage rejected, test left unscored"),
        }
    }

    /// Walk from the root to an untested terminal node. `None` means the
    /// whole tree has been pruned away.
    fn walk(&mut self) -> Result<Option<NodeId>, SearchError> {
        let mut current = self.tree.root();
        for _ in 0..self.config.max_walk_steps {
            match self.step(current)? {
                Step::Return(node) => {
                    self.tree.set_tested(node)?;
                    return Ok(Some(node));
                }
                Step::Move(next) => current = next,
                Step::Exhausted => return Ok(None),
            }
        }
        Err(SearchError::WalkLimit(self.config.max_walk_steps))
    }

    fn step(&mut self, id: NodeId) -> Result<Step, SearchError> {
        let node = self.tree.node(id)?;

        if node.terminal {
            if !node.tested {
                return Ok(Step::Return(id));
            }
            return self.prune(id);
        }

        if let Some(child) = self.untested_terminal_child(id)? {
            return Ok(Step::Return(child));
        }

        let tokens = self.tree.tokens(id)?;
        if self.is_expandable(id, &tokens)? {
            self.expand(id, &tokens)?;
            if let Some(child) = self.untested_terminal_child(id)? {
                return Ok(Step::Return(child));
            }
        }

        match select_child(&self.tree, id, self.config.exploration_weight, &mut self.rng)? {
            Some(child) => Ok(Step::Move(child)),
            None => self.prune(id),
        }
    }

    fn prune(&mut self, id: NodeId) -> Result<Step, SearchError> {
        if id == self.tree.root() {
            return Ok(Step::Exhausted);
        }
        let parent = self.tree.prune(id)?;
        self.record(Some(id), TraceStepKind::Pruned);
        Ok(Step::Move(parent))
    }

    fn untested_terminal_child(&mut self, id: NodeId) -> Result<Option<NodeId>, SearchError> {
        let mut candidates = Vec::new();
        for child in self.tree.children(id)? {
            let node = self.tree.node(child)?;
            if node.terminal && !node.tested {
                candidates.push(child);
            }
        }
        Ok(candidates.choose(&mut self.rng).copied())
    }

    fn is_expandable(&self, id: NodeId, tokens: &[String]) -> Result<bool, SearchError> {
        let node = self.tree.node(id)?;
        if tokens.len() >= self.config.max_vector_len {
            return Ok(false);
        }
        if !node.expanded {
            return Ok(true);
        }
        let open = self.grammar.next_choices(tokens).iter().any(|p| p.is_open());
        Ok(open && node.widenings < self.config.open_child_limit)
    }

    /// First expansion materializes every literal choice plus one value
    /// per open parameter. Later expansions draw one more open value.
    /// All values are resolved before the tree is touched.
    fn expand(&mut self, id: NodeId, tokens: &[String]) -> Result<(), SearchError> {
        let grammar = self.grammar.clone();
        let choices = grammar.next_choices(tokens);
        let first = !self.tree.node(id)?.expanded;

        let mut drawn = Vec::new();
        if first {
            for param in &choices {
                match param.literals() {
                    Some(literals) => drawn.extend(literals),
                    None => drawn.push(resolve(param, &self.values, &mut self.rng)?),
                }
            }
        } else {
            let open: Vec<_> = choices.iter().filter(|p| p.is_open()).collect();
            if let Some(param) = open.choose(&mut self.rng) {
                drawn.push(resolve(param, &self.values, &mut self.rng)?);
            }
        }

        let mut path = tokens.to_vec();
        let mut added = 0;
        for token in drawn {
            path.push(token);
            let terminal = grammar.is_complete(&path);
            if let Some(token) = path.pop() {
                if self.tree.add_child(id, token, terminal)?.is_some() {
                    added += 1;
                }
            }
        }

        if first {
            self.tree.set_expanded(id)?;
            self.record(Some(id), TraceStepKind::Expanded { added });
        } else {
            self.tree.add_widening(id)?;
            self.record(
                Some(id),
                TraceStepKind::Widened {
                    added: added > 0,
                },
            );
        }
        Ok(())
    }

    fn record(&mut self, node: Option<NodeId>, kind: TraceStepKind) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(node, kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_grammar::grammar::{anchored, DependentRule};
    use argus_grammar::Parameter;
    use argus_ir::types::ParameterSpec;

    fn rule(pattern: &str, params: Vec<ParameterSpec>) -> DependentRule {
        DependentRule {
            source: pattern.to_string(),
            pattern: anchored(pattern).unwrap(),
            parameters: params.iter().map(Parameter::from_spec).collect(),
        }
    }

    fn generator(rules: Vec<DependentRule>) -> TreeGenerator {
        let config = SearchConfig {
            record_trace: true,
            ..SearchConfig::default()
        };
        TreeGenerator::new(
            Arc::new(ParameterGrammar::dependent(rules)),
            ValueConfig::default(),
            config,
        )
    }

    #[test]
    fn test_root_terminal_when_nothing_matches_empty_prefix() {
        let mut g = generator(vec![rule("--a", vec![ParameterSpec::enumeration(&["x"])])]);
        assert!(g.next_vector(None).unwrap().is_empty());
        assert_eq!(g.tree().len(), 1);

        assert!(g.next_vector(None).unwrap().is_empty());
        assert!(g.is_exhausted());
    }

    #[test]
    fn test_untested_terminal_child_returned_before_descent() {
        let mut g = generator(vec![
            rule("", vec![ParameterSpec::enumeration(&["--a", "--b"])]),
            rule("--a", vec![ParameterSpec::enumeration(&["x", "y"])]),
        ]);
        assert_eq!(g.next_vector(None).unwrap(), vec!["--b"]);
        let trace = g.trace().unwrap();
        assert!(trace
            .steps()
            .iter()
            .any(|s| s.kind == TraceStepKind::Expanded { added: 2 }));
    }

    #[test]
    fn test_open_parameter_widens_up_to_limit() {
        let mut g = generator(vec![rule(
            "",
            vec![ParameterSpec::new("int").with_bounds(Some(0.into()), Some(1_000_000.into()))],
        )]);
        let mut seen = Vec::new();
        for _ in 0..12 {
            seen.push(g.next_vector(None).unwrap());
        }
        let widenings = g
            .trace()
            .unwrap()
            .steps()
            .iter()
            .filter(|s| matches!(s.kind, TraceStepKind::Widened { .. }))
            .count();
        assert_eq!(widenings, g.config.open_child_limit as usize);
        assert!(g.is_exhausted());
        assert!(seen.iter().all(|v| v.len() == 1));
    }

    #[test]
    fn test_invalid_bounds_fall_back_and_keep_tree() {
        let mut g = generator(vec![
            rule("", vec![ParameterSpec::enumeration(&["go"])]),
            rule(
                "go",
                vec![ParameterSpec::new("int").with_bounds(Some(9.into()), Some(1.into()))],
            ),
        ]);
        // Expansion of "go" fails; the random fallback then fails the same way.
        assert!(matches!(
            g.next_vector(None),
            Err(ValueError::InvalidBounds { .. })
        ));
        assert_eq!(g.tree().len(), 1);
        assert!(!g.tree().node(g.tree().root()).unwrap().expanded);
        assert!(g.last_node().is_none());
        let trace = g.trace().unwrap();
        assert!(trace
            .steps()
            .iter()
            .any(|s| matches!(s.kind, TraceStepKind::Fallback { .. })));
    }

    #[test]
    fn test_recursive_grammar_capped_by_vector_length() {
        let mut g = generator(vec![rule(".*", vec![ParameterSpec::enumeration(&["v"])])]);
        g.config.max_vector_len = 3;
        g.fallback = RandomGenerator::new(
            g.grammar.clone(),
            ValueConfig::default(),
            stage_rng(1, STAGE_FALLBACK),
            3,
        );
        for _ in 0..5 {
            let v = g.next_vector(None).unwrap();
            assert!(v.len() <= 3);
        }
        assert!(g.is_exhausted());
    }
}
