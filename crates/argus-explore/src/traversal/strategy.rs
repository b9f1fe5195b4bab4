//! One capability interface over the interchangeable generation strategies.

use std::sync::Arc;

use argus_grammar::grammar::ParameterGrammar;
use argus_grammar::value::{ValueConfig, ValueError};
use argus_ir::output::Output;

use super::engine::{SearchConfig, TreeGenerator};
use super::replay::ReplayGenerator;
use crate::solver::random::RandomGenerator;
use crate::solver::rng::{stage_rng, STAGE_RANDOM};
use crate::solver::ArgVector;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Value resolution failed: {0}")]
    Value(#[from] ValueError),

    #[error("Generator has no more argument vectors")]
    Exhausted,
}

/// Produces the next argument vector to run, given the output of the
/// previous one (`None` when there was none or it was discarded).
pub trait TestGenerator {
    fn generate_next(&mut self, prior: Option<Arc<Output>>) -> Result<ArgVector, GenerateError>;

    fn name(&self) -> &str;
}

impl TestGenerator for RandomGenerator {
    fn generate_next(&mut self, _prior: Option<Arc<Output>>) -> Result<ArgVector, GenerateError> {
        Ok(self.next_vector()?)
    }

    fn name(&self) -> &str {
        "random"
    }
}

impl TestGenerator for TreeGenerator {
    fn generate_next(&mut self, prior: Option<Arc<Output>>) -> Result<ArgVector, GenerateError> {
        Ok(self.next_vector(prior)?)
    }

    fn name(&self) -> &str {
        "tree"
    }
}

impl TestGenerator for ReplayGenerator {
    fn generate_next(&mut self, prior: Option<Arc<Output>>) -> Result<ArgVector, GenerateError> {
        self.next_vector(prior).ok_or(GenerateError::Exhausted)
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// The closed set of strategies, chosen once per run.
pub enum Generator {
    Random(RandomGenerator),
    Tree(Box<TreeGenerator>),
    Replay(ReplayGenerator),
}

impl Generator {
    /// Random sampling for bounded grammars, tree search otherwise.
    pub fn for_grammar(
        grammar: Arc<ParameterGrammar>,
        values: ValueConfig,
        search: SearchConfig,
    ) -> Self {
        if grammar.is_bounded() {
            let rng = stage_rng(search.seed, STAGE_RANDOM);
            Generator::Random(RandomGenerator::new(
                grammar,
                values,
                rng,
                search.max_vector_len,
            ))
        } else {
            Generator::Tree(Box::new(TreeGenerator::new(grammar, values, search)))
        }
    }

    pub fn replay(vectors: Vec<ArgVector>) -> Self {
        Generator::Replay(ReplayGenerator::new(vectors))
    }

    fn inner(&mut self) -> &mut dyn TestGenerator {
        match self {
            Generator::Random(g) => g,
            Generator::Tree(g) => g.as_mut(),
            Generator::Replay(g) => g,
        }
    }
}

impl TestGenerator for Generator {
    fn generate_next(&mut self, prior: Option<Arc<Output>>) -> Result<ArgVector, GenerateError> {
        self.inner().generate_next(prior)
    }

    fn name(&self) -> &str {
        match self {
            Generator::Random(g) => g.name(),
            Generator::Tree(g) => g.name(),
            Generator::Replay(g) => g.name(),
        }
    }
}
