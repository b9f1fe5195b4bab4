//! Uniform random argument vectors, built token by token from the grammar.

use std::sync::Arc;

use argus_grammar::grammar::ParameterGrammar;
use argus_grammar::value::{resolve, ValueConfig, ValueError};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::ArgVector;

/// Draws legal argument vectors uniformly: a uniform choice among the
/// parameters legal at each slot, then a uniform value for that parameter.
pub struct RandomGenerator {
    grammar: Arc<ParameterGrammar>,
    values: ValueConfig,
    rng: ChaCha8Rng,
    max_len: usize,
}

impl RandomGenerator {
    pub fn new(
        grammar: Arc<ParameterGrammar>,
        values: ValueConfig,
        rng: ChaCha8Rng,
        max_len: usize,
    ) -> Self {
        Self {
            grammar,
            values,
            rng,
            max_len,
        }
    }

    /// Build one vector. Optional parameters of a bounded grammar may end
    /// the vector early. Dependent grammars stop at `max_len` tokens.
    pub fn next_vector(&mut self) -> Result<ArgVector, ValueError> {
        let bounded = self.grammar.is_bounded();
        let mut args = ArgVector::new();

        while args.len() < self.max_len {
            let choices = self.grammar.next_choices(&args);
            let Some(param) = choices.choose(&mut self.rng) else {
                break;
            };
            if bounded && param.optional && self.rng.gen_bool(0.5) {
                break;
            }
            args.push(resolve(param, &self.values, &mut self.rng)?);
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::rng::{stage_rng, STAGE_RANDOM};
    use argus_grammar::Parameter;
    use argus_ir::types::ParameterSpec;

    fn generator(params: Vec<ParameterSpec>) -> RandomGenerator {
        let grammar = ParameterGrammar::bounded(params.iter().map(Parameter::from_spec).collect());
        RandomGenerator::new(
            Arc::new(grammar),
            ValueConfig::default(),
            stage_rng(42, STAGE_RANDOM),
            64,
        )
    }

    #[test]
    fn test_pinned_integers() {
        let one = || ParameterSpec::new("int").with_bounds(Some(1.into()), Some(1.into()));
        let mut g = generator(vec![one(), one()]);
        for _ in 0..20 {
            assert_eq!(g.next_vector().unwrap(), vec!["1", "1"]);
        }
    }

    #[test]
    fn test_empty_schema_gives_empty_vector() {
        let mut g = generator(vec![]);
        assert!(g.next_vector().unwrap().is_empty());
    }

    #[test]
    fn test_optional_parameter_sometimes_omitted() {
        let mut g = generator(vec![
            ParameterSpec::enumeration(&["run"]),
            ParameterSpec::enumeration(&["-v"]).optional(),
        ]);
        let lens: Vec<usize> = (0..64).map(|_| g.next_vector().unwrap().len()).collect();
        assert!(lens.contains(&1));
        assert!(lens.contains(&2));
    }

    #[test]
    fn test_invalid_bounds_reported() {
        let mut g = generator(vec![
            ParameterSpec::new("int").with_bounds(Some(5.into()), Some(1.into()))
        ]);
        assert!(matches!(
            g.next_vector(),
            Err(ValueError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_unknown_type_marker() {
        let mut g = generator(vec![ParameterSpec::new("socket")]);
        assert_eq!(g.next_vector().unwrap(), vec!["<unknown type: socket>"]);
    }
}
