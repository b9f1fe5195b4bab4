use argus_ir::types::{TestBounds, TestSpec};
use regex::Regex;

use crate::grammar::{anchored, DependentRule, MatchPolicy, ParameterGrammar};
use crate::parameter::Parameter;
use crate::validate::{validate_bounds, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("Validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Validation(Vec<ValidationError>),

    #[error("Pattern compilation error: {0}")]
    Pattern(#[from] regex::Error),
}

/// A predefined test with its expectations compiled.
#[derive(Debug, Clone)]
pub struct BasicTest {
    pub args: Vec<String>,
    pub stdout: Option<Regex>,
    pub stderr: Option<Regex>,
}

impl BasicTest {
    fn from_spec(spec: &TestSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            args: spec.args.clone(),
            stdout: spec.stdout.as_deref().map(expectation).transpose()?,
            stderr: spec.stderr.as_deref().map(expectation).transpose()?,
        })
    }

    /// Whether captured output meets both expectations. Trailing newlines
    /// are ignored; an absent expectation accepts anything.
    pub fn matches(&self, stdout: &str, stderr: &str) -> bool {
        let ok = |re: &Option<Regex>, text: &str| {
            re.as_ref()
                .map_or(true, |re| re.is_match(text.trim_end_matches(['\r', '\n'])))
        };
        ok(&self.stdout, stdout) && ok(&self.stderr, stderr)
    }
}

fn expectation(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?s:{pattern})$"))
}

#[derive(Debug, Clone)]
pub struct CompiledBounds {
    pub grammar: ParameterGrammar,
    pub tests: Vec<BasicTest>,
}

pub fn compile(bounds: &TestBounds, policy: MatchPolicy) -> Result<CompiledBounds, GrammarError> {
    // 1. Validate
    validate_bounds(bounds).map_err(GrammarError::Validation)?;

    // 2. Build the grammar
    let grammar = match (&bounds.parameters, &bounds.dependent) {
        (Some(params), _) => {
            ParameterGrammar::bounded(params.iter().map(Parameter::from_spec).collect())
        }
        (None, entries) => {
            let mut rules = Vec::new();
            for entry in entries.iter().flatten() {
                rules.push(DependentRule {
                    source: entry.pattern.clone(),
                    pattern: anchored(&entry.pattern)?,
                    parameters: entry.parameters.iter().map(Parameter::from_spec).collect(),
                });
            }
            ParameterGrammar::dependent(rules)
        }
    }
    .with_match_policy(policy);

    // 3. Compile predefined tests
    let tests = bounds
        .tests
        .iter()
        .map(BasicTest::from_spec)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        bounded = grammar.is_bounded(),
        tests = tests.len(),
        "compiled test bounds"
    );
    Ok(CompiledBounds { grammar, tests })
}
