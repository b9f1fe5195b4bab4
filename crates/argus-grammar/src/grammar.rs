use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parameter::Parameter;

/// How candidates are combined when several dependent patterns match
/// the same prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Every matching entry contributes its parameters.
    #[default]
    Union,
    /// Only the first matching entry, in declaration order, contributes.
    FirstMatch,
}

/// A dependent-grammar entry with its pattern compiled for full-string
/// matching against the space-joined prefix.
#[derive(Debug, Clone)]
pub struct DependentRule {
    pub source: String,
    pub pattern: Regex,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone)]
pub enum GrammarShape {
    Bounded(Vec<Parameter>),
    Dependent(Vec<DependentRule>),
}

/// Declarative argument schema that answers "what may come next".
#[derive(Debug, Clone)]
pub struct ParameterGrammar {
    shape: GrammarShape,
    match_policy: MatchPolicy,
}

impl ParameterGrammar {
    pub fn bounded(parameters: Vec<Parameter>) -> Self {
        Self {
            shape: GrammarShape::Bounded(parameters),
            match_policy: MatchPolicy::Union,
        }
    }

    pub fn dependent(rules: Vec<DependentRule>) -> Self {
        Self {
            shape: GrammarShape::Dependent(rules),
            match_policy: MatchPolicy::Union,
        }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    pub fn shape(&self) -> &GrammarShape {
        &self.shape
    }

    /// Bounded grammars have a fixed-length schema and are sampled at
    /// random; dependent grammars need tree search.
    pub fn is_bounded(&self) -> bool {
        matches!(self.shape, GrammarShape::Bounded(_))
    }

    /// Parameters legal for the slot after `prefix`. Empty means the
    /// prefix is already a complete argument vector.
    pub fn next_choices<S: AsRef<str>>(&self, prefix: &[S]) -> Vec<&Parameter> {
        match &self.shape {
            GrammarShape::Bounded(params) => params.get(prefix.len()).into_iter().collect(),
            GrammarShape::Dependent(rules) => {
                let joined = prefix
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut choices: Vec<&Parameter> = Vec::new();
                for rule in rules.iter().filter(|r| r.pattern.is_match(&joined)) {
                    for param in &rule.parameters {
                        if !choices.contains(&param) {
                            choices.push(param);
                        }
                    }
                    if self.match_policy == MatchPolicy::FirstMatch {
                        break;
                    }
                }
                choices
            }
        }
    }

    pub fn is_complete<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        self.next_choices(prefix).is_empty()
    }
}

/// Anchor a dependent pattern so it must match the whole joined prefix.
pub fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}
