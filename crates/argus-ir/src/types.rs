use serde::{Deserialize, Serialize};

/// Top-level test-bounds document for one subject program.
///
/// Carries either a fixed parameter list (`parameters`) or a dependent
/// parameter map (`dependent`), plus any predefined tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestBounds {
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub dependent: Option<Vec<DependentEntry>>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

impl TestBounds {
    /// True when the document declares a fixed-length schema.
    pub fn is_bounded(&self) -> bool {
        self.parameters.is_some()
    }
}

// ── Parameters ───────────────────────────────────────────────────────

/// Schema for one argument slot, as written in the bounds document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// `int`, `float`, `string` or `enum`. Other names are kept verbatim
    /// and compile to an unknown kind.
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub min: Option<BoundValue>,
    #[serde(default)]
    pub max: Option<BoundValue>,
    #[serde(default)]
    pub optional: bool,
}

impl ParameterSpec {
    pub fn new(param_type: &str) -> Self {
        Self {
            param_type: param_type.to_string(),
            options: Vec::new(),
            format: None,
            min: None,
            max: None,
            optional: false,
        }
    }

    /// Enumeration of literal choices.
    pub fn enumeration<S: AsRef<str>>(options: &[S]) -> Self {
        Self {
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
            ..Self::new("enum")
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_bounds(mut self, min: Option<BoundValue>, max: Option<BoundValue>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A numeric bound as it appears in the document: a JSON number or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundValue {
    Number(serde_json::Number),
    Text(String),
}

impl BoundValue {
    /// Parse as an integer bound. Unparsable text yields `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BoundValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            BoundValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
            }
        }
    }

    /// Parse as a floating point bound. Unparsable text yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            BoundValue::Number(n) => n.as_f64(),
            BoundValue::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|f| f.is_finite())
    }
}

impl From<i64> for BoundValue {
    fn from(v: i64) -> Self {
        BoundValue::Number(v.into())
    }
}

impl From<&str> for BoundValue {
    fn from(v: &str) -> Self {
        BoundValue::Text(v.to_string())
    }
}

/// One entry of a dependent grammar: a regular expression over the
/// space-joined prefix and the parameters legal after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentEntry {
    pub pattern: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

// ── Predefined tests ─────────────────────────────────────────────────

/// A fixed argument vector with expected-output regular expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub args: Vec<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}
