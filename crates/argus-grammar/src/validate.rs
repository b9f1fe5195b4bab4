use argus_ir::types::{ParameterSpec, TestBounds};

use crate::grammar::anchored;
use crate::parameter::Parameter;
use crate::value::{float_range, int_range, ValueConfig};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Bounds declare both a fixed parameter list and a dependent map")]
    AmbiguousSchema,

    #[error("Bounds declare neither a fixed parameter list nor a dependent map")]
    MissingSchema,

    #[error("Enumeration at '{location}' has no options")]
    EmptyEnumeration { location: String },

    #[error("Invalid bounds at '{location}': min ({min}) > max ({max})")]
    InvalidBounds {
        location: String,
        min: String,
        max: String,
    },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid expectation for test {index}: {message}")]
    InvalidExpectation { index: usize, message: String },
}

pub fn validate_bounds(bounds: &TestBounds) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    match (&bounds.parameters, &bounds.dependent) {
        (Some(_), Some(_)) => errors.push(ValidationError::AmbiguousSchema),
        (None, None) => errors.push(ValidationError::MissingSchema),
        _ => {}
    }
    validate_parameters(bounds, &mut errors);
    validate_patterns(bounds, &mut errors);
    validate_expectations(bounds, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check enumerations and numeric bounds of every declared parameter.
fn validate_parameters(bounds: &TestBounds, errors: &mut Vec<ValidationError>) {
    let mut specs: Vec<(String, &ParameterSpec)> = Vec::new();
    if let Some(params) = &bounds.parameters {
        specs.extend(params.iter().enumerate().map(|(i, p)| (format!("parameters[{i}]"), p)));
    }
    if let Some(entries) = &bounds.dependent {
        for entry in entries {
            specs.extend(
                entry
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (format!("{}[{i}]", entry.pattern), p)),
            );
        }
    }

    let config = ValueConfig::default();
    for (location, spec) in specs {
        if spec.param_type.eq_ignore_ascii_case("enum") && spec.options.is_empty() {
            errors.push(ValidationError::EmptyEnumeration {
                location: location.clone(),
            });
        }
        let param = Parameter::from_spec(spec);
        let checks = [
            int_range(&param, &config).err(),
            float_range(&param, &config).err(),
        ];
        if let Some(crate::value::ValueError::InvalidBounds { min, max }) =
            checks.into_iter().flatten().next()
        {
            errors.push(ValidationError::InvalidBounds { location, min, max });
        }
    }
}

fn validate_patterns(bounds: &TestBounds, errors: &mut Vec<ValidationError>) {
    for entry in bounds.dependent.iter().flatten() {
        if let Err(e) = anchored(&entry.pattern) {
            errors.push(ValidationError::InvalidPattern {
                pattern: entry.pattern.clone(),
                message: e.to_string(),
            });
        }
    }
}

fn validate_expectations(bounds: &TestBounds, errors: &mut Vec<ValidationError>) {
    for (index, test) in bounds.tests.iter().enumerate() {
        for pattern in [&test.stdout, &test.stderr].into_iter().flatten() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ValidationError::InvalidExpectation {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }
}
