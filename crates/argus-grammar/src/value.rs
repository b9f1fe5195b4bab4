//! Parameter -> concrete argument string resolution.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::parameter::{ParamKind, Parameter, Piece, PlaceholderType, Template};

/// Ranges used for numeric sides that the schema leaves open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    /// Width of the integer range used for an open side.
    pub int_span: i64,
    /// Width of the float range used for an open side.
    pub float_span: f64,
    /// Longest generated string.
    pub max_string_len: usize,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            int_span: 1000,
            float_span: 1000.0,
            max_string_len: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("Invalid bounds: min ({min}) > max ({max})")]
    InvalidBounds { min: String, max: String },

    #[error("Enumeration has no options")]
    EmptyEnumeration,
}

/// Resolve a parameter into one concrete argument string.
///
/// Enumerations pick a literal uniformly; any placeholders in the chosen
/// literal (or in the format of a primitive parameter) are substituted in
/// declaration order. Unknown types produce the explicit marker token.
pub fn resolve<R: Rng>(
    param: &Parameter,
    config: &ValueConfig,
    rng: &mut R,
) -> Result<String, ValueError> {
    match &param.kind {
        ParamKind::Unknown(name) => Ok(Parameter::unknown_marker(name)),
        ParamKind::Enum(options) => {
            let template = options.choose(rng).ok_or(ValueError::EmptyEnumeration)?;
            fill(template, param, config, rng)
        }
        ParamKind::Int | ParamKind::Float | ParamKind::Str => match &param.format {
            Some(template) => fill(template, param, config, rng),
            None => {
                let slot = match param.kind {
                    ParamKind::Int => PlaceholderType::Int,
                    ParamKind::Float => PlaceholderType::Float,
                    _ => PlaceholderType::Str,
                };
                slot_value(slot, param, config, rng)
            }
        },
    }
}

/// Substitute every placeholder of `template`.
pub fn fill<R: Rng>(
    template: &Template,
    param: &Parameter,
    config: &ValueConfig,
    rng: &mut R,
) -> Result<String, ValueError> {
    let mut out = String::with_capacity(template.source().len());
    for piece in template.pieces() {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Slot(slot) => out.push_str(&slot_value(*slot, param, config, rng)?),
        }
    }
    Ok(out)
}

fn slot_value<R: Rng>(
    slot: PlaceholderType,
    param: &Parameter,
    config: &ValueConfig,
    rng: &mut R,
) -> Result<String, ValueError> {
    match slot {
        PlaceholderType::Int => {
            let (lo, hi) = int_range(param, config)?;
            Ok(rng.gen_range(lo..=hi).to_string())
        }
        PlaceholderType::Float => {
            let (lo, hi) = float_range(param, config)?;
            Ok(format!("{}", sample_float(lo, hi, rng)))
        }
        PlaceholderType::Str => Ok(random_string(config, rng)),
    }
}

/// Effective inclusive integer range of a parameter.
pub fn int_range(param: &Parameter, config: &ValueConfig) -> Result<(i64, i64), ValueError> {
    let span = config.int_span.max(0);
    match param.int_bounds {
        (Some(min), Some(max)) if min > max => Err(ValueError::InvalidBounds {
            min: min.to_string(),
            max: max.to_string(),
        }),
        (Some(min), Some(max)) => Ok((min, max)),
        (Some(min), None) => Ok((min, min.saturating_add(span))),
        (None, Some(max)) => Ok((max.saturating_sub(span), max)),
        (None, None) => Ok((-(span / 2), span - span / 2)),
    }
}

/// Effective inclusive float range of a parameter. Both ends are finite.
pub fn float_range(param: &Parameter, config: &ValueConfig) -> Result<(f64, f64), ValueError> {
    let span = finite(config.float_span.abs());
    match param.float_bounds {
        (Some(min), Some(max)) if min > max => Err(ValueError::InvalidBounds {
            min: min.to_string(),
            max: max.to_string(),
        }),
        (Some(min), Some(max)) => Ok((min, max)),
        (Some(min), None) => Ok((min, finite(min + span))),
        (None, Some(max)) => Ok((finite(max - span), max)),
        (None, None) => Ok((-span / 2.0, span / 2.0)),
    }
}

/// Clamp into the finite range; NaN becomes `f64::MAX`.
fn finite(v: f64) -> f64 {
    if v.is_nan() {
        f64::MAX
    } else {
        v.clamp(f64::MIN, f64::MAX)
    }
}

/// Uniform draw from `[lo, hi]` for finite ends. Ranges wider than
/// `f64::MAX` are split at the midpoint and one half is drawn from.
fn sample_float<R: Rng>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    if lo == hi {
        return lo;
    }
    if (hi - lo).is_finite() {
        return rng.gen_range(lo..=hi);
    }
    let mid = lo / 2.0 + hi / 2.0;
    if rng.gen_bool(0.5) {
        rng.gen_range(lo..=mid)
    } else {
        rng.gen_range(mid..=hi)
    }
}

fn random_string<R: Rng>(config: &ValueConfig, rng: &mut R) -> String {
    let len = rng.gen_range(1..=config.max_string_len.max(1));
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}
