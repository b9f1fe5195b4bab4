use std::path::Path;

use crate::types::TestBounds;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read bounds file: {0}")]
    Io(#[from] std::io::Error),
}

pub fn parse_bounds(json: &str) -> Result<TestBounds, ParseError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_bounds(path: &Path) -> Result<TestBounds, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_bounds(&text)
}
