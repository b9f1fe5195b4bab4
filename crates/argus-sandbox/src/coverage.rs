//! Coverage oracles: where per-class line coverage for a finished run
//! comes from.

use std::path::{Path, PathBuf};

use argus_ir::output::CoverageSnapshot;

use crate::runner::RawRun;

#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("Failed to read coverage report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed coverage report {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed coverage report {}: class '{class}' spans {first}..={last} with {lines} line statuses", .path.display())]
    Malformed {
        path: PathBuf,
        class: String,
        first: u32,
        last: u32,
        lines: usize,
    },
}

pub trait CoverageOracle {
    /// Coverage produced by the run that just finished.
    fn collect(&mut self, run: &RawRun) -> Result<CoverageSnapshot, CoverageError>;
}

/// Reports no coverage at all. Scores stay zero and search degrades to
/// breadth-first exploration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoverage;

impl CoverageOracle for NoCoverage {
    fn collect(&mut self, _run: &RawRun) -> Result<CoverageSnapshot, CoverageError> {
        Ok(CoverageSnapshot::new())
    }
}

/// Reads a JSON report the instrumented subject writes after each run:
/// an object mapping class name to `{first_line, last_line, lines}`.
///
/// A missing file means the subject wrote no coverage and yields an empty
/// snapshot.
#[derive(Debug, Clone)]
pub struct JsonCoverageFile {
    path: PathBuf,
    remove_after_read: bool,
}

impl JsonCoverageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remove_after_read: true,
        }
    }

    pub fn keep_after_read(mut self) -> Self {
        self.remove_after_read = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoverageOracle for JsonCoverageFile {
    fn collect(&mut self, _run: &RawRun) -> Result<CoverageSnapshot, CoverageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no coverage report");
                return Ok(CoverageSnapshot::new());
            }
            Err(source) => {
                return Err(CoverageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if self.remove_after_read {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove coverage report");
            }
        }

        let snapshot: CoverageSnapshot =
            serde_json::from_str(&text).map_err(|source| CoverageError::Parse {
                path: self.path.clone(),
                source,
            })?;

        // Every class must carry exactly one status per line of its span.
        if let Some((class, coverage)) = snapshot.iter().find(|(_, c)| !c.is_well_formed()) {
            return Err(CoverageError::Malformed {
                path: self.path.clone(),
                class: class.clone(),
                first: coverage.first_line,
                last: coverage.last_line,
                lines: coverage.lines.len(),
            });
        }
        Ok(snapshot)
    }
}
