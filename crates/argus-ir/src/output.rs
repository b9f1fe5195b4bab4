//! Results of one subject execution and the coverage data attached to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coverage state of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// No code on this line.
    Empty,
    NotCovered,
    PartlyCovered,
    FullyCovered,
}

impl LineStatus {
    /// Whether the line holds executable code at all.
    pub fn is_coverable(self) -> bool {
        self != LineStatus::Empty
    }

    pub fn is_hit(self) -> bool {
        matches!(self, LineStatus::PartlyCovered | LineStatus::FullyCovered)
    }

    /// Combine two observations of the same line; the better one wins.
    pub fn merge(self, other: LineStatus) -> LineStatus {
        use LineStatus::*;
        match (self, other) {
            (FullyCovered, _) | (_, FullyCovered) => FullyCovered,
            (PartlyCovered, _) | (_, PartlyCovered) => PartlyCovered,
            (NotCovered, _) | (_, NotCovered) => NotCovered,
            _ => Empty,
        }
    }
}

/// Line coverage for one class under test.
///
/// `lines[i]` is the status of line `first_line + i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCoverage {
    pub first_line: u32,
    pub last_line: u32,
    pub lines: Vec<LineStatus>,
}

impl ClassCoverage {
    pub fn new(first_line: u32, lines: Vec<LineStatus>) -> Self {
        let last_line = first_line + (lines.len() as u32).saturating_sub(1);
        Self {
            first_line,
            last_line,
            lines,
        }
    }

    /// Number of lines in `[first_line, last_line]`.
    pub fn span(&self) -> usize {
        if self.last_line < self.first_line {
            0
        } else {
            (self.last_line - self.first_line) as usize + 1
        }
    }

    /// One status per line of `[first_line, last_line]`.
    pub fn is_well_formed(&self) -> bool {
        self.last_line >= self.first_line && self.lines.len() == self.span()
    }

    pub fn status(&self, line: u32) -> LineStatus {
        if line < self.first_line {
            return LineStatus::Empty;
        }
        self.lines
            .get((line - self.first_line) as usize)
            .copied()
            .unwrap_or(LineStatus::Empty)
    }

    /// Maximal contiguous runs `(start, end)` of lines with the given status.
    pub fn runs_of(&self, status: LineStatus) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut open: Option<u32> = None;
        for (offset, s) in self.lines.iter().enumerate() {
            let line = self.first_line + offset as u32;
            match (open, *s == status) {
                (None, true) => open = Some(line),
                (Some(start), false) => {
                    runs.push((start, line - 1));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            runs.push((start, self.first_line + self.lines.len() as u32 - 1));
        }
        runs
    }

    pub fn coverable_lines(&self) -> usize {
        self.lines.iter().filter(|s| s.is_coverable()).count()
    }

    pub fn hit_lines(&self) -> usize {
        self.lines.iter().filter(|s| s.is_hit()).count()
    }
}

/// Per-class coverage for one executed test, keyed by class identifier.
pub type CoverageSnapshot = BTreeMap<String, ClassCoverage>;

/// How a subject execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Exited { code: Option<i32> },
    /// The per-test budget expired; output is whatever was captured.
    TimedOut,
    /// The run was killed from outside before the subject finished.
    Aborted,
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Exited { .. })
    }
}

/// Result of one subject execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    /// Permission event identifier -> occurrence count.
    pub permissions: BTreeMap<String, u64>,
    pub coverage: CoverageSnapshot,
    pub status: RunStatus,
    pub elapsed_ms: u64,
}

impl Output {
    pub fn new(args: Vec<String>, status: RunStatus) -> Self {
        Self {
            args,
            stdout: String::new(),
            stderr: String::new(),
            permissions: BTreeMap::new(),
            coverage: CoverageSnapshot::new(),
            status,
            elapsed_ms: 0,
        }
    }

    /// First non-empty stderr line, used to group failures.
    pub fn error_signature(&self) -> Option<&str> {
        self.stderr.lines().map(str::trim).find(|l| !l.is_empty())
    }
}
