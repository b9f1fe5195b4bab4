//! Subject process configuration: what to launch, how long to wait for it,
//! and how to recognize the watchdog side channel.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BEGIN_SENTINEL: &str = "@@ARGUS-WATCHDOG-BEGIN@@";
pub const DEFAULT_END_SENTINEL: &str = "@@ARGUS-WATCHDOG-END@@";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Executable under test.
    pub program: PathBuf,
    /// Arguments placed before every generated vector (e.g. a wrapper's own flags).
    pub base_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the subject.
    pub env: BTreeMap<String, String>,
    /// Hard per-test budget in milliseconds.
    pub timeout_ms: u64,
    /// Sleep between polls of the output queues.
    pub poll_interval_ms: u64,
    pub begin_sentinel: String,
    pub end_sentinel: String,
    /// Kill the subject when its budget expires or the run is aborted.
    /// When off, the child keeps running and is reaped by a later run
    /// once it exits.
    pub kill_on_timeout: bool,
    /// Captured bytes kept per stream; the rest is dropped.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::new(),
            base_args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout_ms: 10_000,
            poll_interval_ms: 5,
            begin_sentinel: DEFAULT_BEGIN_SENTINEL.to_string(),
            end_sentinel: DEFAULT_END_SENTINEL.to_string(),
            kill_on_timeout: true,
            max_output_bytes: 4 * 1024 * 1024, // 4 MiB
        }
    }
}

impl SandboxConfig {
    pub fn for_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }
}
