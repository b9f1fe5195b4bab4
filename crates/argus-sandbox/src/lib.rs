pub mod config;
pub mod coverage;
pub mod runner;
pub mod watchdog;

pub use config::SandboxConfig;
pub use coverage::{CoverageError, CoverageOracle, JsonCoverageFile, NoCoverage};
pub use runner::{ProcessSubject, RawRun, SandboxError, Subject};
