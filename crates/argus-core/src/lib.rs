//! Orchestration: drives generate → run → score until the run's goals are
//! met, or replays a fixed suite of predefined tests.

pub mod analytics;
pub mod config;
pub mod control;
pub mod history;
pub mod limits;
pub mod logging;
pub mod suite;
pub mod tester;

pub use analytics::RunReport;
pub use config::{RunConfig, RunMode};
pub use control::{ResultLog, RunControl};
pub use limits::{RunGoals, StopReason};
pub use tester::{InitError, Tester, TesterError};
