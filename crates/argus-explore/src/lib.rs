//! Argument-vector generation: uniform random sampling for bounded
//! grammars and coverage-guided tree search for dependent ones.

pub mod coverage;
pub mod solver;
pub mod traversal;

pub use solver::ArgVector;
pub use traversal::engine::{SearchConfig, SearchError, TreeGenerator};
pub use traversal::strategy::{GenerateError, Generator, TestGenerator};
