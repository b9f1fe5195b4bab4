//! Interval-based uniqueness accounting.
//!
//! Each class under test keeps a partition of its valid line span into
//! disjoint ranges. A range is owned by at most one search node; when a
//! second node reaches the same lines they become contested and stop
//! counting for anyone.

pub mod accountant;
pub mod counter;

pub use accountant::{AccountError, CoverageAccountant};
pub use counter::{ClassCounter, Owner, Range};
