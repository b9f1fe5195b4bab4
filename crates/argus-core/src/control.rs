//! State shared between the control thread and outside observers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use argus_ir::output::Output;

/// Pause/kill flags and progress, safe to touch from any thread.
#[derive(Debug, Default)]
pub struct RunControl {
    paused: AtomicBool,
    killed: AtomicBool,
    /// `f64` bits of the completion fraction.
    percent: AtomicU64,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Halt between tests. A test already in flight runs to completion.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Stop the run; honored within one poll interval.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// The kill flag itself, for subjects that poll it mid-run.
    pub fn kill_flag(&self) -> &AtomicBool {
        &self.killed
    }

    /// Completion fraction in `[0, 1]`.
    pub fn percent_complete(&self) -> f64 {
        f64::from_bits(self.percent.load(Ordering::Relaxed))
    }

    pub fn set_percent_complete(&self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        self.percent.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Append-only record of completed outputs, in completion order.
///
/// Only the control thread appends; readers may index into it at any
/// time and an index, once valid, always refers to the same output.
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: RwLock<Vec<Arc<Output>>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the new entry's index.
    pub fn push(&self, output: Arc<Output>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(output);
        entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Arc<Output>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Entries from `start` on; lets a reader follow the log incrementally.
    pub fn since(&self, start: usize) -> Vec<Arc<Output>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(start..)
            .map(<[_]>::to_vec)
            .unwrap_or_default()
    }
}
