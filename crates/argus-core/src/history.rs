//! Coverage kept across tests: a bounded window of recent per-test
//! snapshots plus the merged run-wide totals.

use std::collections::BTreeMap;
use std::sync::Arc;

use argus_ir::output::{ClassCoverage, CoverageSnapshot, LineStatus};
use crossbeam::queue::ArrayQueue;

/// Trailing window of the most recent snapshots. Pushing into a full
/// window evicts the oldest entry.
#[derive(Debug)]
pub struct CoverageHistory {
    window: ArrayQueue<Arc<CoverageSnapshot>>,
    pushed: u64,
}

impl CoverageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: ArrayQueue::new(capacity.max(1)),
            pushed: 0,
        }
    }

    pub fn push(&mut self, snapshot: Arc<CoverageSnapshot>) {
        self.pushed += 1;
        if self.window.force_push(snapshot).is_some() {
            tracing::trace!(pushed = self.pushed, "coverage history evicted oldest snapshot");
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Total snapshots ever pushed, evicted ones included.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Current window contents, oldest first.
    pub fn recent(&mut self) -> Vec<Arc<CoverageSnapshot>> {
        let mut items = Vec::with_capacity(self.window.len());
        while let Some(item) = self.window.pop() {
            items.push(item);
        }
        for item in &items {
            let _ = self.window.push(item.clone());
        }
        items
    }
}

/// Best status seen per line, per class, over the whole run.
#[derive(Debug, Clone, Default)]
pub struct CoverageTotals {
    classes: BTreeMap<String, ClassCoverage>,
}

impl CoverageTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a snapshot. Classes whose line count does not match their
    /// span are skipped.
    pub fn merge(&mut self, snapshot: &CoverageSnapshot) {
        for (name, class) in snapshot {
            if !class.is_well_formed() {
                tracing::warn!(class = %name, first = class.first_line, last = class.last_line, lines = class.lines.len(), "skipping malformed class coverage");
                continue;
            }
            match self.classes.get_mut(name) {
                Some(total) => *total = merge_class(total, class),
                None => {
                    self.classes.insert(name.clone(), class.clone());
                }
            }
        }
    }

    pub fn class(&self, name: &str) -> Option<&ClassCoverage> {
        self.classes.get(name)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn covered_lines(&self) -> usize {
        self.classes.values().map(ClassCoverage::hit_lines).sum()
    }

    pub fn coverable_lines(&self) -> usize {
        self.classes.values().map(ClassCoverage::coverable_lines).sum()
    }

    /// Covered share of coverable lines, as a percentage.
    pub fn percent(&self) -> f64 {
        let coverable = self.coverable_lines();
        if coverable == 0 {
            return 0.0;
        }
        self.covered_lines() as f64 * 100.0 / coverable as f64
    }
}

fn merge_class(a: &ClassCoverage, b: &ClassCoverage) -> ClassCoverage {
    let first = a.first_line.min(b.first_line);
    let last = a.last_line.max(b.last_line);
    let lines = (first..=last)
        .map(|line| a.status(line).merge(b.status(line)))
        .collect::<Vec<LineStatus>>();
    ClassCoverage::new(first, lines)
}
