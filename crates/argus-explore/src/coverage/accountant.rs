use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use argus_ir::output::{CoverageSnapshot, LineStatus};

use super::counter::ClassCounter;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Malformed coverage for class '{class}': span {first}..={last} but {lines} line statuses")]
    Malformed {
        class: String,
        first: u32,
        last: u32,
        lines: usize,
    },
}

/// Attributes newly reached partially-covered lines to the test that
/// reached them first.
#[derive(Debug, Clone)]
pub struct CoverageAccountant<V> {
    classes: BTreeMap<String, ClassCounter<V>>,
    totals: HashMap<V, i64>,
}

impl<V: Copy + Eq + Hash + Debug> CoverageAccountant<V> {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
            totals: HashMap::new(),
        }
    }

    /// Fold one finished test's snapshot into the partitions and return
    /// its uniqueness delta.
    ///
    /// The snapshot is checked in full before anything is updated, so an
    /// error leaves the accountant untouched.
    pub fn record(&mut self, snapshot: &CoverageSnapshot, visitor: V) -> Result<u64, AccountError> {
        for (class, coverage) in snapshot {
            if coverage.lines.is_empty() {
                continue;
            }
            if !coverage.is_well_formed() {
                return Err(AccountError::Malformed {
                    class: class.clone(),
                    first: coverage.first_line,
                    last: coverage.last_line,
                    lines: coverage.lines.len(),
                });
            }
        }

        let mut delta = 0;
        for (class, coverage) in snapshot {
            if coverage.lines.is_empty() {
                continue;
            }
            let runs = coverage.runs_of(LineStatus::PartlyCovered);
            let counter = self
                .classes
                .entry(class.clone())
                .or_insert_with(|| ClassCounter::new(coverage.first_line, coverage.last_line));
            for (start, end) in runs {
                delta += counter.attribute(start, end, visitor, &mut self.totals);
            }
        }
        Ok(delta)
    }

    /// Lines currently attributed uniquely to `visitor`.
    pub fn running_total(&self, visitor: V) -> i64 {
        self.totals.get(&visitor).copied().unwrap_or(0)
    }

    pub fn counter(&self, class: &str) -> Option<&ClassCounter<V>> {
        self.classes.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassCounter<V>)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V: Copy + Eq + Hash + Debug> Default for CoverageAccountant<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_ir::output::ClassCoverage;
    use LineStatus::*;

    /// Class spanning 1..=100 with the given inclusive runs partly covered.
    fn snapshot(class: &str, partial: &[(u32, u32)]) -> CoverageSnapshot {
        let mut lines = vec![NotCovered; 100];
        for &(s, e) in partial {
            for line in s..=e {
                lines[(line - 1) as usize] = PartlyCovered;
            }
        }
        let mut snap = CoverageSnapshot::new();
        snap.insert(class.to_string(), ClassCoverage::new(1, lines));
        snap
    }

    #[test]
    fn test_spec_walkthrough() {
        let mut acc = CoverageAccountant::new();
        assert_eq!(acc.record(&snapshot("Main", &[(10, 20)]), 'A').unwrap(), 11);
        assert_eq!(acc.running_total('A'), 11);

        assert_eq!(acc.record(&snapshot("Main", &[(15, 25)]), 'B').unwrap(), 5);
        assert_eq!(acc.running_total('A'), 5);
        assert_eq!(acc.running_total('B'), 5);

        let counter = acc.counter("Main").unwrap();
        assert_eq!(
            counter.owned().collect::<Vec<_>>(),
            vec![(10, 14, 'A'), (21, 25, 'B')]
        );
        assert!(counter.is_partition());
    }

    #[test]
    fn test_empty_snapshot_is_noop() {
        let mut acc = CoverageAccountant::new();
        acc.record(&snapshot("Main", &[(1, 3)]), 'A').unwrap();
        let before: Vec<_> = acc.counter("Main").unwrap().ranges().copied().collect();

        assert_eq!(acc.record(&snapshot("Main", &[]), 'B').unwrap(), 0);
        assert_eq!(acc.record(&CoverageSnapshot::new(), 'C').unwrap(), 0);

        let after: Vec<_> = acc.counter("Main").unwrap().ranges().copied().collect();
        assert_eq!(before, after);
        assert_eq!(acc.running_total('A'), 3);
    }

    #[test]
    fn test_fully_covered_lines_are_not_counted() {
        let mut acc = CoverageAccountant::new();
        let mut snap = CoverageSnapshot::new();
        snap.insert(
            "Main".into(),
            ClassCoverage::new(1, vec![FullyCovered, PartlyCovered, FullyCovered]),
        );
        assert_eq!(acc.record(&snap, 'A').unwrap(), 1);
    }

    #[test]
    fn test_classes_are_independent() {
        let mut acc = CoverageAccountant::new();
        let mut snap = snapshot("Main", &[(1, 2)]);
        snap.extend(snapshot("Util", &[(1, 2)]));
        assert_eq!(acc.record(&snap, 'A').unwrap(), 4);
        assert_eq!(acc.record(&snapshot("Util", &[(1, 2)]), 'B').unwrap(), 0);
        assert_eq!(acc.running_total('A'), 2);
    }

    #[test]
    fn test_malformed_snapshot_leaves_state_untouched() {
        let mut acc = CoverageAccountant::new();
        let mut snap = snapshot("Good", &[(1, 5)]);
        snap.insert(
            "Bad".into(),
            ClassCoverage {
                first_line: 1,
                last_line: 10,
                lines: vec![PartlyCovered; 3],
            },
        );
        assert!(matches!(
            acc.record(&snap, 'A'),
            Err(AccountError::Malformed { .. })
        ));
        assert!(acc.counter("Good").is_none());
        assert_eq!(acc.running_total('A'), 0);
    }

    #[test]
    fn test_no_line_is_unique_to_two_visitors() {
        let mut acc = CoverageAccountant::new();
        let runs: [(char, &[(u32, u32)]); 4] = [
            ('A', &[(1, 30), (50, 60)]),
            ('B', &[(20, 40)]),
            ('C', &[(35, 55), (90, 95)]),
            ('D', &[(1, 100)]),
        ];
        for (visitor, partial) in runs {
            acc.record(&snapshot("Main", partial), visitor).unwrap();
            let counter = acc.counter("Main").unwrap();
            assert!(counter.is_partition());
            for v in ['A', 'B', 'C', 'D'] {
                let owned: u64 = counter
                    .owned()
                    .filter(|&(_, _, o)| o == v)
                    .map(|(s, e, _)| u64::from(e - s) + 1)
                    .sum();
                assert_eq!(acc.running_total(v), owned as i64);
            }
        }
    }
}
