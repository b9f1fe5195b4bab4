use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Who a range of lines is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner<V> {
    /// Not yet reached by any test.
    Unowned,
    /// Reached by exactly one test so far.
    Visitor(V),
    /// Reached by more than one test; unique to nobody.
    Contested,
}

/// A contiguous, inclusive run of lines with a single owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<V> {
    pub start: u32,
    pub end: u32,
    pub owner: Owner<V>,
}

impl<V> Range<V> {
    /// Number of lines in the range.
    pub fn size(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }
}

/// Partition of one class's `[first, last]` line span into ranges,
/// keyed by range end for ordered "first end >= line" lookups.
#[derive(Debug, Clone)]
pub struct ClassCounter<V> {
    first: u32,
    last: u32,
    ranges: BTreeMap<u32, Range<V>>,
}

impl<V: Copy + Eq + Hash + Debug> ClassCounter<V> {
    /// A single unowned range spanning the class.
    pub fn new(first: u32, last: u32) -> Self {
        let mut ranges = BTreeMap::new();
        ranges.insert(
            last,
            Range {
                start: first,
                end: last,
                owner: Owner::Unowned,
            },
        );
        Self {
            first,
            last,
            ranges,
        }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    /// The range whose end is the first end >= `line`.
    pub fn find(&self, line: u32) -> Option<&Range<V>> {
        self.ranges.range(line..).next().map(|(_, r)| r)
    }

    /// Ranges in line order.
    pub fn ranges(&self) -> impl Iterator<Item = &Range<V>> {
        self.ranges.values()
    }

    /// Ranges currently attributed to a visitor, in line order.
    pub fn owned(&self) -> impl Iterator<Item = (u32, u32, V)> + '_ {
        self.ranges.values().filter_map(|r| match r.owner {
            Owner::Visitor(v) => Some((r.start, r.end, v)),
            _ => None,
        })
    }

    /// Attribute the inclusive line run `[start, end]` to `visitor`.
    ///
    /// Unowned sub-ranges become the visitor's and count toward the
    /// returned delta. Sub-ranges owned by a different visitor become
    /// contested and their size is taken back from that visitor's total.
    pub fn attribute(
        &mut self,
        start: u32,
        end: u32,
        visitor: V,
        totals: &mut HashMap<V, i64>,
    ) -> u64 {
        let start = start.max(self.first);
        let end = end.min(self.last);
        if start > end {
            return 0;
        }

        self.split_before(start);
        if end < self.last {
            self.split_before(end + 1);
        }

        let mut delta = 0u64;
        for range in self.ranges.range_mut(start..=end).map(|(_, r)| r) {
            let size = range.size();
            match range.owner {
                Owner::Unowned => {
                    range.owner = Owner::Visitor(visitor);
                    delta += size;
                    *totals.entry(visitor).or_insert(0) += size as i64;
                }
                Owner::Visitor(previous) if previous != visitor => {
                    range.owner = Owner::Contested;
                    *totals.entry(previous).or_insert(0) -= size as i64;
                }
                Owner::Visitor(_) | Owner::Contested => {}
            }
        }
        delta
    }

    /// Make sure a range boundary starts exactly at `line`.
    fn split_before(&mut self, line: u32) {
        let Some(&range) = self.find(line) else {
            return;
        };
        if range.start >= line {
            return;
        }
        self.ranges.insert(
            line - 1,
            Range {
                start: range.start,
                end: line - 1,
                owner: range.owner,
            },
        );
        self.ranges.insert(
            range.end,
            Range {
                start: line,
                end: range.end,
                owner: range.owner,
            },
        );
    }

    /// True when the ranges cover `[first, last]` exactly, in order,
    /// without gaps or overlaps.
    pub fn is_partition(&self) -> bool {
        let mut expected = self.first;
        for (&key, range) in &self.ranges {
            if key != range.end || range.start != expected || range.end < range.start {
                return false;
            }
            expected = range.end + 1;
        }
        expected == self.last + 1
    }
}
