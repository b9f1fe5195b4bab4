use std::collections::VecDeque;
use std::sync::Arc;

use argus_ir::output::Output;

use crate::solver::ArgVector;

/// Hands out a fixed list of argument vectors in order, then reports
/// exhaustion. Prior outputs are ignored.
#[derive(Debug, Clone, Default)]
pub struct ReplayGenerator {
    queue: VecDeque<ArgVector>,
}

impl ReplayGenerator {
    pub fn new(vectors: Vec<ArgVector>) -> Self {
        Self {
            queue: vectors.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn next_vector(&mut self, _prior: Option<Arc<Output>>) -> Option<ArgVector> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_then_stops() {
        let mut r = ReplayGenerator::new(vec![vec!["a".into()], vec![]]);
        assert_eq!(r.remaining(), 2);
        assert_eq!(r.next_vector(None), Some(vec!["a".to_string()]));
        assert_eq!(r.next_vector(None), Some(vec![]));
        assert_eq!(r.next_vector(None), None);
    }
}
