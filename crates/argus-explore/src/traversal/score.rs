//! Explore/exploit scoring for sibling selection.

use rand::seq::SliceRandom;
use rand::Rng;

use super::tree::{NodeId, SearchTree, TreeError};

/// Upper-confidence score of one child.
///
/// Unvisited children score `+inf` so every sibling is tried once before
/// any is revisited.
pub fn uct(score: f64, visits: u64, parent_visits: u64, exploration_weight: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    let visits = visits as f64;
    let parent = (parent_visits.max(1)) as f64;
    score / visits + exploration_weight * (parent.ln() / visits).sqrt()
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Non-finite score {score} on node {node:?}")]
    NonFinite { node: NodeId, score: f64 },
}

/// Pick the best child of `parent` by [`uct`]. Ties break uniformly at
/// random. Returns `None` when `parent` has no children.
pub fn select_child<R: Rng>(
    tree: &SearchTree,
    parent: NodeId,
    exploration_weight: f64,
    rng: &mut R,
) -> Result<Option<NodeId>, SelectError> {
    let parent_visits = tree.node(parent)?.visits;
    let mut best = Vec::new();
    let mut best_value = f64::NEG_INFINITY;

    for child in tree.children(parent)? {
        let node = tree.node(child)?;
        if !node.score.is_finite() {
            return Err(SelectError::NonFinite {
                node: child,
                score: node.score,
            });
        }
        let value = uct(node.score, node.visits, parent_visits, exploration_weight);
        if value > best_value {
            best_value = value;
            best.clear();
            best.push(child);
        } else if value == best_value {
            best.push(child);
        }
    }

    Ok(best.choose(rng).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::rng::{stage_rng, STAGE_TREE};

    #[test]
    fn test_unvisited_is_infinite() {
        assert_eq!(uct(0.0, 0, 10, 1.4), f64::INFINITY);
    }

    #[test]
    fn test_exploit_term_dominates_with_zero_weight() {
        assert_eq!(uct(6.0, 3, 9, 0.0), 2.0);
        assert!(uct(6.0, 3, 9, 1.0) > 2.0);
    }

    #[test]
    fn test_select_prefers_unvisited() {
        let mut tree = SearchTree::new(false);
        let root = tree.root();
        let a = tree.add_child(root, "a".into(), true).unwrap().unwrap();
        let b = tree.add_child(root, "b".into(), true).unwrap().unwrap();
        tree.backpropagate(a, 100.0, None).unwrap();

        let mut rng = stage_rng(7, STAGE_TREE);
        for _ in 0..10 {
            assert_eq!(select_child(&tree, root, 1.0, &mut rng).unwrap(), Some(b));
        }
    }

    #[test]
    fn test_select_prefers_higher_score() {
        let mut tree = SearchTree::new(false);
        let root = tree.root();
        let a = tree.add_child(root, "a".into(), true).unwrap().unwrap();
        let b = tree.add_child(root, "b".into(), true).unwrap().unwrap();
        tree.backpropagate(a, 1.0, None).unwrap();
        tree.backpropagate(b, 9.0, None).unwrap();

        let mut rng = stage_rng(7, STAGE_TREE);
        assert_eq!(select_child(&tree, root, 0.5, &mut rng).unwrap(), Some(b));
    }

    #[test]
    fn test_infinite_or_nan_score_is_error() {
        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let mut tree = SearchTree::new(false);
            let root = tree.root();
            let a = tree.add_child(root, "a".into(), true).unwrap().unwrap();
            tree.add_child(root, "b".into(), true).unwrap().unwrap();
            tree.backpropagate(a, bad, None).unwrap();

            let mut rng = stage_rng(7, STAGE_TREE);
            let err = select_child(&tree, root, 1.0, &mut rng).unwrap_err();
            assert!(matches!(err, SelectError::NonFinite { node, .. } if node == a));
        }
    }

    #[test]
    fn test_select_on_leaf_is_none() {
        let tree = SearchTree::new(true);
        let mut rng = stage_rng(7, STAGE_TREE);
        assert_eq!(select_child(&tree, tree.root(), 1.0, &mut rng).unwrap(), None);
    }
}
