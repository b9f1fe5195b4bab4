//! Arena-backed search tree over partial argument sequences.
//!
//! Nodes are addressed by generational [`NodeId`] handles. A parent owns
//! its children through the child map; the parent link is a plain handle.
//! Pruning detaches a node and recycles its slot, which bumps the slot
//! generation so stale handles never alias a newer node.
//!
//! While a journal is open every structural change is recorded, and
//! [`SearchTree::rollback`] restores the tree to the state it had when the
//! journal was opened.

use std::collections::BTreeMap;
use std::sync::Arc;

use argus_ir::output::Output;

/// Stable handle to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// One partial argument sequence: the path of tokens from the root.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub token: String,
    pub parent: Option<NodeId>,
    pub children: BTreeMap<String, NodeId>,
    pub depth: usize,
    pub visits: u64,
    pub score: f64,
    /// The token path is a complete argument vector.
    pub terminal: bool,
    pub expanded: bool,
    pub tested: bool,
    /// Widening attempts made after the initial expansion.
    pub widenings: u32,
    pub output: Option<Arc<Output>>,
}

impl SearchNode {
    fn new(token: String, parent: Option<NodeId>, depth: usize, terminal: bool) -> Self {
        Self {
            token,
            parent,
            children: BTreeMap::new(),
            depth,
            visits: 0,
            score: 0.0,
            terminal,
            expanded: false,
            tested: false,
            widenings: 0,
            output: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<SearchNode>,
}

#[derive(Debug, Clone)]
enum Undo {
    Alloc(NodeId),
    Prune(NodeId, Box<SearchNode>),
    Flags {
        id: NodeId,
        expanded: bool,
        tested: bool,
        widenings: u32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Stale or unknown node handle {0:?}")]
    StaleNode(NodeId),

    #[error("The root node cannot be pruned")]
    PruneRoot,
}

#[derive(Debug, Clone)]
pub struct SearchTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
    journal: Option<Vec<Undo>>,
}

impl SearchTree {
    /// A tree holding only the root (the empty prefix).
    pub fn new(root_terminal: bool) -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(SearchNode::new(String::new(), None, 0, root_terminal)),
            }],
            free: Vec::new(),
            root,
            live: 1,
            journal: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live (unpruned) nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&SearchNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn node(&self, id: NodeId) -> Result<&SearchNode, TreeError> {
        self.get(id).ok_or(TreeError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SearchNode, TreeError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Tokens on the path from the root to `id`, root excluded.
    pub fn tokens(&self, id: NodeId) -> Result<Vec<String>, TreeError> {
        let mut tokens = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current)?;
            if node.parent.is_some() {
                tokens.push(node.token.clone());
            }
            cursor = node.parent;
        }
        tokens.reverse();
        Ok(tokens)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.node(id)?.children.values().copied().collect())
    }

    /// Add a child under `parent` unless one with the same token exists.
    /// Returns the new handle, or `None` for a duplicate token.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        token: String,
        terminal: bool,
    ) -> Result<Option<NodeId>, TreeError> {
        let depth = {
            let p = self.node(parent)?;
            if p.children.contains_key(&token) {
                return Ok(None);
            }
            p.depth + 1
        };

        let node = SearchNode::new(token.clone(), Some(parent), depth, terminal);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.node_mut(parent)?.children.insert(token, id);
        self.live += 1;
        self.record(Undo::Alloc(id));
        Ok(Some(id))
    }

    /// Detach a childless node from its parent and recycle its slot.
    /// Returns the parent handle.
    pub fn prune(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        if id == self.root {
            return Err(TreeError::PruneRoot);
        }
        let parent = self.node(id)?.parent.ok_or(TreeError::PruneRoot)?;
        let token = self.node(id)?.token.clone();
        self.node_mut(parent)?.children.remove(&token);

        let slot = &mut self.slots[id.index as usize];
        let node = slot.node.take().ok_or(TreeError::StaleNode(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        self.record(Undo::Prune(id, Box::new(node)));
        Ok(parent)
    }

    pub fn set_expanded(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.save_flags(id)?;
        self.node_mut(id)?.expanded = true;
        Ok(())
    }

    pub fn set_tested(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.save_flags(id)?;
        self.node_mut(id)?.tested = true;
        Ok(())
    }

    pub fn add_widening(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.save_flags(id)?;
        self.node_mut(id)?.widenings += 1;
        Ok(())
    }

    /// Add `delta` to the score and one visit to every node from `id` up
    /// to the root, and keep the test output on `id`.
    pub fn backpropagate(
        &mut self,
        id: NodeId,
        delta: f64,
        output: Option<Arc<Output>>,
    ) -> Result<(), TreeError> {
        self.node_mut(id)?.output = output;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node_mut(current)?;
            node.visits += 1;
            node.score += delta;
            cursor = node.parent;
        }
        Ok(())
    }

    // ── Journal ──────────────────────────────────────────────────────

    /// Start recording changes so they can be undone.
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep every change made since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made since [`begin`](Self::begin).
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Alloc(id) => {
                    let slot = &mut self.slots[id.index as usize];
                    if let Some(node) = slot.node.take() {
                        slot.generation = slot.generation.wrapping_add(1);
                        self.free.push(id.index);
                        self.live -= 1;
                        if let Some(parent) = node.parent {
                            if let Ok(p) = self.node_mut(parent) {
                                p.children.remove(&node.token);
                            }
                        }
                    }
                }
                Undo::Prune(id, node) => {
                    self.free.retain(|&i| i != id.index);
                    let parent = node.parent;
                    let token = node.token.clone();
                    let slot = &mut self.slots[id.index as usize];
                    slot.generation = id.generation;
                    slot.node = Some(*node);
                    self.live += 1;
                    if let Some(parent) = parent {
                        if let Ok(p) = self.node_mut(parent) {
                            p.children.insert(token, id);
                        }
                    }
                }
                Undo::Flags {
                    id,
                    expanded,
                    tested,
                    widenings,
                } => {
                    if let Ok(node) = self.node_mut(id) {
                        node.expanded = expanded;
                        node.tested = tested;
                        node.widenings = widenings;
                    }
                }
            }
        }
    }

    fn save_flags(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.node(id)?;
        let undo = Undo::Flags {
            id,
            expanded: node.expanded,
            tested: node.tested,
            widenings: node.widenings,
        };
        self.record(undo);
        Ok(())
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }
}
