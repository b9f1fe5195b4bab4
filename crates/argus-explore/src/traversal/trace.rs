use super::tree::NodeId;

/// A single decision taken by the tree generator.
#[derive(Debug, Clone)]
pub struct TraceStep {
    /// Node the decision was taken at, if any.
    pub node: Option<NodeId>,
    pub kind: TraceStepKind,
    /// Step number (monotonic over the generator's lifetime).
    pub step_number: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceStepKind {
    /// A prior test's uniqueness delta was folded into the tree.
    Scored { delta: u64 },
    /// Children were materialized from grammar choices.
    Expanded { added: usize },
    /// One more value was drawn for an open parameter.
    Widened { added: bool },
    /// An exhausted node was detached.
    Pruned,
    /// A complete argument vector was handed out for testing.
    Returned { args: Vec<String> },
    /// The walk ascended above the root.
    Exhausted,
    /// A random vector was produced instead of a tree walk.
    Fallback { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct SearchTrace {
    steps: Vec<TraceStep>,
    next_step: u64,
}

impl SearchTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: Option<NodeId>, kind: TraceStepKind) {
        self.steps.push(TraceStep {
            node,
            kind,
            step_number: self.next_step,
        });
        self.next_step += 1;
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Argument vectors returned by tree walks, in order.
    pub fn returned(&self) -> Vec<&[String]> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                TraceStepKind::Returned { args } => Some(args.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
