use std::fmt;

/// Canonical node name type used throughout the engine.
pub type NodeName = String;

/// Lifecycle of a single node within one run.
///
/// `Pending -> Connecting -> Running -> {Success, Failed}`, with a direct
/// `Connecting -> Failed` edge for connection failures. `Cancelled` can be
/// entered from any non-terminal state when the run is aborted externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Pending,
    Connecting,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl NodeStatus {
    /// `Success` or `Failed`. A cancelled node never counts as terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failed)
    }

    /// True once the node will not change status again in this run.
    pub fn is_finished(self) -> bool {
        self.is_terminal() || self == NodeStatus::Cancelled
    }

    /// Whether `self -> next` is an edge of the node state machine.
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        use NodeStatus::*;
        match (self, next) {
            (Pending, Connecting) => true,
            (Connecting, Running) | (Connecting, Failed) => true,
            (Running, Success) | (Running, Failed) => true,
            (Pending | Connecting | Running, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Connecting => "connecting",
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Failed => "failed",
            NodeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
