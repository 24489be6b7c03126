// src/engine/state.rs

//! Per-node run state and the aggregate result of a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::NodeDescriptor;
use crate::types::{NodeName, NodeStatus};

/// Mutable state of one node for the duration of a run.
///
/// Only the node's driver writes to it; observers see events, and the final
/// value ends up in [`RunResult`].
#[derive(Debug, Clone)]
pub struct NodeRunState {
    pub node: NodeDescriptor,
    pub status: NodeStatus,
    /// Index into `node.commands` of the command currently (or last) run.
    pub current_command_index: usize,
    pub current_command: Option<String>,
    /// Every line emitted for this node, in emission order.
    pub output_lines: Vec<String>,
    /// Set once, on the first failure.
    pub error_message: Option<String>,
    /// Per-node log file, if logging is enabled for this node.
    pub log_file: Option<PathBuf>,
}

impl NodeRunState {
    pub fn new(node: NodeDescriptor, log_file: Option<PathBuf>) -> Self {
        Self {
            node,
            status: NodeStatus::Pending,
            current_command_index: 0,
            current_command: None,
            output_lines: Vec::new(),
            error_message: None,
            log_file,
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }
}

/// Final per-node states of one run, keyed by node name.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    states: BTreeMap<NodeName, NodeRunState>,
    log_dir: Option<PathBuf>,
}

impl RunResult {
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self {
            states: BTreeMap::new(),
            log_dir,
        }
    }

    pub(crate) fn insert(&mut self, state: NodeRunState) {
        self.states.insert(state.node.name.clone(), state);
    }

    pub fn get(&self, node: &str) -> Option<&NodeRunState> {
        self.states.get(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRunState)> {
        self.states.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Directory holding this run's logs, if any were written.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// True iff every node reached `Success`.
    pub fn all_succeeded(&self) -> bool {
        self.states
            .values()
            .all(|s| s.status == NodeStatus::Success)
    }

    pub fn failed_nodes(&self) -> Vec<&str> {
        self.nodes_with(NodeStatus::Failed)
    }

    pub fn cancelled_nodes(&self) -> Vec<&str> {
        self.nodes_with(NodeStatus::Cancelled)
    }

    fn nodes_with(&self, status: NodeStatus) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| s.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
