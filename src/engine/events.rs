// src/engine/events.rs

//! Observer contract between the engine and presentation layers.
//!
//! Drivers call an [`EventSink`] from whatever task they run on, so sinks
//! must be `Send + Sync` and treat every call as one complete message.
//! [`ChannelSink`] is the usual choice: it turns calls into [`FleetEvent`]s on
//! a channel that a renderer drains on its own schedule.

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::{NodeName, NodeStatus};

/// Prefix for lines read from a command's standard error.
pub const STDERR_PREFIX: &str = "STDERR: ";

/// Prefix for connection failures.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Prefix for transport faults while launching or streaming a command.
pub const COMMAND_ERROR_PREFIX: &str = "Command error: ";

/// Receives output lines and status changes for every node.
pub trait EventSink: Send + Sync {
    fn on_output(&self, node: &str, line: &str);

    fn on_status(&self, node: &str, status: NodeStatus);

    /// A node is about to run `command` (its `index`-th command).
    ///
    /// Only renderers that show progress care about this.
    fn on_command(&self, _node: &str, _index: usize, _command: &str) {}
}

/// One observer-facing event.
///
/// Events of a single node arrive in emission order; events of different
/// nodes interleave arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetEvent {
    Output {
        node: NodeName,
        line: String,
    },
    Status {
        node: NodeName,
        status: NodeStatus,
    },
    CommandStarted {
        node: NodeName,
        index: usize,
        command: String,
    },
}

impl FleetEvent {
    pub fn node(&self) -> &str {
        match self {
            FleetEvent::Output { node, .. }
            | FleetEvent::Status { node, .. }
            | FleetEvent::CommandStarted { node, .. } => node,
        }
    }
}

/// Sink that forwards every call as a [`FleetEvent`] on an unbounded channel.
///
/// Sending never blocks a driver. Once the receiver is gone, events are
/// dropped silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<FleetEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FleetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: FleetEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!(node = %err.0.node(), "event receiver closed; dropping event");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_output(&self, node: &str, line: &str) {
        self.send(FleetEvent::Output {
            node: node.to_string(),
            line: line.to_string(),
        });
    }

    fn on_status(&self, node: &str, status: NodeStatus) {
        self.send(FleetEvent::Status {
            node: node.to_string(),
            status,
        });
    }

    fn on_command(&self, node: &str, index: usize, command: &str) {
        self.send(FleetEvent::CommandStarted {
            node: node.to_string(),
            index,
            command: command.to_string(),
        });
    }
}

/// Sink that discards everything (headless callers that only want the
/// final `RunResult`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_output(&self, _node: &str, _line: &str) {}

    fn on_status(&self, _node: &str, _status: NodeStatus) {}
}
