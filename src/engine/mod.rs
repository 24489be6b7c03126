// src/engine/mod.rs

//! Execution engine for scatter.
//!
//! This module ties together:
//! - the per-node run state and the aggregate run result ([`state`])
//! - the observer contract ([`events`])
//! - the single writer of a node's state and log ([`recorder`])
//! - the per-node state machine ([`driver`])
//! - the fleet-wide concurrent run ([`orchestrator`])
//! - the on-disk run log layout ([`log_dir`])

pub mod driver;
pub mod events;
pub mod log_dir;
pub mod orchestrator;
pub mod recorder;
pub mod state;

pub use crate::types::{NodeName, NodeStatus};
pub use driver::NodeDriver;
pub use events::{ChannelSink, EventSink, FleetEvent, NullSink};
pub use orchestrator::{Fleet, FleetOptions};
pub use state::{NodeRunState, RunResult};
