// src/engine/orchestrator.rs

//! Fleet orchestrator: runs every node's driver concurrently and collects
//! their final states.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, NodeDescriptor};
use crate::engine::driver::NodeDriver;
use crate::engine::events::{ERROR_PREFIX, EventSink};
use crate::engine::log_dir::{copy_source_config, create_run_dir, node_log_path};
use crate::engine::recorder::{SharedNodeState, append_log_line, lock_state};
use crate::engine::state::{NodeRunState, RunResult};
use crate::errors::Result;
use crate::exec::transport::Transport;
use crate::types::NodeStatus;

/// Where and whether a run writes its logs.
#[derive(Debug, Clone)]
pub struct FleetOptions {
    /// Parent of the per-run timestamped directories.
    pub log_root: PathBuf,
    /// Configuration file copied into each run directory.
    pub source_path: Option<PathBuf>,
    /// Global switch; per-node `no_logs` still applies when this is on.
    pub enable_logging: bool,
}

impl FleetOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_root: config.log_dir.clone(),
            source_path: config.source_path.clone(),
            enable_logging: true,
        }
    }

    pub fn without_logs(mut self) -> Self {
        self.enable_logging = false;
        self
    }
}

/// Runs a fixed set of nodes. Each call to [`Fleet::run`] is an independent
/// run with its own log directory and its own [`RunResult`].
pub struct Fleet<T: Transport> {
    nodes: Vec<NodeDescriptor>,
    transport: Arc<T>,
    sink: Arc<dyn EventSink>,
    options: FleetOptions,
}

impl<T: Transport> Fleet<T> {
    pub fn new(
        nodes: Vec<NodeDescriptor>,
        transport: T,
        sink: Arc<dyn EventSink>,
        options: FleetOptions,
    ) -> Self {
        Self {
            nodes,
            transport: Arc::new(transport),
            sink,
            options,
        }
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The state every node starts a run in: all `Pending`.
    pub fn initial_states(&self) -> RunResult {
        let mut result = RunResult::new(None);
        for node in &self.nodes {
            result.insert(NodeRunState::new(node.clone(), None));
        }
        result
    }

    /// Run every node concurrently and wait until all of them are finished.
    ///
    /// Node failures never make this return an error; they are recorded in
    /// the result. Only a log directory that cannot be created stops the run
    /// before it starts.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunResult> {
        let log_dir = self.prepare_log_dir()?;

        // Every node exists in `Pending` before any driver starts.
        let states: Vec<NodeRunState> = self
            .nodes
            .iter()
            .map(|node| {
                let log_file = match &log_dir {
                    Some(dir) if !node.no_logs => Some(node_log_path(dir, &node.name)),
                    _ => None,
                };
                NodeRunState::new(node.clone(), log_file)
            })
            .collect();

        info!(
            nodes = states.len(),
            log_dir = ?log_dir,
            "starting fleet run"
        );

        // Dropping the set (and with it this future) aborts every driver.
        let mut drivers = JoinSet::new();
        let mut live: HashMap<tokio::task::Id, SharedNodeState> = HashMap::new();
        for state in states {
            let driver = NodeDriver::new(
                state,
                Arc::clone(&self.transport),
                Arc::clone(&self.sink),
                cancel.child_token(),
            );
            let shared = driver.shared_state();
            let handle = drivers.spawn(driver.run());
            live.insert(handle.id(), shared);
        }

        let mut result = RunResult::new(log_dir);
        while let Some(joined) = drivers.join_next_with_id().await {
            match joined {
                Ok((id, state)) => {
                    live.remove(&id);
                    info!(node = %state.name(), status = %state.status, "node finished");
                    result.insert(state);
                }
                Err(err) => match live.remove(&err.id()) {
                    Some(shared) => {
                        let state = self.record_crash(&shared, &err).await;
                        result.insert(state);
                    }
                    None => error!(error = %err, "unknown node driver failed"),
                },
            }
        }

        info!(
            failed = result.failed_nodes().len(),
            cancelled = result.cancelled_nodes().len(),
            "fleet run complete"
        );

        Ok(result)
    }

    /// Mark a node whose driver panicked as failed, keeping everything it
    /// recorded. The crash line goes to the sink, history and log file like
    /// any other line, followed by the `Failed` status.
    async fn record_crash(&self, shared: &SharedNodeState, err: &JoinError) -> NodeRunState {
        let message = format!("Driver crashed: {err}");
        let line = format!("{ERROR_PREFIX}{message}");
        let (name, log_file) = {
            let state = lock_state(shared);
            (state.node.name.clone(), state.log_file.clone())
        };
        error!(node = %name, error = %err, "node driver crashed");

        self.sink.on_output(&name, &line);
        lock_state(shared).output_lines.push(line.clone());
        if let Some(path) = &log_file {
            if let Err(io_err) = append_log_line(path, &line).await {
                warn!(node = %name, error = %io_err, "could not log driver crash");
            }
        }

        let state = {
            let mut state = lock_state(shared);
            if state.error_message.is_none() {
                state.error_message = Some(message);
            }
            state.status = NodeStatus::Failed;
            state.clone()
        };
        self.sink.on_status(&name, NodeStatus::Failed);
        state
    }

    fn prepare_log_dir(&self) -> Result<Option<PathBuf>> {
        if !self.options.enable_logging || self.nodes.iter().all(|n| n.no_logs) {
            return Ok(None);
        }

        let dir = create_run_dir(&self.options.log_root, Local::now())?;
        if let Some(source) = &self.options.source_path {
            copy_source_config(&dir, source);
        }
        Ok(Some(dir))
    }
}
