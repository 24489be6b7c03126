// src/engine/driver.rs

//! Per-node session driver: one node's state machine for one run.
//!
//! ```text
//! Pending -> Connecting -> Running -> Success
//!                 |            \----> Failed   (stop-on-error)
//!                 \-----------------> Failed   (connect error)
//! any non-terminal ------------------> Cancelled
//! ```

use std::sync::Arc;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::NodeDescriptor;
use crate::engine::events::{ERROR_PREFIX, EventSink};
use crate::engine::recorder::{NodeRecorder, SharedNodeState};
use crate::engine::state::NodeRunState;
use crate::exec::command_runner::run_command;
use crate::exec::transport::Transport;
use crate::types::NodeStatus;

pub struct NodeDriver<T: Transport> {
    node: NodeDescriptor,
    transport: Arc<T>,
    recorder: NodeRecorder,
    cancel: CancellationToken,
}

impl<T: Transport> NodeDriver<T> {
    pub fn new(
        state: NodeRunState,
        transport: Arc<T>,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node: state.node.clone(),
            transport,
            recorder: NodeRecorder::new(state, sink),
            cancel,
        }
    }

    /// The node's live state. Outlives the driver, including a panicking one.
    pub fn shared_state(&self) -> SharedNodeState {
        self.recorder.shared_state()
    }

    /// Drive the node to a finished state and hand back its run state.
    ///
    /// If the cancellation token fires first, in-flight work is dropped
    /// (which kills any remote process) and the node ends up `Cancelled`.
    pub async fn run(mut self) -> NodeRunState {
        self.recorder.open_log().await;

        let cancel = self.cancel.clone();
        let cancelled = {
            let work = self.drive();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = work => false,
            }
        };

        if cancelled && !self.recorder.status().is_finished() {
            info!(node = %self.recorder.name(), "run cancelled");
            self.recorder.output("Cancelled").await;
            self.recorder.set_status(NodeStatus::Cancelled);
        }

        self.recorder.into_state()
    }

    async fn drive(&mut self) {
        let node = &self.node;

        self.recorder.set_status(NodeStatus::Connecting);
        self.recorder
            .output(format!("Connecting to {}...", node.address()))
            .await;

        let connect = tokio::time::timeout(node.timeout, self.transport.connect(node)).await;
        let session = match connect {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => return fail_connect(&mut self.recorder, err).await,
            Err(_) => {
                let err = anyhow!("connection timed out after {:?}", node.timeout);
                return fail_connect(&mut self.recorder, err).await;
            }
        };

        self.recorder.set_status(NodeStatus::Running);
        self.recorder.output("Connected successfully").await;
        if let Some(dir) = &node.work_dir {
            self.recorder.output(format!("Working directory: {dir}")).await;
        }
        self.recorder.output("").await;

        for (index, cmd) in node.commands.iter().enumerate() {
            self.recorder.begin_command(index, cmd);
            self.recorder.output(format!("$ {cmd}")).await;

            let remote_cmd = node.wrap_command(cmd);
            let ok = run_command(&session, &remote_cmd, &mut self.recorder).await;

            if !ok && node.stop_on_error {
                info!(node = %node.name, cmd = %cmd, index, "stopping node after failed command");
                self.recorder.set_error(format!("Command failed: {cmd}"));
                self.recorder.set_status(NodeStatus::Failed);
                return;
            }
        }

        self.recorder.output("").await;
        self.recorder.output("All commands completed").await;
        self.recorder.set_status(NodeStatus::Success);
    }
}

async fn fail_connect(recorder: &mut NodeRecorder, err: anyhow::Error) {
    warn!(node = %recorder.name(), error = %err, "connection failed");
    recorder.set_error(format!("Connection error: {err:#}"));
    recorder.output(format!("{ERROR_PREFIX}{err:#}")).await;
    recorder.set_status(NodeStatus::Failed);
}
