// src/engine/recorder.rs

//! The single writer of a node's [`NodeRunState`].
//!
//! Every output line goes, in this order, to the event sink, the in-memory
//! history, and the node's log file. Status changes are validated against the
//! node state machine and reported exactly once.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::engine::events::EventSink;
use crate::engine::state::NodeRunState;
use crate::types::{NodeName, NodeStatus};

/// A node's run state, shared between its recorder and the orchestrator so
/// that everything recorded before a driver panic is still available.
pub type SharedNodeState = Arc<Mutex<NodeRunState>>;

/// Lock a shared node state. The lock is never held while calling out to a
/// sink, so a poisoned mutex still holds consistent data.
pub(crate) fn lock_state(state: &Mutex<NodeRunState>) -> MutexGuard<'_, NodeRunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NodeRecorder {
    name: NodeName,
    state: SharedNodeState,
    sink: Arc<dyn EventSink>,
    log: Option<LogWriter>,
}

impl NodeRecorder {
    pub fn new(state: NodeRunState, sink: Arc<dyn EventSink>) -> Self {
        Self {
            name: state.node.name.clone(),
            state: Arc::new(Mutex::new(state)),
            sink,
            log: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NodeRunState> {
        lock_state(&self.state)
    }

    /// Handle on the live state, valid even after the driver is gone.
    pub fn shared_state(&self) -> SharedNodeState {
        Arc::clone(&self.state)
    }

    /// Open the node's log file for appending, if one was assigned.
    ///
    /// Failing to open it is not fatal for the node; the run simply goes
    /// unlogged.
    pub async fn open_log(&mut self) {
        let Some(path) = self.lock().log_file.clone() else {
            return;
        };

        match LogWriter::open(&path).await {
            Ok(writer) => self.log = Some(writer),
            Err(err) => {
                warn!(
                    node = %self.name,
                    path = %path.display(),
                    error = %err,
                    "could not open node log file; continuing without it"
                );
                self.lock().log_file = None;
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> NodeStatus {
        self.lock().status
    }

    /// Emit one complete output line for this node.
    pub async fn output(&mut self, line: impl Into<String>) {
        let line = line.into();

        self.sink.on_output(&self.name, &line);
        self.lock().output_lines.push(line.clone());

        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Err(err) = log.append(&line).await {
            warn!(
                node = %self.name,
                error = %err,
                "writing node log failed; disabling log for the rest of the run"
            );
            self.log = None;
        }
    }

    /// Move to `next` and notify the sink.
    ///
    /// Transitions outside the state machine are ignored (and logged), so a
    /// finished node can never be reopened.
    pub fn set_status(&mut self, next: NodeStatus) {
        {
            let mut state = self.lock();
            let current = state.status;
            if !current.can_transition_to(next) {
                warn!(
                    node = %self.name,
                    from = %current,
                    to = %next,
                    "ignoring invalid status transition"
                );
                return;
            }
            debug!(node = %self.name, from = %current, to = %next, "status change");
            state.status = next;
        }
        self.sink.on_status(&self.name, next);
    }

    /// Record the node's error message. Only the first failure is kept.
    pub fn set_error(&mut self, message: impl Into<String>) {
        let mut state = self.lock();
        if state.error_message.is_none() {
            state.error_message = Some(message.into());
        }
    }

    pub fn begin_command(&mut self, index: usize, command: &str) {
        {
            let mut state = self.lock();
            state.current_command_index = index;
            state.current_command = Some(command.to_string());
        }
        self.sink.on_command(&self.name, index, command);
    }

    pub fn into_state(self) -> NodeRunState {
        let state = self.lock().clone();
        state
    }
}

/// Append one line to a node log outside of its recorder.
pub(crate) async fn append_log_line(path: &Path, line: &str) -> std::io::Result<()> {
    LogWriter::open(path).await?.append(line).await
}

/// Append-only plain-text log, one line per record.
struct LogWriter {
    file: File,
}

impl LogWriter {
    async fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self { file })
    }

    async fn append(&mut self, line: &str) -> std::io::Result<()> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        self.file.write_all(record.as_bytes()).await?;
        // Keep the file in step with the in-memory history.
        self.file.flush().await
    }
}
