// src/console.rs

//! Plain console renderer.
//!
//! Drains [`FleetEvent`]s on its own task and prints one line per event,
//! tagged with the node name in a per-node colour:
//!
//! ```text
//! [web-1] $ uptime
//! [web-1]  10:02:11 up 3 days, ...
//! [web-1] Status: success
//! ```

use std::collections::HashMap;
use std::io::IsTerminal;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::NodeDescriptor;
use crate::engine::FleetEvent;
use crate::types::NodeName;

const PALETTE: [&str; 8] = [
    "\x1b[36m", // cyan
    "\x1b[33m", // yellow
    "\x1b[35m", // magenta
    "\x1b[32m", // green
    "\x1b[34m", // blue
    "\x1b[91m", // light red
    "\x1b[96m", // light cyan
    "\x1b[93m", // light yellow
];
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone)]
pub struct ConsoleRenderer {
    colors: HashMap<NodeName, &'static str>,
    use_color: bool,
}

impl ConsoleRenderer {
    /// Colours are assigned in node order, cycling through the palette.
    pub fn new(nodes: &[NodeDescriptor], use_color: bool) -> Self {
        let colors = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), PALETTE[i % PALETTE.len()]))
            .collect();
        Self { colors, use_color }
    }

    /// Colour only when stdout is a terminal.
    pub fn for_stdout(nodes: &[NodeDescriptor]) -> Self {
        Self::new(nodes, std::io::stdout().is_terminal())
    }

    /// Text to print for `event`, if any.
    pub fn render(&self, event: &FleetEvent) -> Option<String> {
        match event {
            FleetEvent::Output { node, line } => Some(format!("{} {line}", self.tag(node))),
            FleetEvent::Status { node, status } => {
                Some(format!("{} Status: {status}", self.tag(node)))
            }
            // The `$ cmd` output line already announces the command.
            FleetEvent::CommandStarted { .. } => None,
        }
    }

    fn tag(&self, node: &str) -> String {
        match self.colors.get(node) {
            Some(color) if self.use_color => format!("{color}[{node}]{RESET}"),
            _ => format!("[{node}]"),
        }
    }

    /// Print events until every sender is dropped.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<FleetEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(text) = self.render(&event) {
                    println!("{text}");
                }
            }
        })
    }
}

/// Wait for a spawned renderer to finish draining.
///
/// Returns `false` if the renderer task died instead of finishing.
pub async fn join(console: JoinHandle<()>) -> bool {
    match console.await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "console renderer stopped abnormally");
            false
        }
    }
}
