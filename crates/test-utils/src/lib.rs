pub mod builders;
pub mod fake_transport;

use std::sync::Once;

use scatter::engine::FleetEvent;
use scatter::types::NodeStatus;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Take every event currently buffered in `rx` without waiting.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<FleetEvent>) -> Vec<FleetEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Status changes reported for `node`, in order.
pub fn statuses_of(events: &[FleetEvent], node: &str) -> Vec<NodeStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            FleetEvent::Status { node: n, status } if n == node => Some(*status),
            _ => None,
        })
        .collect()
}

/// Output lines reported for `node`, in order.
pub fn outputs_of(events: &[FleetEvent], node: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            FleetEvent::Output { node: n, line } if n == node => Some(line.clone()),
            _ => None,
        })
        .collect()
}
