// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::Config;
use crate::config::loader::load_and_validate;
use crate::console::ConsoleRenderer;
use crate::engine::{ChannelSink, Fleet, FleetOptions, RunResult};
use crate::errors::Result;
use crate::exec::SshTransport;

/// Process exit code when every node succeeded.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code when a node failed or the run could not start.
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code when the run was interrupted.
pub const EXIT_CANCELLED: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ `--key` override and key checks)
/// - the fleet orchestrator over the SSH transport
/// - the console renderer draining fleet events
/// - Ctrl-C handling
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_and_validate(&args.config)?;

    if let Some(key) = &args.key {
        cfg.override_ssh_key(key);
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(EXIT_SUCCESS);
    }

    cfg.ensure_ssh_keys_exist()?;

    let mut options = FleetOptions::from_config(&cfg);
    if args.no_logs {
        options = options.without_logs();
    }

    let (sink, events) = ChannelSink::new();
    let renderer = ConsoleRenderer::for_stdout(&cfg.nodes).spawn(events);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let fleet = Fleet::new(cfg.nodes, SshTransport::new(), Arc::new(sink), options);
    let result = fleet.run(cancel).await?;

    // Dropping the fleet drops the last sender, which lets the console drain
    // what is left and stop.
    drop(fleet);
    console::join(renderer).await;

    Ok(report(&result))
}

/// Print the final summary on stderr and map it to an exit code.
///
/// Failed node names go to stderr so they stay apart from the interleaved
/// per-node output on stdout.
pub fn report(result: &RunResult) -> i32 {
    if let Some(dir) = result.log_dir() {
        eprintln!("\nLogs written to {}", dir.display());
    }

    let cancelled = result.cancelled_nodes();
    if !cancelled.is_empty() {
        eprintln!("\nCancelled nodes: {}", cancelled.join(", "));
    }

    let failed = result.failed_nodes();
    if !failed.is_empty() {
        eprintln!("\nFailed nodes: {}", failed.join(", "));
    }

    exit_code(result)
}

/// `0` when every node succeeded, `130` if any node was cancelled, `1`
/// otherwise.
pub fn exit_code(result: &RunResult) -> i32 {
    if result.all_succeeded() {
        EXIT_SUCCESS
    } else if !result.cancelled_nodes().is_empty() {
        EXIT_CANCELLED
    } else {
        EXIT_FAILURE
    }
}

/// Simple dry-run output: print nodes, connection settings and commands.
fn print_dry_run(cfg: &Config) {
    println!("scatter dry-run");
    println!("  log_dir = {}", cfg.log_dir.display());
    println!();

    println!("nodes ({}):", cfg.nodes.len());
    for node in &cfg.nodes {
        println!("  - {} ({})", node.name, node.address());
        println!("      ssh_key: {}", node.ssh_key.display());
        println!("      timeout: {}s", node.timeout.as_secs());
        if let Some(dir) = &node.work_dir {
            println!("      work_dir: {dir}");
        }
        if !node.stop_on_error {
            println!("      stop_on_error: false");
        }
        if node.no_logs {
            println!("      no_logs: true");
        }
        println!("      commands:");
        for cmd in &node.commands {
            println!("        $ {cmd}");
        }
    }

    debug!("dry-run complete (no connections)");
}
