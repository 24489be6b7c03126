// src/engine/log_dir.rs

//! Per-run log directory layout.
//!
//! ```text
//! <log_root>/<YYYYmmdd_HHMMSS>[_N]/
//!     <config file name>      copy of the source configuration
//!     <node>.log              one per node with logging enabled
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

/// Timestamp format of run directory names.
pub const RUN_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Give up after this many same-second collisions.
const MAX_SUFFIX: u32 = 1000;

/// Create a fresh directory for a run started at `started`.
///
/// Runs never share a directory: when the timestamp directory already
/// exists (two runs in the same second), `_2`, `_3`, ... is appended.
pub fn create_run_dir(root: &Path, started: DateTime<Local>) -> io::Result<PathBuf> {
    fs::create_dir_all(root)?;

    let base = started.format(RUN_DIR_FORMAT).to_string();
    for n in 1..=MAX_SUFFIX {
        let name = if n == 1 {
            base.clone()
        } else {
            format!("{base}_{n}")
        };
        let candidate = root.join(name);

        match fs::create_dir(&candidate) {
            Ok(()) => {
                debug!(dir = %candidate.display(), "created run log directory");
                return Ok(candidate);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free run directory for {base} under {}", root.display()),
    ))
}

/// Copy the configuration the run was started from into the run directory.
///
/// Provenance only: a failed copy is logged and does not stop the run.
pub fn copy_source_config(run_dir: &Path, source: &Path) {
    if !source.is_file() {
        return;
    }

    let file_name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    let target = run_dir.join(file_name);

    if let Err(err) = fs::copy(source, &target) {
        warn!(
            source = %source.display(),
            target = %target.display(),
            error = %err,
            "could not copy config into run log directory"
        );
    }
}

/// Log file of `node` inside `run_dir`.
pub fn node_log_path(run_dir: &Path, node: &str) -> PathBuf {
    run_dir.join(format!("{node}.log"))
}
