// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, ScatterError};
use crate::types::NodeName;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// log_dir = "logs"
///
/// [defaults]
/// user = "deploy"
/// work_dir = "/srv/app"
///
/// [command_groups]
/// update = ["git pull", "make install"]
///
/// [[nodes]]
/// name = "web-1"
/// host = "10.0.0.11"
/// commands = ["update", "systemctl restart app"]
/// ```
///
/// Everything except `nodes` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Root directory for per-run log directories.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Values inherited by every node that does not override them.
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Named command lists that nodes may reference from `commands`.
    #[serde(default)]
    pub command_groups: BTreeMap<String, Vec<String>>,

    /// All nodes from `[[nodes]]`, in declaration order.
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// `[defaults]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub stop_on_error: bool,

    #[serde(default)]
    pub no_logs: bool,

    #[serde(default)]
    pub work_dir: Option<String>,

    #[serde(default = "default_ssh_key")]
    pub ssh_key: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_true() -> bool {
    true
}

fn default_ssh_key() -> String {
    "~/.ssh/id_rsa".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            user: default_user(),
            port: default_port(),
            stop_on_error: default_true(),
            no_logs: false,
            work_dir: None,
            ssh_key: default_ssh_key(),
            timeout: default_timeout(),
        }
    }
}

/// One `[[nodes]]` entry.
///
/// `name` and `host` are optional at the serde level so that validation can
/// report which node is missing them. Every other field falls back to
/// `[defaults]` when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    /// Direct commands and/or command group references.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub stop_on_error: Option<bool>,
    #[serde(default)]
    pub no_logs: Option<bool>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub ssh_key: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Fully resolved, immutable configuration for one host.
///
/// Produced by validation; the engine only ever borrows it. `commands` is
/// non-empty and `name` is unique across the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: NodeName,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub commands: Vec<String>,
    pub stop_on_error: bool,
    pub no_logs: bool,
    pub work_dir: Option<String>,
    /// Private key used to authenticate.
    pub ssh_key: PathBuf,
    /// Upper bound on session establishment.
    pub timeout: Duration,
}

impl NodeDescriptor {
    /// `user@host:port`, as shown in the connect banner.
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    /// The command line actually sent to the remote side.
    ///
    /// Each command is an independent remote invocation, so the working
    /// directory change has to be repeated every time.
    pub fn wrap_command(&self, cmd: &str) -> String {
        match &self.work_dir {
            Some(dir) => format!("cd {dir} && {cmd}"),
            None => cmd.to_string(),
        }
    }
}

/// Validated configuration handed to the engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub nodes: Vec<NodeDescriptor>,
    pub log_dir: PathBuf,
    /// File the configuration was loaded from, copied next to the run logs.
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Replace the key of every node (CLI `--key`).
    pub fn override_ssh_key(&mut self, key: &Path) {
        let key = expand_tilde(&key.to_string_lossy());
        for node in &mut self.nodes {
            node.ssh_key = key.clone();
        }
    }

    /// Fail before any connection is attempted if a referenced key is missing.
    pub fn ensure_ssh_keys_exist(&self) -> Result<()> {
        for node in &self.nodes {
            if !node.ssh_key.exists() {
                return Err(ScatterError::KeyNotFound(node.ssh_key.clone()));
            }
        }
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
