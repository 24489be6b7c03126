// src/exec/ssh.rs

//! Production transport built on the system `ssh` client.
//!
//! A session is an OpenSSH ControlMaster process; each command is a separate
//! `ssh` invocation multiplexed over the master's control socket, so
//! authentication happens once per node and per run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info};

use crate::config::NodeDescriptor;
use crate::exec::transport::{BoxFuture, RemoteProcess, RemoteSession, Transport};

/// How often to probe the control socket while the master authenticates.
const MASTER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-process counter so two sessions never share a control socket, even
/// when they target the same `user@host:port`.
static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct SshTransport {
    program: PathBuf,
    control_dir: PathBuf,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            control_dir: std::env::temp_dir(),
        }
    }
}

impl SshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `ssh` binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Directory for control sockets. Keep it short: socket paths are
    /// limited to roughly 100 bytes.
    pub fn with_control_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control_dir = dir.into();
        self
    }

    fn next_control_path(&self) -> PathBuf {
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        self.control_dir
            .join(format!("scatter-{}-{}", std::process::id(), id))
    }

    async fn establish(&self, node: &NodeDescriptor) -> Result<SshSession> {
        // Removed on every exit path: error, timeout (the future is dropped)
        // or, on success, when the session goes away.
        let control = ControlSocket::new(self.next_control_path());
        let control_path = control.path();

        info!(
            node = %node.name,
            address = %node.address(),
            control_path = %control_path.display(),
            "starting ssh control master"
        );

        let mut child = ssh_command(&self.program, node, control_path)
            .arg("-M")
            .arg("-N")
            .arg(&node.host)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning ssh for {}", node.address()))?;

        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("polling ssh master for {}", node.address()))?
            {
                let mut message = String::new();
                if let Some(mut stderr) = child.stderr.take() {
                    let _ = stderr.read_to_string(&mut message).await;
                }
                let message = message.trim();
                if message.is_empty() {
                    bail!("ssh exited with {status} while connecting to {}", node.address());
                }
                bail!("{message}");
            }

            if control_socket_ready(&self.program, &node.host, control_path).await {
                break;
            }

            tokio::time::sleep(MASTER_POLL_INTERVAL).await;
        }

        debug!(node = %node.name, "ssh control master ready");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_master_stderr(node.name.clone(), stderr));
        }

        Ok(SshSession {
            program: self.program.clone(),
            node: node.clone(),
            _master: child,
            control,
        })
    }
}

impl Transport for SshTransport {
    type Session = SshSession;

    fn connect<'a>(&'a self, node: &'a NodeDescriptor) -> BoxFuture<'a, Result<SshSession>> {
        Box::pin(self.establish(node))
    }
}

/// An authenticated ControlMaster for one node.
///
/// Dropping the session kills the master (`kill_on_drop`), which also tears
/// down any command still multiplexed over it.
#[derive(Debug)]
pub struct SshSession {
    program: PathBuf,
    node: NodeDescriptor,
    // Field order matters: the master is killed before its socket is removed.
    _master: Child,
    control: ControlSocket,
}

impl SshSession {
    fn spawn(&self, command: &str) -> Result<RemoteProcess> {
        let mut cmd = ssh_command(&self.program, &self.node, self.control.path());
        cmd.arg("-o")
            .arg("ControlMaster=no")
            .arg("-T")
            .arg(&self.node.host)
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning ssh for command '{command}'"))?;

        let stdout = child.stdout.take().context("ssh stdout was not captured")?;
        let stderr = child.stderr.take().context("ssh stderr was not captured")?;

        let exit = Box::pin(async move {
            let status = child.wait().await.context("waiting for remote command")?;
            // Killed by a signal: no exit code.
            Ok::<_, anyhow::Error>(status.code().unwrap_or(-1))
        });

        Ok(RemoteProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}

impl RemoteSession for SshSession {
    fn launch<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteProcess>> {
        Box::pin(async move { self.spawn(command) })
    }
}

/// A control socket path owned by one connection attempt.
///
/// A killed or failed master leaves its socket behind; dropping this removes
/// it.
#[derive(Debug)]
struct ControlSocket {
    path: PathBuf,
}

impl ControlSocket {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Keep reading the master's stderr so it never blocks on a full pipe.
async fn drain_master_stderr(node: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(node = %node, "ssh master: {line}");
    }
}

/// Options shared by the master and every multiplexed command.
fn ssh_command(program: &Path, node: &NodeDescriptor, control_path: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("-p")
        .arg(node.port.to_string())
        .arg("-l")
        .arg(&node.user)
        .arg("-i")
        .arg(&node.ssh_key)
        .arg("-o")
        .arg("BatchMode=yes")
        .arg("-o")
        .arg(format!("ConnectTimeout={}", node.timeout.as_secs()))
        .arg("-o")
        .arg("StrictHostKeyChecking=no")
        .arg("-o")
        .arg("UserKnownHostsFile=/dev/null")
        .arg("-o")
        .arg("LogLevel=ERROR")
        .arg("-o")
        .arg(format!("ControlPath={}", control_path.display()))
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

async fn control_socket_ready(program: &Path, host: &str, control_path: &Path) -> bool {
    Command::new(program)
        .arg("-O")
        .arg("check")
        .arg("-o")
        .arg(format!("ControlPath={}", control_path.display()))
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
