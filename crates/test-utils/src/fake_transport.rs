use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Notify;

use scatter::config::NodeDescriptor;
use scatter::exec::{BoxFuture, OutputStream, RemoteProcess, RemoteSession, Transport};

/// Scripted behaviour of one remote command.
#[derive(Debug, Clone, Default)]
pub struct FakeCommand {
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit_code: i32,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    launch_error: Option<String>,
    stream_error: Option<String>,
}

impl FakeCommand {
    /// Exit 0, no output.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    /// The transport refuses to start the command.
    pub fn launch_error(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Reading stdout fails immediately.
    pub fn stream_error(message: &str) -> Self {
        Self {
            stream_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stdout(mut self, lines: &[&str]) -> Self {
        self.stdout = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn stderr(mut self, lines: &[&str]) -> Self {
        self.stderr = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Sleep before reporting the exit code.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Do not report the exit code until `gate` is notified.
    pub fn gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct HostScript {
    connect_error: Option<String>,
    connect_gate: Option<Arc<Notify>>,
    commands: HashMap<String, FakeCommand>,
}

/// In-memory `Transport` whose hosts and commands are scripted by the test.
///
/// Unscripted commands succeed; an unscripted `echo <text>` prints `<text>`.
/// Commands are matched against the full remote command line, i.e. after the
/// working-directory prefix has been applied.
///
/// Clones share their script and their record of launched commands, so a
/// test can keep a handle after moving the transport into a `Fleet`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    hosts: Arc<Mutex<HashMap<String, HostScript>>>,
    connects: Arc<Mutex<Vec<String>>>,
    launched: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connecting to `host` fails with `message`.
    pub fn unreachable(self, host: &str, message: &str) -> Self {
        self.with_host(host, |h| h.connect_error = Some(message.to_string()));
        self
    }

    /// Connecting to `host` blocks until `gate` is notified.
    pub fn connect_gate(self, host: &str, gate: Arc<Notify>) -> Self {
        self.with_host(host, |h| h.connect_gate = Some(gate));
        self
    }

    /// Script `command` on `host`.
    pub fn on(self, host: &str, command: &str, behaviour: FakeCommand) -> Self {
        self.with_host(host, |h| {
            h.commands.insert(command.to_string(), behaviour);
        });
        self
    }

    fn with_host(&self, host: &str, f: impl FnOnce(&mut HostScript)) {
        let mut hosts = self.hosts.lock().unwrap();
        f(hosts.entry(host.to_string()).or_default());
    }

    /// Hosts a connection was attempted to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    /// Every `(host, command line)` launched so far, in order.
    pub fn launched(&self) -> Vec<(String, String)> {
        self.launched.lock().unwrap().clone()
    }

    /// Command lines launched on `host`, in order.
    pub fn launched_on(&self, host: &str) -> Vec<String> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    type Session = FakeSession;

    fn connect<'a>(&'a self, node: &'a NodeDescriptor) -> BoxFuture<'a, Result<FakeSession>> {
        Box::pin(async move {
            self.connects.lock().unwrap().push(node.host.clone());
            let script = self
                .hosts
                .lock()
                .unwrap()
                .get(&node.host)
                .cloned()
                .unwrap_or_default();

            if let Some(gate) = &script.connect_gate {
                gate.notified().await;
            }
            if let Some(message) = &script.connect_error {
                return Err(anyhow!("{message}"));
            }

            Ok(FakeSession {
                host: node.host.clone(),
                script,
                launched: Arc::clone(&self.launched),
            })
        })
    }
}

pub struct FakeSession {
    host: String,
    script: HostScript,
    launched: Arc<Mutex<Vec<(String, String)>>>,
}

impl RemoteSession for FakeSession {
    fn launch<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteProcess>> {
        Box::pin(async move {
            self.launched
                .lock()
                .unwrap()
                .push((self.host.clone(), command.to_string()));

            let behaviour = self
                .script
                .commands
                .get(command)
                .cloned()
                .unwrap_or_else(|| default_behaviour(command));

            if let Some(message) = behaviour.launch_error {
                return Err(anyhow!("{message}"));
            }

            let stdout: OutputStream = match behaviour.stream_error {
                Some(message) => Box::new(BrokenStream(message)),
                None => Box::new(io::Cursor::new(to_bytes(&behaviour.stdout))),
            };
            let stderr: OutputStream = Box::new(io::Cursor::new(to_bytes(&behaviour.stderr)));

            let FakeCommand {
                exit_code,
                delay,
                gate,
                ..
            } = behaviour;
            let exit = Box::pin(async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, anyhow::Error>(exit_code)
            });

            Ok(RemoteProcess {
                stdout,
                stderr,
                exit,
            })
        })
    }
}

fn default_behaviour(command: &str) -> FakeCommand {
    let last = command.rsplit(" && ").next().unwrap_or(command);
    match last.strip_prefix("echo ") {
        Some(text) => FakeCommand::ok().stdout(&[text]),
        None => FakeCommand::ok(),
    }
}

fn to_bytes(lines: &[String]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for line in lines {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

/// A stream whose first read fails.
struct BrokenStream(String);

impl AsyncRead for BrokenStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, self.0.clone())))
    }
}
