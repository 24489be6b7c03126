// src/exec/transport.rs

//! Pluggable remote execution abstraction.
//!
//! The engine never talks SSH directly. It asks a [`Transport`] for a session
//! to a node and asks that [`RemoteSession`] to launch commands. This makes it
//! easy to swap in a scripted fake in tests while keeping the production
//! implementation in [`super::ssh`].

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use tokio::io::AsyncRead;

use crate::config::NodeDescriptor;

/// Boxed `Send` future, used so the traits below stay object-friendly.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte stream of a remote process (stdout or stderr).
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens authenticated sessions to nodes.
pub trait Transport: Send + Sync + 'static {
    type Session: RemoteSession;

    /// Establish a session to `node`.
    ///
    /// Implementations may honour `node.timeout` themselves; the driver also
    /// bounds the whole call with it.
    fn connect<'a>(&'a self, node: &'a NodeDescriptor) -> BoxFuture<'a, Result<Self::Session>>;
}

/// An established session on which commands can be launched.
///
/// Every launch is an independent remote invocation: no shell state carries
/// over between commands.
pub trait RemoteSession: Send + Sync {
    fn launch<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteProcess>>;
}

/// A command running on the remote side.
///
/// Both streams must be drained to end-of-stream before `exit` is awaited.
pub struct RemoteProcess {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    /// Resolves to the remote exit code once the process has finished.
    pub exit: BoxFuture<'static, Result<i32>>,
}

impl std::fmt::Debug for RemoteProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProcess").finish_non_exhaustive()
    }
}
