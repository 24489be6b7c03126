// src/exec/mod.rs

//! Remote execution layer.
//!
//! - [`transport`] defines the `Transport` / `RemoteSession` seam the engine
//!   talks to, so tests can replace SSH with a scripted fake.
//! - [`ssh`] is the production transport on top of the system `ssh` client.
//! - [`command_runner`] runs a single command over a session and streams its
//!   output lines.

pub mod command_runner;
pub mod ssh;
pub mod transport;

pub use command_runner::run_command;
pub use ssh::{SshSession, SshTransport};
pub use transport::{BoxFuture, OutputStream, RemoteProcess, RemoteSession, Transport};
