// src/exec/command_runner.rs

//! Runs one command over an established session and streams its output.

use std::borrow::Cow;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::engine::events::{COMMAND_ERROR_PREFIX, STDERR_PREFIX};
use crate::engine::recorder::NodeRecorder;
use crate::exec::transport::RemoteSession;

/// Run `command` on `session`, emitting every output line through `recorder`.
///
/// stdout and stderr are drained concurrently until both reach end-of-stream;
/// lines keep their order within each stream. Returns `true` iff the remote
/// exit code is 0.
///
/// Transport faults are reported as a `Command error:` line and turn into
/// `false`; they never escape this function.
pub async fn run_command<S>(session: &S, command: &str, recorder: &mut NodeRecorder) -> bool
where
    S: RemoteSession + ?Sized,
{
    match stream_command(session, command, recorder).await {
        Ok(0) => {
            debug!(node = %recorder.name(), cmd = %command, "command succeeded");
            true
        }
        Ok(code) => {
            info!(node = %recorder.name(), cmd = %command, exit_code = code, "command failed");
            recorder
                .output(format!("Command exited with status {code}"))
                .await;
            false
        }
        Err(err) => {
            warn!(node = %recorder.name(), cmd = %command, error = %err, "command transport error");
            recorder
                .output(format!("{COMMAND_ERROR_PREFIX}{err:#}"))
                .await;
            false
        }
    }
}

async fn stream_command<S>(
    session: &S,
    command: &str,
    recorder: &mut NodeRecorder,
) -> anyhow::Result<i32>
where
    S: RemoteSession + ?Sized,
{
    let process = session.launch(command).await?;

    let mut stdout = BufReader::new(process.stdout).split(b'\n');
    let mut stderr = BufReader::new(process.stderr).split(b'\n');
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        tokio::select! {
            segment = stdout.next_segment(), if stdout_open => match segment? {
                Some(bytes) => recorder.output(decode_line(&bytes)).await,
                None => stdout_open = false,
            },
            segment = stderr.next_segment(), if stderr_open => match segment? {
                Some(bytes) => {
                    recorder
                        .output(format!("{STDERR_PREFIX}{}", decode_line(&bytes)))
                        .await
                }
                None => stderr_open = false,
            },
        }
    }

    process.exit.await
}

/// Lossy UTF-8 decode with the trailing `\r` of CRLF output removed.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}
