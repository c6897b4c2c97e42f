//! Subprocess transport
//!
//! Owns the MCP server child process. The protocol session gets the stdio
//! pipes; the transport keeps the process handle and is the only thing
//! that terminates it.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use super::launch::LaunchConfig;
use crate::error::{BridgeError, BridgeResult};

/// Tracing target for lines the server writes to stderr
pub const SERVER_STDERR_TARGET: &str = "mcp_bridge::server_stderr";

/// Owned handle to the process behind a protocol session
#[async_trait]
pub trait Transport: Send {
    /// OS process id, if the process is still owned
    fn id(&self) -> Option<u32>;

    /// Stop the process. Calling it again is a no-op.
    async fn terminate(&mut self) -> std::io::Result<()>;
}

/// Child process spawned from a [`LaunchConfig`]
pub struct ChildTransport {
    child: Option<Child>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ChildTransport {
    /// Spawn the server, returning the transport and the protocol pipes
    pub fn spawn(config: &LaunchConfig) -> BridgeResult<(Self, ChildStdout, ChildStdin)> {
        tracing::info!("Spawning MCP server: {}", config.display());

        let mut cmd = config.command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::Launch(format!("{}: {}", config.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Launch("child stdout was not captured".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Launch("child stdin was not captured".to_string()))?;
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(forward_stderr(stderr)));

        tracing::debug!(pid = ?child.id(), "MCP server process started");

        Ok((
            Self {
                child: Some(child),
                stderr_task,
            },
            stdout,
            stdin,
        ))
    }
}

#[async_trait]
impl Transport for ChildTransport {
    fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.try_wait()? {
            Some(status) => {
                tracing::debug!("MCP server already exited: {}", status);
            }
            None => {
                tracing::debug!(pid = ?child.id(), "Killing MCP server process");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: SERVER_STDERR_TARGET, "{}", line);
    }
}
