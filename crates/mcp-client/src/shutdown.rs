//! Escalating teardown of a session's transport.
//!
//! The sequence never cuts off a write that is still in flight and never
//! lets the server outlive the session:
//!
//! 1. close our end of the server's input (half-close, not destroy);
//! 2. wait [`ShutdownPolicy::grace`] for the server to exit on its own;
//! 3. send a soft terminate and wait [`ShutdownPolicy::terminate_grace`];
//! 4. send a hard kill and reap the exit status.
//!
//! Every step is skipped once the process is seen to have exited.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::transport::is_broken_pipe;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitSummary {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl From<std::process::ExitStatus> for ExitSummary {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ExitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

/// Control over the server process, as seen by the coordinator.
#[async_trait]
pub trait ProcessControl: Send {
    /// OS process id, when still known.
    fn id(&self) -> Option<u32>;

    /// Resolve once the process has exited. Cancel-safe, and returns the
    /// same summary again on later calls.
    async fn wait_exit(&mut self) -> io::Result<ExitSummary>;

    /// Ask the process to stop (SIGTERM on Unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to stop (SIGKILL on Unix).
    fn kill(&mut self) -> io::Result<()>;
}

/// Where teardown has got to. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    Open,
    Draining,
    /// Soft terminate sent.
    Terminating,
    /// Hard kill sent.
    Killing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Wait after closing input before the soft terminate.
    pub grace: Duration,
    /// Wait after the soft terminate before the hard kill.
    pub terminate_grace: Duration,
    /// Bound on reaping the exit status after the hard kill.
    pub reap_timeout: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(100),
            terminate_grace: Duration::from_millis(300),
            reap_timeout: Duration::from_secs(1),
        }
    }
}

/// Drives one transport through [`ShutdownState`]s.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    policy: ShutdownPolicy,
    state: ShutdownState,
}

impl ShutdownCoordinator {
    pub fn new(policy: ShutdownPolicy) -> Self {
        Self {
            policy,
            state: ShutdownState::Open,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Move to `next` if it is strictly later than the current state.
    pub fn advance(&mut self, next: ShutdownState) -> bool {
        if next <= self.state {
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?next, "shutdown state");
        self.state = next;
        true
    }

    /// Run the full sequence. Calling it again after it finished is a no-op.
    pub async fn run<W>(
        &mut self,
        writer: Option<W>,
        process: Option<&mut dyn ProcessControl>,
    ) -> ShutdownState
    where
        W: AsyncWrite + Unpin + Send,
    {
        if !self.advance(ShutdownState::Draining) {
            return self.state;
        }

        if let Some(writer) = writer {
            self.close_input(writer).await;
        }

        let Some(process) = process else {
            self.advance(ShutdownState::Closed);
            return self.state;
        };
        let pid = process.id();

        if self.exited_within(process, self.policy.grace).await {
            self.advance(ShutdownState::Closed);
            return self.state;
        }

        self.advance(ShutdownState::Terminating);
        tracing::warn!(?pid, "MCP server still running after input closed, sending terminate");
        if let Err(e) = process.terminate() {
            log_signal_error("terminate", pid, &e);
        }
        if self.exited_within(process, self.policy.terminate_grace).await {
            self.advance(ShutdownState::Closed);
            return self.state;
        }

        self.advance(ShutdownState::Killing);
        tracing::warn!(?pid, "MCP server ignored terminate, killing");
        if let Err(e) = process.kill() {
            log_signal_error("kill", pid, &e);
        }
        if !self.exited_within(process, self.policy.reap_timeout).await {
            tracing::warn!(?pid, "MCP server exit status not reaped after kill");
        }
        self.advance(ShutdownState::Closed);
        self.state
    }

    async fn close_input<W>(&self, mut writer: W)
    where
        W: AsyncWrite + Unpin + Send,
    {
        match tokio::time::timeout(self.policy.grace, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if is_broken_pipe(&e) => {
                tracing::debug!("MCP server input already closed");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error closing MCP server input");
            }
            Err(_) => {
                tracing::debug!("timed out flushing MCP server input");
            }
        }
    }

    async fn exited_within(&self, process: &mut dyn ProcessControl, wait: Duration) -> bool {
        match tokio::time::timeout(wait, process.wait_exit()).await {
            Ok(Ok(exit)) => {
                tracing::debug!(pid = ?process.id(), %exit, state = ?self.state, "MCP server exited");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error waiting for MCP server process");
                false
            }
            Err(_) => false,
        }
    }
}

fn log_signal_error(signal: &str, pid: Option<u32>, e: &io::Error) {
    if is_broken_pipe(e) {
        tracing::debug!(signal, ?pid, "MCP server already gone");
    } else {
        tracing::warn!(signal, ?pid, error = %e, "failed to signal MCP server");
    }
}
