//! MCP transport layer.
//!
//! A transport is a byte pipe to one MCP server:
//! - **Process**: spawn a child and talk over its stdin/stdout; stderr is
//!   drained to the log.
//! - **Socket**: connect to a listening Unix domain socket.
//!
//! Framing and correlation live above this layer; the transport only moves
//! bytes and reports the child's exit.

use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;

use bk_domain::config::{Endpoint, ProcessConfig};

use crate::error::McpError;
use crate::shutdown::{ExitSummary, ProcessControl, ShutdownCoordinator, ShutdownPolicy, ShutdownState};

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Whether an I/O error is the expected fallout of the peer closing first.
pub fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What happened on the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// This many bytes were read into the caller's buffer.
    Data(usize),
    /// The server closed its output.
    End,
    /// A read failed with something other than a broken pipe.
    Error(io::Error),
    /// The child process exited.
    Exited(io::Result<ExitSummary>),
}

/// An open connection to one MCP server, owned by a single session.
pub struct Transport {
    reader: BoxReader,
    writer: Option<BoxWriter>,
    child: Option<ChildProcess>,
    stderr_task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Open whichever transport the endpoint describes.
    pub async fn open(endpoint: &Endpoint) -> Result<Self, McpError> {
        match endpoint {
            Endpoint::Process(config) => Self::spawn(config),
            Endpoint::Socket(path) => Self::connect(path).await,
        }
    }

    /// Spawn the server process with all three standard streams piped.
    pub fn spawn(config: &ProcessConfig) -> Result<Self, McpError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(McpError::Spawn)?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or_else(|| missing_stream("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_stream("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_stream("stderr"))?;

        tracing::debug!(command = %config.command, ?pid, "spawned MCP server");

        Ok(Self {
            reader: Box::new(stdout),
            writer: Some(Box::new(stdin)),
            child: Some(ChildProcess::new(child)),
            stderr_task: Some(spawn_stderr_logger(stderr, pid)),
        })
    }

    /// Connect to a Unix socket; fails fast if nothing is listening.
    #[cfg(unix)]
    pub async fn connect(path: &Path) -> Result<Self, McpError> {
        let stream = tokio::net::UnixStream::connect(path)
            .await
            .map_err(McpError::Connect)?;
        tracing::debug!(path = %path.display(), "connected to MCP socket");
        let (read, write) = stream.into_split();
        Ok(Self::from_streams(read, write))
    }

    #[cfg(not(unix))]
    pub async fn connect(path: &Path) -> Result<Self, McpError> {
        Err(McpError::Connect(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Unix sockets are not available on this platform: {}", path.display()),
        )))
    }

    /// A transport over arbitrary streams, with no process attached.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Some(Box::new(writer)),
            child: None,
            stderr_task: None,
        }
    }

    /// Write one complete frame and flush it.
    pub async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "MCP server input is closed"))?;
        writer.write_all(frame).await?;
        writer.flush().await
    }

    /// Wait for the next inbound chunk or, when `watch_exit` is set, the
    /// child's exit. Cancel-safe.
    pub async fn next_event(&mut self, buf: &mut [u8], watch_exit: bool) -> TransportEvent {
        let Self { reader, child, .. } = self;
        tokio::select! {
            read = reader.read(buf) => match read {
                Ok(0) => TransportEvent::End,
                Ok(n) => TransportEvent::Data(n),
                Err(e) if is_broken_pipe(&e) => TransportEvent::End,
                Err(e) => TransportEvent::Error(e),
            },
            exit = wait_child(child.as_mut()), if watch_exit => TransportEvent::Exited(exit),
        }
    }

    pub fn has_process(&self) -> bool {
        self.child.is_some()
    }

    /// Tear the transport down. See [`crate::shutdown`] for the sequence.
    pub async fn shutdown(mut self, policy: ShutdownPolicy) -> ShutdownState {
        let grace = policy.grace;
        let mut coordinator = ShutdownCoordinator::new(policy);
        let process = self.child.as_mut().map(|c| c as &mut dyn ProcessControl);
        let state = coordinator.run(self.writer.take(), process).await;

        if let Some(mut task) = self.stderr_task.take() {
            // Let the last stderr lines reach the log, but do not hang on a
            // grandchild that inherited the pipe.
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                task.abort();
            }
        }
        state
    }
}

async fn wait_child(child: Option<&mut ChildProcess>) -> io::Result<ExitSummary> {
    match child {
        Some(child) => child.wait_exit().await,
        None => std::future::pending().await,
    }
}

fn missing_stream(name: &str) -> McpError {
    McpError::Spawn(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("failed to capture child {name}"),
    ))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Child process
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A spawned server process.
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitSummary>,
}

impl ChildProcess {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            exit: None,
        }
    }
}

#[async_trait]
impl ProcessControl for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait_exit(&mut self) -> io::Result<ExitSummary> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = ExitSummary::from(self.child.wait().await?);
        self.exit = Some(exit);
        Ok(exit)
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if self.exit.is_some() {
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        match self.child.start_kill() {
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stderr
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forward the server's stderr to the log, line by line.
fn spawn_stderr_logger(stderr: ChildStderr, pid: Option<u32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim_end();
                    // Servers report our half-close as EPIPE; that is expected.
                    if text.is_empty() || text.contains("EPIPE") {
                        continue;
                    }
                    tracing::info!(?pid, line = %text, "MCP server stderr");
                }
                Err(e) if is_broken_pipe(&e) => break,
                Err(e) => {
                    tracing::warn!(?pid, error = %e, "error reading MCP server stderr");
                    break;
                }
            }
        }
    })
}
