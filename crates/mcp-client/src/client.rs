//! The one-call facade: build a session, drive it, tear it down.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use bk_domain::config::{Endpoint, SessionConfig};

use crate::error::McpError;
use crate::protocol::ToolOutput;
use crate::session::{self, Handshake, Session, ToolCall};
use crate::shutdown::{ShutdownPolicy, ShutdownState};
use crate::transport::Transport;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline for the whole call, connect included.
    pub timeout: Duration,
    pub shutdown: ShutdownPolicy,
    /// Return the outcome before shutdown has finished.
    pub detach_shutdown: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            shutdown: ShutdownPolicy::default(),
            detach_shutdown: false,
        }
    }
}

impl From<&SessionConfig> for ClientOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            shutdown: ShutdownPolicy {
                grace: config.grace(),
                terminate_grace: config.terminate_grace(),
                ..ShutdownPolicy::default()
            },
            detach_shutdown: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Makes single tool calls against one resolved endpoint.
///
/// Every [`call`](Self::call) opens its own transport; nothing is shared
/// between calls.
#[derive(Debug, Clone)]
pub struct McpClient {
    endpoint: Endpoint,
    options: ClientOptions,
}

impl McpClient {
    pub fn new(endpoint: Endpoint, options: ClientOptions) -> Self {
        Self { endpoint, options }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Tool name as the endpoint expects it: `server.tool` for a spawned
    /// server, `server/tool` for the socket bridge.
    pub fn target(&self, server: &str, tool: &str) -> String {
        match self.endpoint {
            Endpoint::Process(_) => format!("{server}.{tool}"),
            Endpoint::Socket(_) => format!("{server}/{tool}"),
        }
    }

    fn handshake(&self) -> Handshake {
        match self.endpoint {
            Endpoint::Process(_) => Handshake::Required,
            Endpoint::Socket(_) => Handshake::Skipped,
        }
    }

    /// Call `server`'s `tool` once and return what it answered.
    pub async fn call(&self, server: &str, tool: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        let deadline = Instant::now() + self.options.timeout;
        let target = self.target(server, tool);
        tracing::info!(
            server = %server,
            tool = %tool,
            transport = self.endpoint.kind(),
            "starting MCP session"
        );

        let transport = match tokio::time::timeout_at(deadline, Transport::open(&self.endpoint)).await {
            Ok(opened) => opened?,
            Err(_) => return Err(McpError::Timeout),
        };

        let call = ToolCall::new(target, arguments);
        let value = run_session(transport, call, self.handshake(), deadline, &self.options).await?;
        Ok(ToolOutput::from_value(value))
    }
}

/// Drive one session over an open transport, then shut the transport down.
pub(crate) async fn run_session(
    mut transport: Transport,
    call: ToolCall,
    handshake: Handshake,
    deadline: Instant,
    options: &ClientOptions,
) -> Result<Value, McpError> {
    let mut session = Session::new(call, handshake);
    session::drive(&mut session, &mut transport, deadline, options.shutdown.grace).await;

    let policy = options.shutdown;
    if options.detach_shutdown {
        let handle = tokio::spawn(async move {
            let state = transport.shutdown(policy).await;
            log_closed(state);
        });
        DETACHED.lock().unwrap_or_else(PoisonError::into_inner).push(handle);
    } else {
        log_closed(transport.shutdown(policy).await);
    }

    let outcome = session.take_outcome().unwrap_or(Err(McpError::ConnectionClosed));
    match &outcome {
        Ok(_) => tracing::info!(id = session.call_id(), "MCP session finished"),
        Err(e) => tracing::info!(id = session.call_id(), error = %e, "MCP session failed"),
    }
    outcome
}

/// Shutdowns still running after their call returned.
static DETACHED: Mutex<Vec<JoinHandle<()>>> = Mutex::new(Vec::new());

/// Wait for every detached shutdown to finish.
///
/// Call this before the runtime goes away; otherwise servers still in their
/// grace period are killed when the runtime drops them.
pub async fn wait_detached_shutdowns() {
    let handles = std::mem::take(&mut *DETACHED.lock().unwrap_or_else(PoisonError::into_inner));
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::debug!(error = %e, "detached MCP shutdown did not complete");
        }
    }
}

fn log_closed(state: ShutdownState) {
    tracing::debug!(state = ?state, "MCP transport closed");
}
