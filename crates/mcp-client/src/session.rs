//! One MCP session: handshake, a single tool call, one outcome.
//!
//! [`Session`] is a pure state machine. It is fed transport events
//! (connected, bytes, end of stream, read error, timeout) and answers with
//! the frames to write next. [`drive`] runs it against a live [`Transport`]
//! until the outcome is fixed.
//!
//! ```text
//! Connecting ──connect──▶ Handshaking ──init ok──▶ Calling ──reply──▶ Done
//!      │                       │                      │
//!      └───────────────────────┴──────────────────────┴──error/timeout/eof──▶ Failed
//! ```

use std::io;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::error::McpError;
use crate::framing::FrameDecoder;
use crate::protocol::{self, JsonRpcRequest};
use crate::router::{self, Expect, Reply, Route};
use crate::transport::{is_broken_pipe, Transport, TransportEvent};

/// Inbound read size.
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Calling,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Whether `initialize` precedes the tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Process servers: `initialize`, then `tools/call`.
    Required,
    /// Socket bridges: `tools/call` straight away.
    Skipped,
}

/// The one request a session exists to make.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Fully qualified tool name, e.g. `bluekit.ping` or `bluekit/ping`.
    pub target: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(target: impl Into<String>, arguments: Value) -> Self {
        Self {
            target: target.into(),
            arguments,
        }
    }
}

pub struct Session {
    state: SessionState,
    handshake: Handshake,
    call: ToolCall,
    call_id: u64,
    initialized: bool,
    decoder: FrameDecoder,
    outcome: Option<Result<Value, McpError>>,
}

impl Session {
    pub fn new(call: ToolCall, handshake: Handshake) -> Self {
        Self {
            state: SessionState::Connecting,
            handshake,
            call,
            call_id: protocol::next_call_id(),
            initialized: false,
            decoder: FrameDecoder::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Take the outcome once the session is finished.
    pub fn take_outcome(&mut self) -> Option<Result<Value, McpError>> {
        self.outcome.take()
    }

    fn expect(&self) -> Expect {
        match self.state {
            SessionState::Connecting | SessionState::Done | SessionState::Failed => Expect::Nothing,
            SessionState::Handshaking => Expect::Initialize,
            SessionState::Calling => match self.handshake {
                Handshake::Required => Expect::ToolCall(self.call_id),
                Handshake::Skipped => Expect::AnyReply,
            },
        }
    }

    /// The transport is up. Returns the first frame to write.
    pub fn on_connect(&mut self) -> Option<Vec<u8>> {
        if self.state != SessionState::Connecting {
            return None;
        }
        match self.handshake {
            Handshake::Required => {
                self.state = SessionState::Handshaking;
                self.encode(JsonRpcRequest::initialize())
            }
            Handshake::Skipped => self.start_call(),
        }
    }

    /// Feed inbound bytes. Returns frames to write, in order.
    pub fn on_data(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut outbound = Vec::new();
        if self.is_finished() {
            return outbound;
        }
        for frame in self.decoder.push(chunk) {
            if let Some(out) = self.on_frame(&frame) {
                outbound.push(out);
            }
            if self.is_finished() {
                break;
            }
        }
        if !self.is_finished() && self.decoder.over_limit() {
            tracing::warn!(
                pending = self.decoder.pending().len(),
                "MCP server sent an oversized frame"
            );
            self.finalize(Err(McpError::InvalidResponse));
        }
        outbound
    }

    /// The server closed its output.
    pub fn on_end(&mut self) {
        if self.is_finished() {
            return;
        }
        if let Some(tail) = self.decoder.finish() {
            let parsed = if self.expect() == Expect::AnyReply {
                // Without a handshake the last thing the bridge wrote is the
                // reply, id or not.
                match router::tail_reply(&tail) {
                    Some(reply) => {
                        self.on_tool_reply(reply);
                        true
                    }
                    None => false,
                }
            } else if router::route(&tail, self.expect()).is_some() {
                // Nothing can be written any more, so a request this would
                // trigger is dropped.
                let _ = self.on_frame(&tail);
                true
            } else {
                false
            };
            if !parsed {
                tracing::debug!(pending = %tail, "stream ended inside a frame");
                self.finalize(Err(McpError::InvalidResponse));
                return;
            }
        }
        self.finalize(Err(McpError::ConnectionClosed));
    }

    /// A read or write failed with something other than a broken pipe.
    pub fn on_error(&mut self, err: io::Error) {
        self.finalize(Err(McpError::Transport(err)));
    }

    pub fn on_timeout(&mut self) {
        self.finalize(Err(McpError::Timeout));
    }

    fn on_frame(&mut self, frame: &str) -> Option<Vec<u8>> {
        let Some(route) = router::route(frame, self.expect()) else {
            tracing::debug!(frame = %frame, "skipping unparseable frame from MCP server");
            return None;
        };
        match route {
            Route::Initialize(Reply::Success(_)) => {
                self.initialized = true;
                tracing::debug!("MCP initialize response received");
                self.start_call()
            }
            Route::Initialize(Reply::Failure(err)) => {
                self.finalize(Err(McpError::Initialize(err.message_or_default().to_owned())));
                None
            }
            Route::Initialize(Reply::Empty) => {
                tracing::debug!(frame = %frame, "reply carried neither result nor error");
                None
            }
            Route::ToolCall(reply) => {
                self.on_tool_reply(reply);
                None
            }
            Route::Unsolicited => {
                tracing::debug!(frame = %frame, "ignoring unsolicited message from MCP server");
                None
            }
        }
    }

    fn on_tool_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Success(value) => self.finalize(Ok(value)),
            Reply::Failure(err) => self.finalize(Err(McpError::Call {
                message: err.message_or_default().to_owned(),
                code: err.code,
                data: err.data,
            })),
            Reply::Empty => tracing::debug!("reply carried neither result nor error"),
        }
    }

    fn start_call(&mut self) -> Option<Vec<u8>> {
        self.state = SessionState::Calling;
        let request =
            JsonRpcRequest::tool_call(self.call_id, &self.call.target, self.call.arguments.clone());
        tracing::debug!(id = self.call_id, tool = %self.call.target, "sending MCP tool call");
        self.encode(request)
    }

    fn encode(&mut self, request: JsonRpcRequest) -> Option<Vec<u8>> {
        match request.to_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                self.finalize(Err(McpError::Encode(e)));
                None
            }
        }
    }

    /// Fix the outcome. Only the first call has any effect.
    fn finalize(&mut self, outcome: Result<Value, McpError>) {
        if self.is_finished() {
            return;
        }
        self.state = if outcome.is_ok() {
            SessionState::Done
        } else {
            SessionState::Failed
        };
        if let Err(e) = &outcome {
            tracing::debug!(error = %e, initialized = self.initialized, "MCP session failed");
        }
        self.outcome = Some(outcome);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run `session` over a connected `transport` until it finishes or
/// `deadline` passes.
///
/// Once the child exits the deadline no longer applies; whatever is left in
/// its stdout is read for at most `exit_drain` before the stream counts as
/// ended.
pub async fn drive(session: &mut Session, transport: &mut Transport, deadline: Instant, exit_drain: Duration) {
    if let Some(frame) = session.on_connect() {
        write_frame(session, transport, &frame, deadline).await;
    }

    let mut buf = vec![0u8; READ_CHUNK];
    let timer = tokio::time::sleep_until(deadline);
    tokio::pin!(timer);
    let drain = tokio::time::sleep_until(deadline);
    tokio::pin!(drain);
    // Socket transports have no process to wait for.
    let has_process = transport.has_process();
    let mut exited = false;

    while !session.is_finished() {
        tokio::select! {
            _ = &mut timer, if !exited => session.on_timeout(),
            _ = &mut drain, if exited => {
                tracing::debug!("MCP server exited but its output stayed open");
                session.on_end();
            }
            event = transport.next_event(&mut buf, has_process && !exited) => match event {
                TransportEvent::Data(n) => {
                    for frame in session.on_data(&buf[..n]) {
                        write_frame(session, transport, &frame, deadline).await;
                    }
                }
                TransportEvent::End => session.on_end(),
                TransportEvent::Error(e) => session.on_error(e),
                TransportEvent::Exited(status) => {
                    exited = true;
                    drain.as_mut().reset(Instant::now() + exit_drain);
                    match status {
                        Ok(exit) => tracing::debug!(%exit, "MCP server exited"),
                        Err(e) => tracing::warn!(error = %e, "error waiting for MCP server process"),
                    }
                }
            },
        }
    }
}

async fn write_frame(session: &mut Session, transport: &mut Transport, frame: &[u8], deadline: Instant) {
    match tokio::time::timeout_at(deadline, transport.send(frame)).await {
        Ok(Ok(())) => {}
        // The server is gone; its closed output decides the outcome.
        Ok(Err(e)) if is_broken_pipe(&e) => {
            tracing::debug!("MCP server input closed before the request was written");
        }
        Ok(Err(e)) => session.on_error(e),
        Err(_) => session.on_timeout(),
    }
}
