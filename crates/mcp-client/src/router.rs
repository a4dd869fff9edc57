//! Classifies inbound frames against the reply the session is waiting for.
//!
//! Anything that is not the expected reply is [`Route::Unsolicited`]:
//! servers emit notifications and log lines on stdout, and those look no
//! different from noise, so they are skipped rather than treated as errors.

use serde_json::Value;

use crate::protocol::{JsonRpcError, INITIALIZE_ID};

/// Which reply the session is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The `initialize` reply (id 1).
    Initialize,
    /// The `tools/call` reply with this id.
    ToolCall(u64),
    /// No handshake: the first reply carrying any id.
    AnyReply,
    /// Session already finalized.
    Nothing,
}

/// Payload of a matched reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Value),
    Failure(JsonRpcError),
    /// Neither `result` nor `error`.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Initialize(Reply),
    ToolCall(Reply),
    Unsolicited,
}

/// Route one frame. Returns `None` when the frame is not valid JSON.
pub fn route(frame: &str, expect: Expect) -> Option<Route> {
    let envelope: Value = serde_json::from_str(frame).ok()?;
    let Some(id) = envelope.get("id") else {
        return Some(Route::Unsolicited);
    };

    let route = match expect {
        Expect::Initialize if id_is(id, INITIALIZE_ID) => Route::Initialize(initialize_reply(&envelope)),
        Expect::ToolCall(call_id) if id_is(id, call_id) => {
            Route::ToolCall(tool_call_reply(envelope))
        }
        Expect::AnyReply if is_truthy(id) => Route::ToolCall(tool_call_reply(envelope)),
        _ => Route::Unsolicited,
    };
    Some(route)
}

/// Classify the remainder left when a connection without a handshake
/// closes. Any JSON value is taken as the reply, whatever its `id`.
/// Returns `None` when the remainder is not valid JSON.
pub fn tail_reply(frame: &str) -> Option<Reply> {
    let envelope: Value = serde_json::from_str(frame).ok()?;
    Some(tool_call_reply(envelope))
}

/// Numeric ids match by value, so `1.0` is the same id as `1`.
fn id_is(id: &Value, expected: u64) -> bool {
    id.as_f64() == Some(expected as f64)
}

fn member<'a>(envelope: &'a Value, key: &str) -> Option<&'a Value> {
    envelope.get(key).filter(|v| !v.is_null())
}

fn initialize_reply(envelope: &Value) -> Reply {
    if let Some(result) = member(envelope, "result") {
        return Reply::Success(result.clone());
    }
    match member(envelope, "error") {
        Some(error) => Reply::Failure(JsonRpcError::from_value(error)),
        None => Reply::Empty,
    }
}

/// A tool-call reply without `result` resolves with the whole envelope.
fn tool_call_reply(envelope: Value) -> Reply {
    if let Some(error) = member(&envelope, "error") {
        return Reply::Failure(JsonRpcError::from_value(error));
    }
    match member(&envelope, "result") {
        Some(result) => Reply::Success(result.clone()),
        None => Reply::Success(envelope),
    }
}

fn is_truthy(id: &Value) -> bool {
    match id {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
