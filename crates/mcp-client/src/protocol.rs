//! JSON-RPC 2.0 types for the MCP protocol.
//!
//! Each message is a single line of JSON (newline-delimited).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name announced in `initialize`.
pub const CLIENT_NAME: &str = "bluekit-cli";

/// The `initialize` request always uses this id.
pub const INITIALIZE_ID: u64 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 request. It carries an `id`, so a reply is expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }

    /// The handshake request. Identity is fixed, never negotiated.
    pub fn initialize() -> Self {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        Self::new(INITIALIZE_ID, "initialize", Some(params))
    }

    /// A `tools/call` request. `name` and `arguments` are passed through verbatim.
    pub fn tool_call(id: u64, name: &str, arguments: Value) -> Self {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        Self::new(id, "tools/call", Some(params))
    }

    /// Serialize as one wire frame, newline included.
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut frame = serde_json::to_vec(self)?;
        frame.push(b'\n');
        Ok(frame)
    }
}

static LAST_CALL_ID: AtomicU64 = AtomicU64::new(INITIALIZE_ID);

/// Pick an id for a `tools/call` request.
///
/// Ids are wall-clock milliseconds, bumped when two calls land in the same
/// millisecond. Always greater than [`INITIALIZE_ID`].
pub fn next_call_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let step = |prev: u64| now.max(prev + 1);
    match LAST_CALL_ID.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| Some(step(prev))) {
        Ok(prev) | Err(prev) => step(prev),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 error object.
///
/// Servers in the wild omit `code` and sometimes `message`, so both are lenient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Read an `error` member, accepting a bare string as the message.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self {
                code: None,
                message: s.clone(),
                data: None,
            },
            other => serde_json::from_value(other.clone()).unwrap_or(Self {
                code: None,
                message: String::new(),
                data: Some(other.clone()),
            }),
        }
    }

    /// The message, or `"Unknown error"` when the server sent none.
    pub fn message_or_default(&self) -> &str {
        if self.message.is_empty() {
            "Unknown error"
        } else {
            &self.message
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "JSON-RPC error {code}: {}", self.message_or_default()),
            None => write!(f, "JSON-RPC error: {}", self.message_or_default()),
        }
    }
}

impl std::error::Error for JsonRpcError {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One typed item of a content array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    /// Images, resources and anything else, kept verbatim.
    Other(Value),
}

impl ContentItem {
    fn from_value(value: Value) -> Self {
        if value.get("type").and_then(Value::as_str) == Some("text") {
            if let Some(text) = value.get("text").and_then(Value::as_str) {
                return Self::Text(text.to_owned());
            }
        }
        Self::Other(value)
    }
}

/// The shapes a BlueKit tool result comes in.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A bare string.
    Text(String),
    /// `{ "message": ..., "data": ... }`. `raw` is the whole result,
    /// extra keys included.
    Message {
        message: String,
        data: Option<Value>,
        raw: Value,
    },
    /// A content array, bare or wrapped as `{ "content": [...], "isError": ... }`.
    Content {
        items: Vec<ContentItem>,
        is_error: bool,
        raw: Value,
    },
    /// Anything else.
    Raw(Value),
}

impl ToolOutput {
    pub fn from_value(value: Value) -> Self {
        let items = match &value {
            Value::String(text) => return Self::Text(text.clone()),
            Value::Array(items) => Some((items, false)),
            Value::Object(map) => match map.get("content") {
                Some(Value::Array(items)) => {
                    Some((items, map.get("isError").and_then(Value::as_bool).unwrap_or(false)))
                }
                _ => None,
            },
            _ => None,
        };
        if let Some((items, is_error)) = items {
            let items = items.iter().cloned().map(ContentItem::from_value).collect();
            return Self::Content {
                items,
                is_error,
                raw: value,
            };
        }

        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return Self::Message {
                message: message.to_owned(),
                data: value.get("data").filter(|d| !d.is_null()).cloned(),
                raw: value,
            };
        }
        Self::Raw(value)
    }

    /// Text items of a content result joined by newlines, if there are any.
    pub fn text_items(&self) -> Option<String> {
        let Self::Content { items, .. } = self else {
            return None;
        };
        let texts: Vec<&str> = items
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                ContentItem::Other(_) => None,
            })
            .collect();
        (!texts.is_empty()).then(|| texts.join("\n"))
    }

    /// The result exactly as the tool returned it.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Message { raw, .. } | Self::Content { raw, .. } | Self::Raw(raw) => raw.clone(),
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_initialize_request() {
        let req = JsonRpcRequest::initialize();
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.starts_with(r#"{"jsonrpc":"2.0","id":1,"method":"initialize""#));
        let params = req.params.unwrap();
        assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(params["capabilities"], json!({}));
        assert_eq!(params["clientInfo"]["name"], CLIENT_NAME);
    }

    #[test]
    fn serialize_tool_call_request() {
        let req = JsonRpcRequest::tool_call(42, "bluekit.ping", json!({ "verbose": true }));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""method":"tools/call""#));
        assert!(json.contains(r#""name":"bluekit.ping""#));
        assert!(json.contains(r#""arguments":{"verbose":true}"#));
    }

    #[test]
    fn serialize_request_without_params() {
        let req = JsonRpcRequest::new(2, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn frame_is_single_line() {
        let frame = JsonRpcRequest::tool_call(7, "a/b", json!({ "text": "two\nlines" }))
            .to_frame()
            .unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn call_ids_are_unique_and_never_the_handshake_id() {
        let a = next_call_id();
        let b = next_call_id();
        assert!(a > INITIALIZE_ID);
        assert!(b > a);
    }

    #[test]
    fn error_without_code_or_message() {
        let err = JsonRpcError::from_value(&json!({}));
        assert_eq!(err.code, None);
        assert_eq!(err.message_or_default(), "Unknown error");
    }

    #[test]
    fn error_as_bare_string() {
        let err = JsonRpcError::from_value(&json!("boom"));
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn jsonrpc_error_display() {
        let err = JsonRpcError {
            code: Some(-32601),
            message: "Method not found".into(),
            data: None,
        };
        assert_eq!(format!("{err}"), "JSON-RPC error -32601: Method not found");
    }

    #[test]
    fn output_bare_text() {
        assert_eq!(ToolOutput::from_value(json!("pong")), ToolOutput::Text("pong".into()));
    }

    #[test]
    fn output_message_with_data() {
        let out = ToolOutput::from_value(json!({ "message": "ok", "data": { "kits": 3 } }));
        let ToolOutput::Message { message, data, .. } = &out else {
            panic!("expected message, got {out:?}");
        };
        assert_eq!(message, "ok");
        assert_eq!(data, &Some(json!({ "kits": 3 })));
    }

    #[test]
    fn output_message_null_data_is_none() {
        let out = ToolOutput::from_value(json!({ "message": "ok", "data": null }));
        assert!(matches!(out, ToolOutput::Message { data: None, .. }));
    }

    #[test]
    fn output_content_items() {
        let out = ToolOutput::from_value(json!({
            "content": [
                { "type": "text", "text": "first" },
                { "type": "image", "data": "AAAA", "mimeType": "image/png" },
                { "type": "text", "text": "second" }
            ],
            "isError": true
        }));
        let ToolOutput::Content { items, is_error, .. } = &out else {
            panic!("expected content, got {out:?}");
        };
        assert!(is_error);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[1], ContentItem::Other(_)));
        assert_eq!(out.text_items().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn output_bare_content_array() {
        let out = ToolOutput::from_value(json!([{ "type": "text", "text": "hi" }]));
        assert_eq!(out.text_items().as_deref(), Some("hi"));
    }

    #[test]
    fn output_content_takes_precedence_over_message() {
        let out = ToolOutput::from_value(json!({
            "message": "ignored",
            "content": []
        }));
        assert!(matches!(out, ToolOutput::Content { .. }));
        assert_eq!(out.text_items(), None);
    }

    #[test]
    fn output_other_shapes_are_raw() {
        let out = ToolOutput::from_value(json!({ "status": "done" }));
        assert_eq!(out, ToolOutput::Raw(json!({ "status": "done" })));
        assert_eq!(ToolOutput::from_value(json!(3)), ToolOutput::Raw(json!(3)));
    }

    #[test]
    fn roundtrip_request() {
        let req = JsonRpcRequest::tool_call(42, "bluekit.magic", json!({ "directory": "/tmp" }));
        let json = serde_json::to_string(&req).unwrap();
        let parsed: JsonRpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, parsed);
    }

    #[test]
    fn output_back_to_json() {
        let value = json!({
            "content": [{ "type": "text", "text": "hi" }, { "type": "image", "data": "AA" }],
            "isError": false
        });
        assert_eq!(ToolOutput::from_value(value.clone()).to_value(), value);

        let bare = json!([{ "type": "text", "text": "hi" }]);
        assert_eq!(ToolOutput::from_value(bare.clone()).to_value(), bare);
    }

    #[test]
    fn output_keeps_keys_it_does_not_model() {
        let message = json!({ "message": "created", "path": "/tmp/.magic.md", "count": 3, "data": null });
        let out = ToolOutput::from_value(message.clone());
        assert!(matches!(out, ToolOutput::Message { data: None, .. }));
        assert_eq!(out.to_value(), message);

        let content = json!({
            "content": [{ "type": "text", "text": "done" }],
            "structuredContent": { "files": 2 }
        });
        let out = ToolOutput::from_value(content.clone());
        assert!(matches!(out, ToolOutput::Content { is_error: false, .. }));
        assert_eq!(out.to_value(), content);
    }
}
