use serde_json::Value;

/// Why an MCP call failed. `Display` is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP connection error: {0}")]
    Connect(#[source] std::io::Error),

    #[error("Failed to spawn MCP server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("MCP transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("failed to encode MCP request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Initialize failed: {0}")]
    Initialize(String),

    #[error("MCP error: {message}")]
    Call {
        message: String,
        code: Option<i64>,
        data: Option<Value>,
    },

    #[error("MCP request timeout")]
    Timeout,

    #[error("Invalid MCP response")]
    InvalidResponse,

    #[error("MCP connection closed unexpectedly")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_messages() {
        assert_eq!(
            McpError::Initialize("bad version".into()).to_string(),
            "Initialize failed: bad version"
        );
        assert_eq!(
            McpError::Call {
                message: "tool exploded".into(),
                code: Some(-32000),
                data: None,
            }
            .to_string(),
            "MCP error: tool exploded"
        );
        assert_eq!(McpError::Timeout.to_string(), "MCP request timeout");
        assert_eq!(McpError::InvalidResponse.to_string(), "Invalid MCP response");
        assert_eq!(
            McpError::ConnectionClosed.to_string(),
            "MCP connection closed unexpectedly"
        );
    }

    #[test]
    fn io_failures_keep_their_source() {
        let err = McpError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert_eq!(err.to_string(), "Failed to spawn MCP server: no such file");
        assert!(std::error::Error::source(&err).is_some());
    }
}
