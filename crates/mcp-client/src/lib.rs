//! `bk-mcp-client`: single-call MCP (Model Context Protocol) sessions for BlueKit.
//!
//! This crate provides:
//! - Line-delimited JSON-RPC 2.0 request and reply types.
//! - A transport over a spawned server's stdio or a Unix domain socket.
//! - A sans-IO session that performs the `initialize` handshake and exactly
//!   one `tools/call`, plus the driver that runs it under a deadline.
//! - An escalating shutdown (close input, SIGTERM, SIGKILL) for the server.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bk_mcp_client::{ClientOptions, McpClient, ToolOutput};
//!
//! let client = McpClient::new(endpoint, ClientOptions::default());
//! match client.call("bluekit", "ping", json!({})).await? {
//!     ToolOutput::Text(text) => println!("{text}"),
//!     other => println!("{}", other.text_items().unwrap_or_default()),
//! }
//! ```

pub mod client;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod router;
pub mod session;
pub mod shutdown;
pub mod transport;

// Re-exports for convenience.
pub use client::{wait_detached_shutdowns, ClientOptions, McpClient};
pub use error::McpError;
pub use protocol::{ContentItem, ToolOutput};
pub use shutdown::{ShutdownPolicy, ShutdownState};
