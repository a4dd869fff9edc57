mod loader;
mod mcp;
mod session;

pub use loader::*;
pub use mcp::*;
pub use session::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Contents of a `bluekit.config.json` / `~/.bluekit/config.json` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BlueKitConfig {
    /// How to spawn the BlueKit MCP server (process transport).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<ProcessConfig>,
    /// Where the editor bridge socket lives (socket transport).
    #[serde(default)]
    pub socket: SocketConfig,
    /// Timeouts for a single MCP session.
    #[serde(default)]
    pub session: SessionConfig,
}
