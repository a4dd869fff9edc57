//! Endpoint descriptors for the two MCP transports.
//!
//! These are plain data: the MCP client opens whatever it is handed and
//! never performs discovery itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How to spawn a stdio MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Executable name or absolute path (e.g. `"node"`).
    pub command: String,

    /// Arguments passed to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child; inherits ours when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables for the child.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            env: HashMap::new(),
        }
    }
}

/// Location of the editor bridge's Unix socket.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SocketConfig {
    /// Overrides the default `~/.cursor/mcp/bridge.sock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SocketConfig {
    /// The configured path, or the well-known bridge path under `home`.
    pub fn resolve(&self, home: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_socket_path(home))
    }
}

/// `~/.cursor/mcp/bridge.sock`
pub fn default_socket_path(home: &Path) -> PathBuf {
    home.join(".cursor").join("mcp").join("bridge.sock")
}

/// A resolved transport target, handed to the MCP client as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Spawn a child process and speak over its stdin/stdout.
    Process(ProcessConfig),
    /// Connect to a listening Unix domain socket.
    Socket(PathBuf),
}

impl Endpoint {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::Process(_) => "process",
            Endpoint::Socket(_) => "socket",
        }
    }
}
