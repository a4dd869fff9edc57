//! `bk-domain`: shared configuration and error types for BlueKit.
//!
//! Kept free of any I/O runtime so that both the MCP client and the
//! command-line layer can depend on it.

pub mod config;
pub mod error;

pub use error::{Error, Result};
