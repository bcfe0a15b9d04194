//! # AWS Docs MCP
//!
//! A Model Context Protocol (MCP) server for searching, reading and exploring
//! the public AWS documentation.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (search hits, recommendations, pages)
//! - [`sources`]: Upstream documentation services behind one trait
//! - [`content`]: HTML to Markdown conversion and pagination
//! - [`mcp`]: JSON-RPC dispatcher, tool registry and session tracking
//! - [`transport`]: stdio, SSE and Streamable-HTTP adapters
//! - [`utils`]: HTTP client and URL validation
//! - [`config`]: Configuration management

pub mod config;
pub mod content;
pub mod mcp;
pub mod models;
pub mod sources;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use mcp::{McpDispatcher, SessionManager, ToolRegistry};
pub use sources::{AwsDocsSource, DocumentationSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
