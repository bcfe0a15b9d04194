//! MCP (Model Context Protocol) implementation.
//!
//! - [`protocol`]: JSON-RPC 2.0 envelope types and error codes
//! - [`McpDispatcher`]: method routing shared by every transport
//! - [`ToolRegistry`]: the documentation tools and their schemas
//! - [`SessionManager`]: session tracking for the streaming transports

mod dispatcher;
mod handlers;
pub mod protocol;
mod schema;
mod session;
mod tools;

pub use dispatcher::{McpDispatcher, SERVER_NAME};
pub use handlers::{ReadDocumentationHandler, RecommendHandler, SearchDocumentationHandler};
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use session::{
    Clock, ManualClock, Session, SessionError, SessionManager, SystemClock, TransportKind,
    DEFAULT_INACTIVITY_TIMEOUT,
};
pub use tools::{Tool, ToolCallResult, ToolContent, ToolError, ToolHandler, ToolRegistry, ToolSettings};
