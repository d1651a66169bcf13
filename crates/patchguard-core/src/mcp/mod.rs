//! Model Context Protocol transport for the `scan_code` tool.
//!
//! Messages are newline-delimited JSON-RPC 2.0 over stdin/stdout:
//!
//! ```text
//! MCP client ──stdin──▶ McpServer ──▶ Scanner (ScanService)
//!            ◀─stdout──            ◀── ScanResult
//! ```

pub mod protocol;
mod server;

pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ProtocolError, ToolContent, ToolDefinition,
    ToolResult,
};
pub use server::{McpServer, SCAN_TOOL, SERVER_NAME};
