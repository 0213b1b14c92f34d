//! MCP (Model Context Protocol) server for pplx.
//!
//! Exposes a single tool, `perplexity_query`, to MCP clients over stdio. The
//! tool runs the same validate, compile, dispatch and format pipeline as the
//! `pplx query` command.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpServer                                                  │
//! │  - initialize, ping, tools/list, tools/call                 │
//! │  - tool arguments layered over configured defaults          │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  framing                                                    │
//! │  - JSON-RPC 2.0, newline-delimited or Content-Length        │
//! │  - replies mirror the framing of each request               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pplx_mcp::McpServer;
//!
//! let server = McpServer::new(Arc::new(client)).with_defaults(config.defaults);
//! server.run(tokio::io::stdin(), tokio::io::stdout()).await?;
//! ```

pub mod error;
pub mod framing;
pub mod protocol;
pub mod server;
pub mod tool;

pub use error::{McpError, Result};
pub use framing::{Frame, Framing, read_frame, write_frame};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, MCP_PROTOCOL_VERSION, ServerCapabilities,
    ServerInfo, ToolContent, ToolInfo, ToolsCapability,
};
pub use server::McpServer;
pub use tool::{QueryArguments, TOOL_NAME, tool_info};
