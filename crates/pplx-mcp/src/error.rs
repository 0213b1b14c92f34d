//! Failures of the MCP stdio loop.
//!
//! Only [`McpError::Io`] ends [`McpServer::run`](crate::McpServer::run); the
//! others are answered with a JSON-RPC error and the loop continues.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    /// Bad framing: missing or invalid `Content-Length`, oversized or
    /// non-UTF-8 body, truncated headers.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The stdio streams failed.
    #[error("stdio error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = McpError::protocol("missing Content-Length header");
        assert_eq!(err.to_string(), "protocol error: missing Content-Length header");
    }

    #[test]
    fn test_conversions() {
        let json = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert!(matches!(McpError::from(json), McpError::Json(_)));

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed");
        let err = McpError::from(io);
        assert!(err.to_string().starts_with("stdio error"));
    }
}
