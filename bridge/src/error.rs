//! Error types for the bridge
//!
//! Connection-level failures (launch, handshake, discovery) are returned as
//! [`BridgeError`]. Per-call conditions never surface here; they are carried
//! by [`crate::mcp::ToolOutcome`] so the calling session can render them as
//! ordinary tool results.

use std::time::Duration;

/// Connection-level error
///
/// `Clone` so a single failed connect attempt can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// The MCP server process could not be started
    #[error("failed to launch MCP server: {0}")]
    Launch(String),

    /// The process started but the MCP initialize handshake failed
    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    /// Handshake succeeded but listing tools failed
    #[error("tool discovery failed: {0}")]
    Discovery(String),

    /// Spawn + handshake + discovery did not finish in time
    #[error("MCP server startup timed out after {0:?}")]
    StartupTimeout(Duration),

    /// A previous connect attempt was dropped before it settled
    #[error("a previous connection attempt was abandoned before completing")]
    Abandoned,

    /// The connection was closed and cannot be reused
    #[error("connection is closed")]
    Closed,
}

/// Result alias for connection-level operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error reported by a protocol session for a single request
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The underlying transport is gone; the session cannot serve more requests
    #[error("transport disconnected")]
    Disconnected,

    /// Any other protocol or remote error
    #[error("{0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_messages() {
        let err = BridgeError::Discovery("boom".to_string());
        assert_eq!(err.to_string(), "tool discovery failed: boom");

        let err = BridgeError::StartupTimeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_session_error_protocol_is_transparent() {
        let err = SessionError::Protocol("method not found".to_string());
        assert_eq!(err.to_string(), "method not found");
    }
}
