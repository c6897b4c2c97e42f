//! Per-session bridge between an agent session and a browser-automation MCP server
//!
//! Each session gets its own server process, spawned lazily on first use and
//! torn down on cleanup. Discovered tools are exposed as [`bridge::SessionTool`]s.

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;

pub use bridge::{build_bridge, cleanup, Bridge, BridgeTool, SessionContext, SessionTool};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
