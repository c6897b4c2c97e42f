//! MCP (Model Context Protocol) client side of the bridge
//!
//! Spawns one MCP server process per [`Connection`], discovers its tools and
//! dispatches calls to it.

mod catalog;
mod connection;
mod content;
mod dispatch;
mod launch;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{empty_object_schema, Catalog, RemoteTool, ToolDescriptor};
pub use connection::{Connection, ConnectionOptions, ConnectionState};
pub use content::{
    normalize, ContentItem, RemoteCallResult, ToolFailure, ToolOutcome, ToolOutput,
    EMPTY_ERROR_DETAIL, EMPTY_SUCCESS_MESSAGE,
};
pub use dispatch::dispatch;
pub use launch::LaunchConfig;
pub use session::{Established, Launcher, ProtocolSession, RmcpLauncher, RmcpSession};
pub use transport::{ChildTransport, Transport, SERVER_STDERR_TARGET};

pub use rmcp::model::JsonObject;
