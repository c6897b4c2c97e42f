//! Bridge factory
//!
//! Turns one session's private [`Connection`] into a set of invocable tools.
//! The returned [`Bridge`] is the only way to reach those tools: nothing
//! here registers them anywhere else, so tools discovered for one session
//! can never be called from another.

mod tool;

pub use tool::{ApprovalPolicy, BridgeTool, SessionTool};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::mcp::Connection;

/// What the calling session hands to the factory
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Used in logs only
    pub session_id: String,
    /// Cancels in-flight calls of every tool in the bridge
    pub cancel: CancellationToken,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The tools of one session plus the connection behind them
pub struct Bridge {
    session_id: String,
    connection: Arc<Connection>,
    tools: Vec<Arc<BridgeTool>>,
}

/// Connect, discover, and wrap every discovered tool for one session
pub async fn build_bridge(connection: Arc<Connection>, ctx: &SessionContext) -> BridgeResult<Bridge> {
    connection.ensure_connection().await?;
    let catalog = connection.list_tools().await?;

    let tools: Vec<Arc<BridgeTool>> = catalog
        .tools()
        .iter()
        .map(|descriptor| {
            Arc::new(BridgeTool::new(
                descriptor.clone(),
                connection.clone(),
                ctx.cancel.clone(),
                ctx.session_id.clone(),
            ))
        })
        .collect();

    tracing::info!(
        session = %ctx.session_id,
        connection = connection.id(),
        "Bridge ready with {} tools",
        tools.len()
    );

    Ok(Bridge {
        session_id: ctx.session_id.clone(),
        connection,
        tools,
    })
}

/// Close a bridge's connection; never fails and may be called repeatedly
pub async fn cleanup(connection: &Connection) {
    connection.close().await;
    tracing::debug!(connection = connection.id(), "Bridge connection cleaned up");
}

impl Bridge {
    /// Create a fresh connection from config and build a bridge on it
    pub async fn connect(config: &BridgeConfig, ctx: &SessionContext) -> BridgeResult<Self> {
        let connection = Arc::new(Connection::from_config(config));
        build_bridge(connection, ctx).await
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn tools(&self) -> &[Arc<BridgeTool>] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<BridgeTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// The tools as trait objects, ready for the session's tool list
    pub fn session_tools(&self) -> Vec<Arc<dyn SessionTool>> {
        self.tools
            .iter()
            .map(|t| t.clone() as Arc<dyn SessionTool>)
            .collect()
    }

    /// Tear down the connection; the tools stop working afterwards
    pub async fn cleanup(&self) {
        cleanup(&self.connection).await;
    }
}
