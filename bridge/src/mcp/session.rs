//! Protocol-client session
//!
//! [`ProtocolSession`] is the request/response layer over a transport.
//! [`Launcher`] produces a transport plus the session bound to it; the
//! production launcher spawns the configured server and speaks MCP through
//! `rmcp`.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequest, CallToolRequestParam, CallToolResult, ClientRequest, Content,
        CustomResult, JsonObject, ListToolsRequest, PaginatedRequestParam, RawContent,
        ServerResult, Tool,
    },
    service::{Peer, RunningService, ServiceError},
    RoleClient, ServiceExt,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use super::catalog::RemoteTool;
use super::content::{ContentItem, RemoteCallResult};
use super::launch::LaunchConfig;
use super::transport::{ChildTransport, Transport};
use crate::error::{BridgeError, BridgeResult, SessionError};

/// Request/response layer over one transport
///
/// Methods take `&self` so that any number of calls can be in flight at once.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// List every tool the server exposes
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, SessionError>;

    /// Call one tool. Arguments are forwarded without validation.
    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<RemoteCallResult, SessionError>;

    /// Close the session. Calling it again is a no-op.
    async fn shutdown(&self) -> Result<(), SessionError>;
}

/// A started server: the process handle and the session speaking to it
pub struct Established {
    pub transport: Box<dyn Transport>,
    pub session: Arc<dyn ProtocolSession>,
}

/// Starts a server and completes the protocol handshake
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, config: &LaunchConfig) -> BridgeResult<Established>;
}

// =============================================================================
// rmcp implementation
// =============================================================================

/// MCP client session backed by `rmcp`
pub struct RmcpSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl RmcpSession {
    /// Run the MCP initialize handshake over a reader/writer pair
    pub async fn handshake<R, W>(reader: R, writer: W) -> BridgeResult<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let service = ()
            .serve((reader, writer))
            .await
            .map_err(|e| BridgeError::Handshake(e.to_string()))?;

        Ok(Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        })
    }
}

#[async_trait]
impl ProtocolSession for RmcpSession {
    /// Follows `nextCursor` until the server stops paginating
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, SessionError> {
        let mut tools = Vec::new();
        let mut cursor = None;

        loop {
            let result = self
                .peer
                .send_request(ClientRequest::ListToolsRequest(ListToolsRequest {
                    method: Default::default(),
                    params: Some(PaginatedRequestParam { cursor }),
                    extensions: Default::default(),
                }))
                .await
                .map_err(session_error)?;

            let page = tool_page(result)?;
            tools.extend(page.tools);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<RemoteCallResult, SessionError> {
        let result = self
            .peer
            .send_request(ClientRequest::CallToolRequest(CallToolRequest {
                method: Default::default(),
                params: CallToolRequestParam {
                    name: name.to_string().into(),
                    arguments: Some(arguments),
                    task: None,
                },
                extensions: Default::default(),
            }))
            .await
            .map_err(session_error)?;

        call_result(result)
    }

    async fn shutdown(&self) -> Result<(), SessionError> {
        let service = self.service.lock().await.take();
        if let Some(service) = service {
            let reason = service
                .cancel()
                .await
                .map_err(|e| SessionError::Protocol(format!("session task failed: {}", e)))?;
            tracing::debug!("MCP session closed: {:?}", reason);
        }
        Ok(())
    }
}

fn session_error(err: ServiceError) -> SessionError {
    match err {
        ServiceError::TransportClosed | ServiceError::TransportSend(_) => SessionError::Disconnected,
        other => SessionError::Protocol(other.to_string()),
    }
}

// =============================================================================
// Wire shapes
//
// rmcp's typed results are stricter than what servers send: `Tool` requires
// `inputSchema` and `CallToolResult` requires content. Replies that miss
// those land in `CustomResult` (or `EmptyResult` for `{}`) and are read here.
// =============================================================================

struct ToolPage {
    tools: Vec<RemoteTool>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireToolPage {
    tools: Vec<WireTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCallResult {
    #[serde(default)]
    content: Option<Vec<Value>>,
    #[serde(default)]
    is_error: Option<bool>,
}

fn tool_page(result: ServerResult) -> Result<ToolPage, SessionError> {
    match result {
        ServerResult::ListToolsResult(list) => Ok(ToolPage {
            tools: list.tools.into_iter().map(remote_tool).collect(),
            next_cursor: list.next_cursor,
        }),
        ServerResult::CustomResult(CustomResult(value)) => {
            let page: WireToolPage = serde_json::from_value(value)
                .map_err(|e| SessionError::Protocol(format!("malformed tools/list result: {}", e)))?;
            Ok(ToolPage {
                tools: page
                    .tools
                    .into_iter()
                    .map(|tool| RemoteTool {
                        name: tool.name,
                        description: tool.description,
                        input_schema: tool.input_schema,
                    })
                    .collect(),
                next_cursor: page.next_cursor,
            })
        }
        _ => Err(SessionError::Protocol("unexpected response to tools/list".to_string())),
    }
}

fn call_result(result: ServerResult) -> Result<RemoteCallResult, SessionError> {
    match result {
        ServerResult::CallToolResult(result) => Ok(typed_call_result(result)),
        ServerResult::EmptyResult(_) => Ok(RemoteCallResult::default()),
        ServerResult::CustomResult(CustomResult(value)) => {
            let wire: WireCallResult = serde_json::from_value(value)
                .map_err(|e| SessionError::Protocol(format!("malformed tools/call result: {}", e)))?;
            Ok(RemoteCallResult {
                content: wire
                    .content
                    .unwrap_or_default()
                    .into_iter()
                    .map(wire_content)
                    .collect(),
                is_error: wire.is_error.unwrap_or(false),
            })
        }
        _ => Err(SessionError::Protocol("unexpected response to tools/call".to_string())),
    }
}

fn typed_call_result(result: CallToolResult) -> RemoteCallResult {
    RemoteCallResult {
        content: result.content.into_iter().map(content_item).collect(),
        is_error: result.is_error.unwrap_or(false),
    }
}

fn remote_tool(tool: Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: Some(Value::Object(tool.input_schema.as_ref().clone())),
    }
}

fn content_item(content: Content) -> ContentItem {
    match content.raw {
        RawContent::Text(text) => ContentItem::text(text.text.to_string()),
        RawContent::Image(image) => {
            ContentItem::image(image.data.to_string(), image.mime_type.to_string())
        }
        other => ContentItem::Other {
            kind: content_kind(&serde_json::to_value(&other).unwrap_or(Value::Null)),
        },
    }
}

fn wire_content(value: Value) -> ContentItem {
    match serde_json::from_value::<Content>(value.clone()) {
        Ok(content) => content_item(content),
        Err(_) => ContentItem::Other {
            kind: content_kind(&value),
        },
    }
}

fn content_kind(value: &Value) -> String {
    value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Launches the configured server as a child process and speaks MCP over its stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpLauncher;

#[async_trait]
impl Launcher for RmcpLauncher {
    async fn launch(&self, config: &LaunchConfig) -> BridgeResult<Established> {
        config
            .validate()
            .map_err(|e| BridgeError::Launch(e.to_string()))?;

        let (mut transport, stdout, stdin) = ChildTransport::spawn(config)?;

        match RmcpSession::handshake(stdout, stdin).await {
            Ok(session) => Ok(Established {
                transport: Box::new(transport),
                session: Arc::new(session),
            }),
            Err(e) => {
                if let Err(te) = transport.terminate().await {
                    tracing::warn!("Failed to terminate MCP server after handshake error: {}", te);
                }
                Err(e)
            }
        }
    }
}
