//! Scripted launcher, session and transport for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::catalog::RemoteTool;
use super::content::{ContentItem, RemoteCallResult};
use super::launch::LaunchConfig;
use super::session::{Established, Launcher, ProtocolSession};
use super::transport::Transport;
use crate::error::{BridgeError, BridgeResult, SessionError};

pub fn remote_tool(name: &str, description: &str) -> RemoteTool {
    RemoteTool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: Some(json!({
            "type": "object",
            "properties": {"element": {"type": "string"}},
            "required": ["element"]
        })),
    }
}

/// Shared, ordered log of teardown steps
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(events: &EventLog, event: &str) {
    events.lock().unwrap().push(event.to_string());
}

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Result {
        result: RemoteCallResult,
        delay: Duration,
        /// Fired inside the call, right before it returns
        cancel: Option<CancellationToken>,
    },
    Fail(SessionError),
}

impl ScriptedReply {
    pub fn text(text: &str) -> Self {
        Self::Result {
            result: RemoteCallResult {
                content: vec![ContentItem::text(text)],
                is_error: false,
            },
            delay: Duration::ZERO,
            cancel: None,
        }
    }

    pub fn error(text: &str) -> Self {
        Self::Result {
            result: RemoteCallResult {
                content: vec![ContentItem::text(text)],
                is_error: true,
            },
            delay: Duration::ZERO,
            cancel: None,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Result { result, cancel, .. } => Self::Result {
                result,
                delay: by,
                cancel,
            },
            other => other,
        }
    }

    pub fn cancelling(self, token: CancellationToken) -> Self {
        match self {
            Self::Result { result, delay, .. } => Self::Result {
                result,
                delay,
                cancel: Some(token),
            },
            other => other,
        }
    }
}

pub struct ScriptedSession {
    tools: Mutex<Vec<RemoteTool>>,
    list_failure: Mutex<Option<SessionError>>,
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<(String, JsonObject)>>,
    list_count: AtomicUsize,
    closed: CancellationToken,
    shutdown_fails: bool,
    events: EventLog,
}

impl ScriptedSession {
    pub fn new(tools: Vec<RemoteTool>) -> Self {
        Self {
            tools: Mutex::new(tools),
            list_failure: Mutex::new(None),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            list_count: AtomicUsize::new(0),
            closed: CancellationToken::new(),
            shutdown_fails: false,
            events: EventLog::default(),
        }
    }

    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_tools(&self, tools: Vec<RemoteTool>) {
        *self.tools.lock().unwrap() = tools;
    }

    pub fn set_list_failure(&self, failure: Option<SessionError>) {
        *self.list_failure.lock().unwrap() = failure;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<(String, JsonObject)> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl ProtocolSession for ScriptedSession {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, SessionError> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.list_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<RemoteCallResult, SessionError> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        if self.closed.is_cancelled() {
            return Err(SessionError::Disconnected);
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(RemoteCallResult {
                content: vec![ContentItem::text(format!("{} ok", name))],
                is_error: false,
            }),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Result {
                result,
                delay,
                cancel,
            }) => {
                if let Some(token) = cancel {
                    token.cancel();
                }
                if delay.is_zero() {
                    return Ok(result);
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(result),
                    _ = self.closed.cancelled() => Err(SessionError::Disconnected),
                }
            }
        }
    }

    async fn shutdown(&self) -> Result<(), SessionError> {
        record(&self.events, "session.shutdown");
        self.closed.cancel();
        if self.shutdown_fails {
            return Err(SessionError::Protocol("shutdown failed".to_string()));
        }
        Ok(())
    }
}

pub struct ScriptedTransport {
    alive: bool,
    fails: bool,
    events: EventLog,
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn id(&self) -> Option<u32> {
        self.alive.then_some(4242)
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        record(&self.events, "transport.terminate");
        self.alive = false;
        if self.fails {
            return Err(std::io::Error::other("kill failed"));
        }
        Ok(())
    }
}

/// Launcher that hands out scripted sessions and counts spawns
#[derive(Default)]
pub struct ScriptedLauncher {
    tools: Vec<RemoteTool>,
    replies: Vec<ScriptedReply>,
    launch_delay: Duration,
    launch_error: Option<BridgeError>,
    launch_panics: bool,
    discovery_error: Option<SessionError>,
    teardown_fails: bool,
    spawns: AtomicUsize,
    events: EventLog,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
    launched_with: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLauncher {
    pub fn new(tools: Vec<RemoteTool>) -> Self {
        Self {
            tools,
            ..Default::default()
        }
    }

    pub fn with_reply(mut self, reply: ScriptedReply) -> Self {
        self.replies.push(reply);
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn failing_launch(mut self, err: BridgeError) -> Self {
        self.launch_error = Some(err);
        self
    }

    pub fn panicking_launch(mut self) -> Self {
        self.launch_panics = true;
        self
    }

    pub fn failing_discovery(mut self, err: SessionError) -> Self {
        self.discovery_error = Some(err);
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.teardown_fails = true;
        self
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn session(&self, index: usize) -> Arc<ScriptedSession> {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn launched_with(&self) -> Vec<Vec<String>> {
        self.launched_with.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, config: &LaunchConfig) -> BridgeResult<Established> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.launched_with.lock().unwrap().push(config.args());

        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        if self.launch_panics {
            panic!("launcher crashed");
        }
        if let Some(err) = &self.launch_error {
            return Err(err.clone());
        }

        let mut session = ScriptedSession::new(self.tools.clone());
        session.shutdown_fails = self.teardown_fails;
        session.events = self.events.clone();
        session.set_list_failure(self.discovery_error.clone());
        for reply in &self.replies {
            session = session.with_reply(reply.clone());
        }

        let session = Arc::new(session);
        self.sessions.lock().unwrap().push(session.clone());

        Ok(Established {
            transport: Box::new(ScriptedTransport {
                alive: true,
                fails: self.teardown_fails,
                events: self.events.clone(),
            }),
            session,
        })
    }
}
