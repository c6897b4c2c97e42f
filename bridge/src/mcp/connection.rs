//! MCP Connection Manager
//!
//! Owns exactly one transport and one protocol session. The lifecycle is
//! `Unconnected -> Connecting -> Connected -> Closed`; a closed connection
//! is never reused; callers that want to retry build a new one.
//!
//! The first caller to need the server starts a single connect task; every
//! caller, that one included, then waits for the task to settle the state.
//! At most one subprocess is ever spawned per connection, and a caller that
//! stops waiting does not stop the startup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rmcp::model::JsonObject;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::catalog::Catalog;
use super::content::{ToolFailure, ToolOutcome};
use super::dispatch::{dispatch, is_cancelled};
use super::launch::LaunchConfig;
use super::session::{Established, Launcher, ProtocolSession, RmcpLauncher};
use super::transport::Transport;
use crate::config::{BridgeConfig, TimeoutConfig};
use crate::error::{BridgeError, BridgeResult};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

/// Timeouts applied by a connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub startup_timeout: Duration,
    pub call_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        TimeoutConfig::default().into()
    }
}

impl From<TimeoutConfig> for ConnectionOptions {
    fn from(timeouts: TimeoutConfig) -> Self {
        Self {
            startup_timeout: timeouts.startup(),
            call_timeout: timeouts.call(),
            shutdown_timeout: timeouts.shutdown(),
        }
    }
}

/// Resources held while connected
struct Live {
    session: Arc<dyn ProtocolSession>,
    transport: Box<dyn Transport>,
    catalog: Arc<Catalog>,
}

impl Live {
    fn handles(&self) -> (Arc<dyn ProtocolSession>, Arc<Catalog>) {
        (self.session.clone(), self.catalog.clone())
    }
}

enum State {
    Unconnected,
    Connecting,
    Connected(Live),
    /// Carries the failure that closed the connection, if any
    Closed(Option<BridgeError>),
}

/// State shared with the connect task
struct Shared {
    id: u64,
    state: Mutex<State>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Call with the state lock held so watchers never run ahead of the state
    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        tracing::debug!(connection = self.id, "Connection state: {:?}", state);
    }

    /// Record the result of the connect task
    async fn settle(&self, result: BridgeResult<Live>, shutdown_timeout: Duration) {
        let mut state = self.state.lock().await;

        if !matches!(*state, State::Connecting) {
            // Closed while starting up; the new server has no owner
            if let Ok(mut live) = result {
                tracing::info!(connection = self.id, "Connection closed during startup, stopping MCP server");
                teardown(self.id, live.session.as_ref(), live.transport.as_mut(), shutdown_timeout).await;
            }
            return;
        }

        match result {
            Ok(live) => {
                tracing::info!(
                    connection = self.id,
                    pid = ?live.transport.id(),
                    "MCP server connected: {} tools discovered",
                    live.catalog.len()
                );
                *state = State::Connected(live);
                self.publish(ConnectionState::Connected);
            }
            Err(e) => {
                tracing::warn!(connection = self.id, "MCP connection failed: {}", e);
                *state = State::Closed(Some(e));
                self.publish(ConnectionState::Closed);
            }
        }
    }
}

/// One MCP server subprocess and its session
pub struct Connection {
    shared: Arc<Shared>,
    launch: LaunchConfig,
    options: ConnectionOptions,
    launcher: Arc<dyn Launcher>,
}

impl Connection {
    /// Create an unconnected connection; nothing is spawned yet
    pub fn new(
        launch: LaunchConfig,
        options: ConnectionOptions,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Unconnected);
        Self {
            shared: Arc::new(Shared {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(State::Unconnected),
                state_tx,
            }),
            launch,
            options,
            launcher,
        }
    }

    /// Create a connection that spawns the configured server through rmcp
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.server.clone(),
            config.timeouts.clone().into(),
            Arc::new(RmcpLauncher),
        )
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Receive state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Connect, handshake and discover tools unless already connected
    pub async fn ensure_connection(&self) -> BridgeResult<()> {
        self.connected().await.map(|_| ())
    }

    /// The current catalog, connecting first if needed
    pub async fn list_tools(&self) -> BridgeResult<Arc<Catalog>> {
        self.connected().await.map(|(_, catalog)| catalog)
    }

    async fn connected(&self) -> BridgeResult<(Arc<dyn ProtocolSession>, Arc<Catalog>)> {
        let mut updates = self.shared.state_tx.subscribe();

        {
            let mut state = self.shared.state.lock().await;
            match &*state {
                State::Connected(live) => return Ok(live.handles()),
                State::Closed(cause) => return Err(cause.clone().unwrap_or(BridgeError::Closed)),
                State::Connecting | State::Unconnected => {}
            }

            if matches!(*state, State::Unconnected) {
                *state = State::Connecting;
                self.shared.publish(ConnectionState::Connecting);
                self.spawn_connect();
            }
        }

        if updates
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .is_err()
        {
            return Err(BridgeError::Closed);
        }

        let state = self.shared.state.lock().await;
        match &*state {
            State::Connected(live) => Ok(live.handles()),
            State::Closed(cause) => Err(cause.clone().unwrap_or(BridgeError::Closed)),
            State::Unconnected | State::Connecting => Err(BridgeError::Closed),
        }
    }

    /// Run launch + handshake + discovery in its own task
    fn spawn_connect(&self) {
        let shared = self.shared.clone();
        let launcher = self.launcher.clone();
        let launch = self.launch.clone();
        let options = self.options;

        tokio::spawn(async move {
            let attempt = tokio::spawn(establish(shared.id, launcher, launch, options));
            let result = match attempt.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(connection = shared.id, "Connection attempt did not complete: {}", e);
                    Err(BridgeError::Abandoned)
                }
            };
            shared.settle(result, options.shutdown_timeout).await;
        });
    }

    /// Re-run discovery and swap the catalog in one step
    ///
    /// On failure the previous catalog stays in place.
    pub async fn refresh_tools(&self) -> BridgeResult<Arc<Catalog>> {
        let (session, _) = self.connected().await?;

        let tools = session
            .list_tools()
            .await
            .map_err(|e| BridgeError::Discovery(e.to_string()))?;
        let catalog = Arc::new(Catalog::from_remote(tools));

        let mut state = self.shared.state.lock().await;
        match &mut *state {
            // Only swap if this is still the session we listed from
            State::Connected(live) if Arc::ptr_eq(&live.session, &session) => {
                live.catalog = catalog.clone();
                tracing::info!(connection = self.shared.id, "Tool catalog refreshed: {} tools", catalog.len());
                Ok(catalog)
            }
            _ => Err(BridgeError::Closed),
        }
    }

    /// Call a tool, connecting first if needed
    ///
    /// `Err` only when the connection cannot be established; every per-call
    /// condition is reported through the returned [`ToolOutcome`]. The token
    /// also cuts short the wait for a connection that is still starting.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<ToolOutcome> {
        if is_cancelled(cancel) {
            return Ok(ToolOutcome::Cancelled);
        }

        let (session, _) = match cancel {
            Some(token) => tokio::select! {
                biased;
                connected = self.connected() => connected?,
                _ = token.cancelled() => {
                    tracing::debug!(connection = self.shared.id, tool = name, "Call cancelled while connecting");
                    return Ok(ToolOutcome::Cancelled);
                }
            },
            None => self.connected().await?,
        };

        tracing::debug!(connection = self.shared.id, tool = name, "Calling tool");
        let outcome = dispatch(
            session.as_ref(),
            name,
            arguments,
            cancel,
            self.options.call_timeout,
        )
        .await;

        if matches!(outcome, ToolOutcome::Failure(ToolFailure::Disconnected(_))) {
            self.close_disconnected(&session).await;
        }

        Ok(outcome)
    }

    /// Close after the transport dropped out from under a call
    async fn close_disconnected(&self, session: &Arc<dyn ProtocolSession>) {
        let mut state = self.shared.state.lock().await;
        let is_current = matches!(&*state, State::Connected(live) if Arc::ptr_eq(&live.session, session));
        if !is_current {
            return;
        }

        tracing::warn!(connection = self.shared.id, "MCP server disconnected, closing connection");
        if let State::Connected(mut live) = std::mem::replace(&mut *state, State::Closed(None)) {
            teardown(self.shared.id, live.session.as_ref(), live.transport.as_mut(), self.options.shutdown_timeout)
                .await;
        }
        self.shared.publish(ConnectionState::Closed);
    }

    /// Shut down the session, then the transport
    ///
    /// Best-effort and idempotent: step failures are logged, and the
    /// connection always ends up Closed with its catalog cleared. Closing
    /// while the server is still starting returns at once; the connect task
    /// stops the server when startup settles.
    pub async fn close(&self) {
        let mut state = self.shared.state.lock().await;

        match std::mem::replace(&mut *state, State::Closed(None)) {
            State::Connected(mut live) => {
                tracing::info!(connection = self.shared.id, "Closing MCP connection");
                teardown(self.shared.id, live.session.as_ref(), live.transport.as_mut(), self.options.shutdown_timeout)
                    .await;
            }
            State::Closed(cause) => {
                // Keep the original failure for later callers
                *state = State::Closed(cause);
                return;
            }
            State::Connecting => {
                tracing::info!(connection = self.shared.id, "Closing MCP connection during startup");
            }
            State::Unconnected => {}
        }

        self.shared.publish(ConnectionState::Closed);
    }
}

/// Launch + handshake + initial discovery, bounded by the startup timeout
async fn establish(
    id: u64,
    launcher: Arc<dyn Launcher>,
    launch: LaunchConfig,
    options: ConnectionOptions,
) -> BridgeResult<Live> {
    let startup = launch_and_discover(id, launcher.as_ref(), &launch, options.shutdown_timeout);
    match tokio::time::timeout(options.startup_timeout, startup).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::StartupTimeout(options.startup_timeout)),
    }
}

async fn launch_and_discover(
    id: u64,
    launcher: &dyn Launcher,
    launch: &LaunchConfig,
    shutdown_timeout: Duration,
) -> BridgeResult<Live> {
    let Established {
        mut transport,
        session,
    } = launcher.launch(launch).await?;

    match session.list_tools().await {
        Ok(tools) => Ok(Live {
            session,
            transport,
            catalog: Arc::new(Catalog::from_remote(tools)),
        }),
        Err(e) => {
            teardown(id, session.as_ref(), transport.as_mut(), shutdown_timeout).await;
            Err(BridgeError::Discovery(e.to_string()))
        }
    }
}

async fn teardown(
    id: u64,
    session: &dyn ProtocolSession,
    transport: &mut dyn Transport,
    shutdown_timeout: Duration,
) {
    match tokio::time::timeout(shutdown_timeout, session.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(connection = id, "Error closing MCP session: {}", e),
        Err(_) => tracing::warn!(
            connection = id,
            "MCP session did not close within {:?}",
            shutdown_timeout
        ),
    }

    if let Err(e) = transport.terminate().await {
        tracing::warn!(connection = id, "Error terminating MCP server process: {}", e);
    }
}
