//! Public client surface: lifecycle control, commands, subscriptions, reads.
//!
//! Every call returns immediately. Commands are fire-and-forget: while the
//! client is not connected they are dropped (no queueing, no retry) and the
//! local optimistic write is skipped with them. Callers that need delivery
//! confidence watch status, deltas and latency.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use liveconf::ConnectionConfig;
use liveproto::{Command, LiveValue, ParameterDelta, SessionSnapshot};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::Subscription;
use crate::reactor::{Reactor, ReactorCommand, ReactorSettings, Shared};
use crate::status::{ConnectionInfo, ConnectionState, StatusEvent};
use crate::transport::Transport;
use crate::ws::WsTransport;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect() must be called from within a tokio runtime")]
    NoRuntime,
    #[error("The session client is already initialized")]
    AlreadyInitialized,
}

struct ReactorHandle {
    cmd_tx: mpsc::UnboundedSender<ReactorCommand>,
    cancel: CancellationToken,
}

/// The live session client. One per process: see [`crate::client()`].
pub struct SessionClient {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    settings: ReactorSettings,
    default_endpoint: String,
    reactor: Mutex<Option<ReactorHandle>>,
}

impl SessionClient {
    pub(crate) fn new(config: &ConnectionConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    pub(crate) fn with_transport(config: &ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        let shared = Arc::new(Shared::default());

        // The store subscribes first so it has reconciled before any other
        // subscriber reads it.
        let store = shared.store.clone();
        shared
            .bus
            .session
            .subscribe(move |snapshot: &Arc<SessionSnapshot>| store.set_snapshot(snapshot.clone()));
        let store = shared.store.clone();
        shared.bus.delta.subscribe(move |delta: &ParameterDelta| {
            store.apply_delta(delta);
        });

        Self {
            shared,
            transport,
            settings: ReactorSettings::from_config(config),
            default_endpoint: config.endpoint.clone(),
            reactor: Mutex::new(None),
        }
    }

    fn reactor(&self) -> MutexGuard<'_, Option<ReactorHandle>> {
        self.reactor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- lifecycle ---

    /// Start connecting to `endpoint`.
    ///
    /// No-op while connecting or connected. While waiting out a reconnect
    /// delay this skips the wait and connects immediately.
    pub fn connect(&self, endpoint: &str) -> Result<(), ClientError> {
        let mut reactor = self.reactor();
        let Some(generation) = self.shared.status.begin(endpoint) else {
            debug!("{}: connect({}) ignored, already active", self.settings.name, endpoint);
            return Ok(());
        };

        if let Some(handle) = reactor.as_ref() {
            if handle
                .cmd_tx
                .send(ReactorCommand::ConnectNow(endpoint.to_string()))
                .is_ok()
            {
                return Ok(());
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = Reactor::new(
            self.transport.clone(),
            self.shared.clone(),
            self.settings.clone(),
            endpoint.to_string(),
            generation,
            cmd_rx,
            cancel.clone(),
        );
        runtime.spawn(task.run());
        *reactor = Some(ReactorHandle { cmd_tx, cancel });

        info!("{}: Connecting to {}", self.settings.name, endpoint);
        Ok(())
    }

    /// Connect to the configured endpoint.
    pub fn connect_default(&self) -> Result<(), ClientError> {
        let endpoint = self.default_endpoint.clone();
        self.connect(&endpoint)
    }

    /// Stop everything and settle in `disconnected`.
    ///
    /// Cancels the heartbeat and any pending reconnect, closes the link
    /// without triggering a reconnect, resets the attempt counter, and clears
    /// the session snapshot.
    pub fn disconnect(&self) {
        if let Some(handle) = self.reactor().take() {
            handle.cancel.cancel();
        }
        self.shared.bus.status.publish_if(|| {
            let changed = self.shared.status.reset();
            self.shared.store.clear();
            if !changed {
                return None;
            }
            info!("{}: {}", self.settings.name, ConnectionState::Disconnected);
            Some(StatusEvent::new(ConnectionState::Disconnected))
        });
    }

    // --- reads ---

    pub fn status(&self) -> ConnectionState {
        self.shared.status.state()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.shared.status.info()
    }

    /// Last known session; stays visible across reconnects.
    pub fn snapshot(&self) -> Option<Arc<SessionSnapshot>> {
        self.shared.store.snapshot()
    }

    /// Read one leaf by path (`track0.vol`, `transport.tempo`, a parameter path).
    pub fn value(&self, path: &str) -> Option<LiveValue> {
        self.shared.store.value(path)
    }

    pub fn default_endpoint(&self) -> &str {
        &self.default_endpoint
    }

    // --- commands ---

    /// Hand `command` to the reactor. Returns false if it was dropped.
    fn dispatch(&self, command: Command) -> bool {
        let reactor = self.reactor();
        match reactor.as_ref() {
            Some(handle) => handle.cmd_tx.send(ReactorCommand::Send(command)).is_ok(),
            None => false,
        }
    }

    fn ready(&self, kind: &str) -> bool {
        let connected = self.is_connected();
        if !connected {
            debug!("{}: Not connected, dropping {}", self.settings.name, kind);
        }
        connected
    }

    /// Request a full session snapshot.
    pub fn get_session(&self) -> bool {
        self.ready("get_session") && self.dispatch(Command::GetSession)
    }

    /// Set a numeric leaf. Applied to the local snapshot immediately.
    pub fn set_parameter(&self, path: &str, value: f64) -> bool {
        if !self.ready("set_parameter") {
            return false;
        }
        self.shared
            .store
            .apply_optimistic_path(path, &LiveValue::Number(value));
        self.dispatch(Command::set_parameter(path, value))
    }

    /// Set a named property of the entity at `path`. Applied locally first.
    pub fn set_property(&self, path: &str, property: &str, value: impl Into<LiveValue>) -> bool {
        if !self.ready("set_property") {
            return false;
        }
        let value = value.into();
        self.shared.store.apply_optimistic(path, property, &value);
        self.dispatch(Command::set_property(path, property, value))
    }

    /// Invoke a method on the entity at `path`. Not reflected locally.
    pub fn call_method(&self, path: &str, method: &str, args: Vec<serde_json::Value>) -> bool {
        self.ready("call_method") && self.dispatch(Command::call_method(path, method, args))
    }

    // --- subscriptions ---

    pub fn on_session<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Arc<SessionSnapshot>) + Send + Sync + 'static,
    {
        self.shared.bus.session.subscribe(handler)
    }

    pub fn on_delta<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ParameterDelta) + Send + Sync + 'static,
    {
        self.shared.bus.delta.subscribe(handler)
    }

    pub fn on_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.shared.bus.status.subscribe(handler)
    }

    pub fn on_latency<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Duration) + Send + Sync + 'static,
    {
        self.shared.bus.latency.subscribe(handler)
    }

    /// Remove one subscription. Safe to call more than once.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.shared.bus.unsubscribe(subscription)
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reactor().take() {
            handle.cancel.cancel();
        }
    }
}
