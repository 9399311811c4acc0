//! Connection lifecycle state and the shared status record.
//!
//! The reactor and the client facade both write here. Every transition is
//! tagged with the generation it was made under; `disconnect()` bumps the
//! generation so a reactor that is still winding down cannot overwrite the
//! settled `disconnected` state.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, and the only one reachable by explicit `disconnect()`
    Disconnected,
    /// Attempting to open the link
    Connecting,
    /// Link open; heartbeat running
    Connected,
    /// Last attempt failed; a reconnect is scheduled
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }

    /// `connect()` is a no-op in these states.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Published on every state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub state: ConnectionState,
    /// Diagnostic, set on error transitions
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Error,
            message: Some(message.into()),
        }
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub endpoint: Option<String>,
    /// Reconnect delays scheduled since the last successful open
    pub attempts: u32,
    /// When the last pong arrived
    pub last_heartbeat: Option<Instant>,
    pub last_latency: Option<Duration>,
    /// Peer `error` frames received over the client's lifetime
    pub peer_errors: u64,
}

#[derive(Debug)]
struct Inner {
    generation: u64,
    state: ConnectionState,
    endpoint: Option<String>,
    attempts: u32,
    last_heartbeat: Option<Instant>,
    last_latency: Option<Duration>,
    peer_errors: u64,
}

/// Shared, lock-protected connection record.
#[derive(Debug)]
pub struct ConnectionStatus {
    inner: Mutex<Inner>,
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                generation: 0,
                state: ConnectionState::Disconnected,
                endpoint: None,
                attempts: 0,
                last_heartbeat: None,
                last_latency: None,
                peer_errors: 0,
            }),
        }
    }

    // Subscribers run outside this lock, so a poisoned guard only means a
    // panic between two field writes; the record is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn info(&self) -> ConnectionInfo {
        let inner = self.lock();
        ConnectionInfo {
            state: inner.state,
            endpoint: inner.endpoint.clone(),
            attempts: inner.attempts,
            last_heartbeat: inner.last_heartbeat,
            last_latency: inner.last_latency,
            peer_errors: inner.peer_errors,
        }
    }

    /// Begin a new lifecycle toward `endpoint` if idle.
    ///
    /// Returns the generation to run under, or `None` when already
    /// connecting/connected.
    pub fn begin(&self, endpoint: &str) -> Option<u64> {
        let mut inner = self.lock();
        if inner.state.is_active() {
            return None;
        }
        inner.endpoint = Some(endpoint.to_string());
        Some(inner.generation)
    }

    /// Move to `state` if `generation` is still current.
    pub fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = state;
        if state == ConnectionState::Connected {
            inner.attempts = 0;
        }
        true
    }

    /// Count one scheduled reconnect and return the count before it.
    pub fn next_attempt(&self, generation: u64) -> Option<u32> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        let attempt = inner.attempts;
        inner.attempts = inner.attempts.saturating_add(1);
        Some(attempt)
    }

    pub fn record_pong(&self, generation: u64, latency: Duration) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.last_heartbeat = Some(Instant::now());
            inner.last_latency = Some(latency);
        }
    }

    pub fn record_peer_error(&self) -> u64 {
        let mut inner = self.lock();
        inner.peer_errors += 1;
        inner.peer_errors
    }

    /// Settle in `disconnected`, invalidating the running generation.
    ///
    /// Returns false if already disconnected.
    pub fn reset(&self) -> bool {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.attempts = 0;
        let changed = inner.state != ConnectionState::Disconnected;
        inner.state = ConnectionState::Disconnected;
        changed
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Error.as_str(), "error");
        assert!(ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Error.is_active());
    }

    #[test]
    fn begin_is_noop_while_active() {
        let status = ConnectionStatus::new();
        let generation = status.begin("ws://a").unwrap();
        assert!(status.transition(generation, ConnectionState::Connecting));
        assert!(status.begin("ws://b").is_none());
        assert_eq!(status.info().endpoint.as_deref(), Some("ws://a"));
    }

    #[test]
    fn stale_generation_is_ignored() {
        let status = ConnectionStatus::new();
        let generation = status.begin("ws://a").unwrap();
        status.transition(generation, ConnectionState::Connecting);

        assert!(status.reset());
        assert!(!status.transition(generation, ConnectionState::Connected));
        assert!(status.next_attempt(generation).is_none());
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert!(!status.reset());
    }

    #[test]
    fn attempts_reset_on_connected() {
        let status = ConnectionStatus::new();
        let generation = status.begin("ws://a").unwrap();
        assert_eq!(status.next_attempt(generation), Some(0));
        assert_eq!(status.next_attempt(generation), Some(1));
        assert_eq!(status.info().attempts, 2);

        status.transition(generation, ConnectionState::Connected);
        assert_eq!(status.info().attempts, 0);
    }
}
