//! livesync - live mirror of a remote performance session
//!
//! Keeps a locally-readable copy of the bridge's session (tracks, devices,
//! parameters, transport) over one long-lived connection, and recovers from
//! connection loss on its own.
//!
//! ## Architecture
//!
//! ```text
//! caller ─▶ SessionClient ──mpsc──▶ reactor task ──Link──▶ bridge
//!              │   ▲                   │
//!              │   └── EventBus ◀──────┘ decoded frames, status, latency
//!              └────── SessionStore ◀── (first subscriber on session/delta)
//! ```
//!
//! - `client` - the public surface: connect/disconnect, commands, reads
//! - `reactor` - owns the link; lifecycle, heartbeat, reconnect backoff
//! - `bus` - four pub/sub categories with isolated subscribers
//! - `store` - copy-on-write snapshot with last-writer-wins leaf updates
//! - `transport`, `ws` - how the link is opened (WebSocket by default)
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn run() -> anyhow::Result<()> {
//! let client = livesync::client();
//! client.on_delta(|delta| println!("{} = {}", delta.path, delta.value));
//! client.connect("ws://127.0.0.1:9001")?;
//! // ...later, once connected
//! client.set_parameter("track0.vol", 0.8);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod bus;
pub mod client;
pub mod reactor;
pub mod status;
pub mod store;
pub mod transport;
pub mod ws;

#[cfg(test)]
mod testing;

use std::sync::OnceLock;

use liveconf::LiveConfig;
use tracing::warn;

pub use backoff::Backoff;
pub use bus::{Category, Subscription};
pub use client::{ClientError, SessionClient};
pub use status::{ConnectionInfo, ConnectionState, StatusEvent};
pub use store::SessionStore;
pub use transport::{Link, Transport};
pub use ws::WsTransport;

static CLIENT: OnceLock<SessionClient> = OnceLock::new();

/// The process-wide session client.
///
/// Built on first use from [`LiveConfig::load`], falling back to defaults
/// if no config can be read.
pub fn client() -> &'static SessionClient {
    CLIENT.get_or_init(|| {
        let config = LiveConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            LiveConfig::default()
        });
        SessionClient::new(&config.connection)
    })
}

/// Install the process-wide client with an explicit configuration.
///
/// Fails if [`client()`] or `init` already ran.
pub fn init(config: &LiveConfig) -> Result<&'static SessionClient, ClientError> {
    let mut created = false;
    let client = CLIENT.get_or_init(|| {
        created = true;
        SessionClient::new(&config.connection)
    });
    if created {
        Ok(client)
    } else {
        Err(ClientError::AlreadyInitialized)
    }
}
