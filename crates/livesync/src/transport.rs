//! Transport abstraction: how the reactor reaches the bridge.
//!
//! The reactor only needs text frames in both directions, so a transport is
//! anything that can open a [`Link`] to an endpoint string. WebSocket is the
//! default (see the `ws` module); tests use an in-memory link.

use anyhow::Result;
use async_trait::async_trait;

/// Opens links to the bridge.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Link>>;
}

/// One open, bidirectional text-frame connection.
#[async_trait]
pub trait Link: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Next text frame, `None` when the peer closed the link.
    ///
    /// Must be cancel-safe: the reactor races this against timers and
    /// commands in `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the link. Errors are not interesting at this point.
    async fn close(&mut self);
}
