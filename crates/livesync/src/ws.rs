//! WebSocket transport over `tokio-tungstenite`.
//!
//! One JSON message per text frame. Binary frames that happen to be valid
//! UTF-8 are accepted as text; protocol-level ping/pong frames are answered
//! by tungstenite and never reach the codec.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::transport::{Link, Transport};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Default transport.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Link>> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .with_context(|| format!("WebSocket connect to {} failed", endpoint))?;
        debug!("WebSocket handshake with {}: {}", endpoint, response.status());
        Ok(Box::new(WsLink { stream }))
    }
}

pub struct WsLink {
    stream: WsStream,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.stream
            .send(Message::Text(frame))
            .await
            .context("WebSocket send failed")
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        warn!("Dropping non-UTF-8 binary frame ({} bytes)", e.as_bytes().len());
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket closed by peer: {:?}", frame);
                    return None;
                }
                // Ping/Pong are handled by tungstenite; raw frames are skipped
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(anyhow::anyhow!("WebSocket read error: {e}"))),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}
