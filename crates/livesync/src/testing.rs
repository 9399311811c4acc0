//! In-memory scripted transport for reactor and client tests.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use liveproto::SessionSnapshot;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Link, Transport};

#[derive(Default)]
struct Script {
    refuse_next: u32,
    refuse_all: bool,
    hang: bool,
    attempts: Vec<Instant>,
}

/// Transport whose connects succeed, fail, or hang on command.
pub(crate) struct MockTransport {
    script: Mutex<Script>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            script: Mutex::new(Script::default()),
            peers,
        });
        (transport, rx)
    }

    /// Refuse the next `n` connects.
    pub fn refuse_next(&self, n: u32) {
        self.script.lock().unwrap().refuse_next = n;
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.script.lock().unwrap().refuse_all = refuse;
    }

    /// Make connects never complete.
    pub fn hang(&self) {
        self.script.lock().unwrap().hang = true;
    }

    /// When each connect was attempted.
    pub fn attempts(&self) -> Vec<Instant> {
        self.script.lock().unwrap().attempts.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _endpoint: &str) -> Result<Box<dyn Link>> {
        let hang = {
            let mut script = self.script.lock().unwrap();
            script.attempts.push(Instant::now());
            if script.refuse_all {
                return Err(anyhow!("connection refused"));
            }
            if script.refuse_next > 0 {
                script.refuse_next -= 1;
                return Err(anyhow!("connection refused"));
            }
            script.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let (to_client, inbox) = mpsc::unbounded_channel();
        let (outbox, from_client) = mpsc::unbounded_channel();
        self.peers
            .send(MockPeer {
                tx: to_client,
                rx: from_client,
            })
            .map_err(|_| anyhow!("test dropped the peer receiver"))?;
        Ok(Box::new(MockLink { inbox, outbox }))
    }
}

struct MockLink {
    inbox: mpsc::UnboundedReceiver<String>,
    outbox: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.outbox.send(frame).map_err(|_| anyhow!("peer gone"))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        self.inbox.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inbox.close();
    }
}

/// The bridge side of one mock link. Dropping it closes the link.
pub(crate) struct MockPeer {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn push(&self, frame: &str) {
        let _ = self.tx.send(frame.to_string());
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push(&value.to_string());
    }

    pub fn push_session(&self, session: &SessionSnapshot) {
        self.push_json(serde_json::json!({"type": "session_state", "session": session}));
    }

    /// Next frame the client sent, `None` once the client closed the link.
    pub async fn next_frame(&mut self) -> Option<serde_json::Value> {
        let text = self.rx.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Next frame of `kind`, skipping others (pings, usually).
    pub async fn next_of(&mut self, kind: &str) -> Option<serde_json::Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["type"] == kind {
                return Some(frame);
            }
        }
    }
}

/// Config with the default 20s heartbeat and 1s..30s backoff.
pub(crate) fn test_config() -> liveconf::ConnectionConfig {
    liveconf::ConnectionConfig {
        client_name: "test".to_string(),
        ..Default::default()
    }
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub(crate) async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}

/// Record every status transition published by `client`.
pub(crate) fn record_status(
    client: &crate::SessionClient,
) -> Arc<Mutex<Vec<crate::ConnectionState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    client.on_status(move |event| s.lock().unwrap().push(event.state));
    seen
}

/// Gaps between consecutive attempts.
pub(crate) fn gaps(attempts: &[Instant]) -> Vec<std::time::Duration> {
    attempts.windows(2).map(|w| w[1] - w[0]).collect()
}

/// One track at volume 0.5 with a single device parameter.
pub(crate) fn one_track_session() -> SessionSnapshot {
    use liveproto::{Device, Parameter, Track, Transport};

    SessionSnapshot {
        tracks: vec![Track::new(0, "track0", "Lead").with_volume(0.5).with_device(
            Device::new(0, "track0.device0", "Operator").with_parameter(
                Parameter::new(0, "track0.device0.param0", "Filter Freq", 0.4).with_display("1.2 kHz"),
            ),
        )],
        return_tracks: vec![],
        master_track: Some(Track::new(0, "master", "Master")),
        transport: Some(Transport {
            tempo: 124.0,
            playing: true,
            position: 16.0,
        }),
    }
}
