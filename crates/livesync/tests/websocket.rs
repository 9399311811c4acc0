//! End-to-end over a real WebSocket on loopback.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use liveconf::LiveConfig;
use liveproto::{Device, LiveValue, Parameter, SessionSnapshot, Track};
use livesync::ConnectionState;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn session() -> SessionSnapshot {
    SessionSnapshot {
        tracks: vec![Track::new(0, "track0", "Drums").with_device(
            Device::new(0, "track0.device0", "Glue").with_parameter(
                Parameter::new(0, "track0.device0.param0", "Threshold", 0.3).with_display("-18 dB"),
            ),
        )],
        ..Default::default()
    }
}

#[tokio::test]
async fn mirrors_session_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());

    let bridge = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut received = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).unwrap();
            match frame["type"].as_str() {
                Some("get_session") => {
                    let reply = json!({"type": "session_state", "session": session()});
                    ws.send(Message::Text(reply.to_string())).await.unwrap();
                }
                Some("set_parameter") => {
                    let reply = json!({
                        "type": "parameter_delta",
                        "path": frame["path"],
                        "value": frame["value"],
                        "display": "-12 dB"
                    });
                    ws.send(Message::Text(reply.to_string())).await.unwrap();
                }
                _ => {}
            }
            received.push(frame["type"].as_str().unwrap_or_default().to_string());
        }
        received
    });

    let mut config = LiveConfig::default();
    config.connection.endpoint = endpoint;
    let client = livesync::init(&config).unwrap();
    assert!(livesync::init(&config).is_err());

    client.connect_default().unwrap();
    wait_for("snapshot", || client.snapshot().is_some()).await;
    assert_eq!(client.status(), ConnectionState::Connected);
    assert_eq!(*client.snapshot().unwrap(), session());

    assert!(client.set_parameter("track0.device0.param0", 0.5));
    wait_for("display update", || {
        client
            .snapshot()
            .and_then(|s| s.parameter("track0.device0.param0").map(|p| p.display == "-12 dB"))
            .unwrap_or(false)
    })
    .await;
    assert_eq!(client.value("track0.device0.param0"), Some(LiveValue::Number(0.5)));

    client.disconnect();
    assert_eq!(client.status(), ConnectionState::Disconnected);
    assert!(client.snapshot().is_none());

    let received = tokio::time::timeout(Duration::from_secs(5), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, vec!["get_session", "set_parameter"]);
}
