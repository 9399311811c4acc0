//! CLI command implementations

use std::time::Duration;

use anyhow::{bail, Result};
use liveproto::LiveValue;
use livesync::{ConnectionState, SessionClient};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Mirror the session, logging every event category until Ctrl-C.
pub async fn watch(client: &SessionClient, endpoint: Option<&str>) -> Result<()> {
    client.on_status(|event| match &event.message {
        Some(message) => warn!("status: {} ({})", event.state, message),
        None => info!("status: {}", event.state),
    });
    client.on_session(|session| {
        info!(
            "session: {} tracks, {} returns, {} parameters",
            session.tracks.len(),
            session.return_tracks.len(),
            session.parameter_count()
        );
        if let Some(transport) = &session.transport {
            info!(
                "transport: {} bpm, playing={}, position={}",
                transport.tempo, transport.playing, transport.position
            );
        }
    });
    client.on_delta(|delta| {
        info!("{}", describe(&delta.path, &delta.value, delta.display.as_deref()));
    });
    client.on_latency(|latency| info!("latency: {:?}", latency));

    match endpoint {
        Some(endpoint) => client.connect(endpoint)?,
        None => client.connect_default()?,
    }

    tokio::signal::ctrl_c().await?;
    client.disconnect();
    Ok(())
}

pub async fn set(client: &SessionClient, path: &str, value: f64, wait: Duration) -> Result<()> {
    let confirmed = confirmations(client, path);
    ensure_connected(client, wait).await?;

    if !client.set_parameter(path, value) {
        bail!("Connection dropped before {} could be sent", path);
    }
    report(confirmed, path, wait).await;
    client.disconnect();
    Ok(())
}

pub async fn prop(
    client: &SessionClient,
    path: &str,
    property: &str,
    value: &str,
    wait: Duration,
) -> Result<()> {
    let leaf = format!("{}.{}", path, property);
    let confirmed = confirmations(client, &leaf);
    ensure_connected(client, wait).await?;

    if !client.set_property(path, property, parse_value(value)) {
        bail!("Connection dropped before {} could be sent", leaf);
    }
    report(confirmed, &leaf, wait).await;
    client.disconnect();
    Ok(())
}

pub async fn call(
    client: &SessionClient,
    path: &str,
    method: &str,
    args: &[String],
    wait: Duration,
) -> Result<()> {
    ensure_connected(client, wait).await?;

    let args = args.iter().map(String::as_str).map(parse_arg).collect();
    if !client.call_method(path, method, args) {
        bail!("Connection dropped before {}.{} could be sent", path, method);
    }
    // Nothing confirms a method call; give the reactor a moment to flush.
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("Called {}.{}", path, method);
    client.disconnect();
    Ok(())
}

type Confirmations = mpsc::UnboundedReceiver<(LiveValue, Option<String>)>;

/// Connect to the configured endpoint and wait up to `wait` for `connected`.
async fn ensure_connected(client: &SessionClient, wait: Duration) -> Result<()> {
    let (tx, mut rx) = watch::channel(client.status());
    let sub = client.on_status(move |event| {
        let _ = tx.send(event.state);
    });
    client.connect_default()?;

    let reached = tokio::time::timeout(wait, rx.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    client.unsubscribe(sub);

    if reached {
        return Ok(());
    }
    let info = client.connection_info();
    client.disconnect();
    bail!(
        "Not connected to {} after {:?} (state: {})",
        info.endpoint.unwrap_or_default(),
        wait,
        info.state
    );
}

/// Deltas touching `path`, collected from before the write is sent.
fn confirmations(client: &SessionClient, path: &str) -> Confirmations {
    let (tx, rx) = mpsc::unbounded_channel();
    let path = path.to_string();
    client.on_delta(move |delta| {
        if delta.path == path {
            let _ = tx.send((delta.value.clone(), delta.display.clone()));
        }
    });
    rx
}

async fn report(mut confirmed: Confirmations, path: &str, wait: Duration) {
    match tokio::time::timeout(wait, confirmed.recv()).await {
        Ok(Some((value, shown))) => println!("{}", describe(path, &value, shown.as_deref())),
        _ => warn!("No confirmation for {} within {:?}", path, wait),
    }
}

/// `path = value`, with the bridge's display string when it sent one.
fn describe(path: &str, value: &LiveValue, shown: Option<&str>) -> String {
    match shown {
        Some(shown) => format!("{} = {} ({})", path, value, shown),
        None => format!("{} = {}", path, value),
    }
}

/// `true`/`false`, then numbers, then text.
fn parse_value(raw: &str) -> LiveValue {
    match raw {
        "true" => LiveValue::Bool(true),
        "false" => LiveValue::Bool(false),
        _ => raw
            .parse::<f64>()
            .map(LiveValue::Number)
            .unwrap_or_else(|_| LiveValue::Text(raw.to_string())),
    }
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
