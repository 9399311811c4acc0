//! Message types exchanged with the session bridge.
//!
//! Outbound [`Command`]s are intents issued by the client; inbound
//! [`Inbound`] events are pushed by the bridge. Both travel as JSON objects
//! tagged by a `type` field (see the `codec` module).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionSnapshot;
use crate::value::LiveValue;

/// Inbound kinds this client understands. Anything else decodes to
/// [`Inbound::Unknown`].
pub const INBOUND_KINDS: &[&str] = &["session_state", "parameter_delta", "ack", "pong", "error"];

/// Outbound intents (client → bridge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Request a full session snapshot
    GetSession,

    SetParameter {
        path: String,
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
    },

    SetProperty {
        path: String,
        property: String,
        value: LiveValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
    },

    CallMethod {
        path: String,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
    },

    /// Liveness probe; the bridge echoes `timestamp` in its pong
    Ping { timestamp: i64 },
}

impl Command {
    pub fn set_parameter(path: impl Into<String>, value: f64) -> Self {
        Command::SetParameter {
            path: path.into(),
            value,
            id: Some(Uuid::new_v4()),
        }
    }

    /// Booleans are sent as `1`/`0`; the wire only carries numbers and strings.
    pub fn set_property(
        path: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<LiveValue>,
    ) -> Self {
        Command::SetProperty {
            path: path.into(),
            property: property.into(),
            value: value.into().normalized(),
            id: Some(Uuid::new_v4()),
        }
    }

    pub fn call_method(
        path: impl Into<String>,
        method: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Command::CallMethod {
            path: path.into(),
            method: method.into(),
            args,
            id: Some(Uuid::new_v4()),
        }
    }

    /// Ping stamped with the current wall-clock time in milliseconds.
    pub fn ping() -> Self {
        Command::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Wire kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GetSession => "get_session",
            Command::SetParameter { .. } => "set_parameter",
            Command::SetProperty { .. } => "set_property",
            Command::CallMethod { .. } => "call_method",
            Command::Ping { .. } => "ping",
        }
    }

    /// Correlation id of a write, if any.
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            Command::SetParameter { id, .. }
            | Command::SetProperty { id, .. }
            | Command::CallMethod { id, .. } => *id,
            _ => None,
        }
    }
}

/// A path-addressed scalar update pushed by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDelta {
    pub path: String,
    pub value: LiveValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ParameterDelta {
    pub fn new(path: impl Into<String>, value: impl Into<LiveValue>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Confirmation of a prior outbound write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub path: String,
    pub value: LiveValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Inbound events (bridge → client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Full session push; replaces whatever the client holds
    SessionState { session: SessionSnapshot },

    ParameterDelta(ParameterDelta),

    Ack(Ack),

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Diagnostic from the bridge
    Error { message: String },

    /// A well-formed frame of a kind this client does not handle
    #[serde(skip)]
    Unknown { kind: String },
}

impl Inbound {
    pub fn kind(&self) -> &str {
        match self {
            Inbound::SessionState { .. } => "session_state",
            Inbound::ParameterDelta(_) => "parameter_delta",
            Inbound::Ack(_) => "ack",
            Inbound::Pong { .. } => "pong",
            Inbound::Error { .. } => "error",
            Inbound::Unknown { kind } => kind,
        }
    }
}
