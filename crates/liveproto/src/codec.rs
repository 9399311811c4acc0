//! JSON text codec.
//!
//! ## Wire Format
//!
//! One message per text frame, a JSON object tagged by `type`:
//!
//! ```text
//! → {"type":"set_parameter","path":"track0.device0.param2","value":0.8,"id":"…"}
//! ← {"type":"parameter_delta","path":"track0.device0.param2","value":0.8,"display":"80 %"}
//! ```
//!
//! Decoding classifies frames three ways: a known kind with valid fields, a
//! well-formed frame of an unknown kind ([`Inbound::Unknown`]), or malformed
//! ([`CodecError`]). The connection layer drops malformed frames; a single bad
//! frame never ends a session.

use tracing::{debug, warn};

use crate::message::{Command, Inbound, INBOUND_KINDS};

/// Errors during frame encoding/decoding
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("Frame has no string `type` field")]
    MissingKind,
    #[error("Invalid {kind} frame: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode an outbound command as a text frame.
pub fn encode(command: &Command) -> Result<String, CodecError> {
    serde_json::to_string(command).map_err(|source| CodecError::Encode {
        kind: command.kind(),
        source,
    })
}

/// Decode a text frame into an inbound event.
pub fn decode(frame: &str) -> Result<Inbound, CodecError> {
    let value: serde_json::Value = serde_json::from_str(frame).map_err(CodecError::Json)?;
    let kind = value
        .get("type")
        .and_then(|k| k.as_str())
        .ok_or(CodecError::MissingKind)?
        .to_string();

    if !INBOUND_KINDS.contains(&kind.as_str()) {
        return Ok(Inbound::Unknown { kind });
    }

    serde_json::from_value(value).map_err(|source| CodecError::Invalid { kind, source })
}

/// Decode, logging and discarding malformed frames.
pub fn decode_frame(frame: &str) -> Option<Inbound> {
    match decode(frame) {
        Ok(Inbound::Unknown { kind }) => {
            debug!("Ignoring unknown frame kind '{}'", kind);
            None
        }
        Ok(inbound) => Some(inbound),
        Err(e) => {
            warn!("Dropping malformed frame ({} bytes): {}", frame.len(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ParameterDelta;
    use crate::value::LiveValue;

    #[test]
    fn test_decode_delta() {
        let frame = r#"{"type":"parameter_delta","path":"track0.vol","value":0.8,"display":"-1.9 dB"}"#;
        let inbound = decode(frame).unwrap();
        assert_eq!(
            inbound,
            Inbound::ParameterDelta(ParameterDelta::new("track0.vol", 0.8).with_display("-1.9 dB"))
        );
    }

    #[test]
    fn test_decode_pong_without_timestamp() {
        assert_eq!(
            decode(r#"{"type":"pong"}"#).unwrap(),
            Inbound::Pong { timestamp: None }
        );
    }

    #[test]
    fn test_decode_ack_with_bool() {
        match decode(r#"{"type":"ack","path":"track2.solo","value":true}"#).unwrap() {
            Inbound::Ack(ack) => {
                assert_eq!(ack.path, "track2.solo");
                assert_eq!(ack.value, LiveValue::Bool(true));
                assert!(ack.id.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind() {
        let inbound = decode(r#"{"type":"clip_fired","path":"track0.clip3"}"#).unwrap();
        assert!(matches!(inbound, Inbound::Unknown { ref kind } if kind == "clip_fired"));
        assert!(decode_frame(r#"{"type":"clip_fired"}"#).is_none());
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode("[1,2,3]"), Err(CodecError::MissingKind)));
        assert!(matches!(decode(r#"{"type":7}"#), Err(CodecError::MissingKind)));
        assert!(matches!(
            decode(r#"{"type":"parameter_delta","value":0.5}"#),
            Err(CodecError::Invalid { ref kind, .. }) if kind == "parameter_delta"
        ));
        assert!(matches!(
            decode(r#"{"type":"error"}"#),
            Err(CodecError::Invalid { .. })
        ));
        assert!(decode_frame("{").is_none());
    }

    #[test]
    fn test_extra_fields_ignored() {
        let frame = r#"{"type":"error","message":"no such track","code":404,"kind":"lookup"}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Error {
                message: "no such track".to_string()
            }
        );
    }

    #[test]
    fn test_encode_get_session() {
        assert_eq!(encode(&Command::GetSession).unwrap(), r#"{"type":"get_session"}"#);
    }
}
