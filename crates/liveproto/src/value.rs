//! Leaf values carried by deltas, acks and property writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar leaf value: boolean, number, or text.
///
/// The bridge is loose about booleans (Live reports `mute` as `0`/`1`), so
/// boolean leaves accept numbers too. See [`LiveValue::as_bool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiveValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl LiveValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiveValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Booleans as-is, numbers as non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LiveValue::Bool(b) => Some(*b),
            LiveValue::Number(n) => Some(*n != 0.0),
            LiveValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiveValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Wire form for `set_property`: numbers and strings only.
    pub fn normalized(self) -> Self {
        match self {
            LiveValue::Bool(b) => LiveValue::Number(if b { 1.0 } else { 0.0 }),
            other => other,
        }
    }
}

impl From<f64> for LiveValue {
    fn from(n: f64) -> Self {
        LiveValue::Number(n)
    }
}

impl From<f32> for LiveValue {
    fn from(n: f32) -> Self {
        LiveValue::Number(n as f64)
    }
}

impl From<i64> for LiveValue {
    fn from(n: i64) -> Self {
        LiveValue::Number(n as f64)
    }
}

impl From<bool> for LiveValue {
    fn from(b: bool) -> Self {
        LiveValue::Bool(b)
    }
}

impl From<&str> for LiveValue {
    fn from(s: &str) -> Self {
        LiveValue::Text(s.to_string())
    }
}

impl From<String> for LiveValue {
    fn from(s: String) -> Self {
        LiveValue::Text(s)
    }
}

impl fmt::Display for LiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveValue::Bool(b) => write!(f, "{}", b),
            LiveValue::Number(n) => write!(f, "{}", n),
            LiveValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_decode() {
        let values: Vec<LiveValue> = serde_json::from_str(r#"[true, 0.5, 3, "Kick"]"#).unwrap();
        assert_eq!(values[0], LiveValue::Bool(true));
        assert_eq!(values[1], LiveValue::Number(0.5));
        assert_eq!(values[2], LiveValue::Number(3.0));
        assert_eq!(values[3], LiveValue::Text("Kick".to_string()));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(LiveValue::Number(1.0).as_bool(), Some(true));
        assert_eq!(LiveValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(LiveValue::Text("on".into()).as_bool(), None);
        assert_eq!(LiveValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_normalized() {
        assert_eq!(LiveValue::Bool(true).normalized(), LiveValue::Number(1.0));
        assert_eq!(LiveValue::Bool(false).normalized(), LiveValue::Number(0.0));
        assert_eq!(LiveValue::from("x").normalized(), LiveValue::Text("x".into()));
    }
}
