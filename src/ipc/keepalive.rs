//! Keep-alive ping/pong frames
//!
//! This side sends `{"type":"ping","timestamp":<secs>}`; the peer answers
//! with a `{"type":"pong",...}` frame that never reaches the router.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct Ping {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: f64,
}

#[derive(Deserialize)]
struct TypeTag<'a> {
    #[serde(rename = "type", borrow)]
    kind: std::borrow::Cow<'a, str>,
}

/// Encode a ping frame stamped with the current time (no delimiter)
pub fn ping_frame() -> serde_json::Result<Vec<u8>> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    serde_json::to_vec(&Ping {
        kind: "ping",
        timestamp,
    })
}

/// Whether `frame` is a keep-alive reply
pub fn is_pong(frame: &[u8]) -> bool {
    is_kind(frame, b"\"pong\"", "pong")
}

/// Whether `frame` is a keep-alive ping
pub fn is_ping(frame: &[u8]) -> bool {
    is_kind(frame, b"\"ping\"", "ping")
}

fn is_kind(frame: &[u8], needle: &[u8], kind: &str) -> bool {
    // Cheap reject before parsing every inbound frame
    if !frame.windows(needle.len()).any(|w| w == needle) {
        return false;
    }
    serde_json::from_slice::<TypeTag>(frame)
        .map(|message| message.kind == kind)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_frame_shape() {
        let frame = ping_frame().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["type"], "ping");
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
        assert!(!frame.contains(&b'\n'));
        assert!(is_ping(&frame));
        assert!(!is_pong(&frame));
    }

    #[test]
    fn test_pong_detection() {
        assert!(is_pong(br#"{"type":"pong","timestamp":12.5}"#));
        assert!(is_pong(br#"{"timestamp":1,"type":"pong"}"#));
    }

    #[test]
    fn test_envelopes_are_not_pongs() {
        assert!(!is_pong(
            br#"{"id":"1","type":"event","category":"system","action":"pong"}"#
        ));
        assert!(!is_pong(br#"{"id":"2","type":"request","category":"system","action":"ping"}"#));
        assert!(!is_pong(b"not json \"pong\""));
    }
}
