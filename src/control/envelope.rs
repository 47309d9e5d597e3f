//! Control message envelope and its wire codec
//!
//! Every frame that is not a keep-alive ping or pong is one envelope:
//!
//! ```text
//! { "id": "<string>", "type": "request"|"response"|"event",
//!   "category": "<string>", "action": "<string>",
//!   "payload": {...}, "sessionId": "<string>", "error": "<string>" }
//! ```
//!
//! `payload`, `sessionId` and `error` are omitted when absent.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{Error, Result};

use super::payload;

/// Kind of control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Event,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
            Self::Event => write!(f, "event"),
        }
    }
}

/// Coarse routing key; unknown names are carried verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    System,
    Terminal,
    Screencap,
    Git,
    Notification,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Terminal => "terminal",
            Self::Screencap => "screencap",
            Self::Git => "git",
            Self::Notification => "notification",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        match name {
            "system" => Self::System,
            "terminal" => Self::Terminal,
            "screencap" => Self::Screencap,
            "git" => Self::Git,
            "notification" => Self::Notification,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Other(_) => Self::Other(name),
            known => known,
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action names reserved by the protocol
pub mod actions {
    /// `system/ready` event sent by the peer once it is serving
    pub const READY: &str = "ready";
}

/// One control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Correlation token; a response echoes its request's id
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub category: Category,
    pub action: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "payload::deserialize"
    )]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// A request with a fresh id
    pub fn request(
        category: impl Into<Category>,
        action: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self::new(MessageType::Request, category.into(), action.into(), payload)
    }

    /// An event; the id is fresh and never answered
    pub fn event(
        category: impl Into<Category>,
        action: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self::new(MessageType::Event, category.into(), action.into(), payload)
    }

    /// Successful response to `request`
    pub fn response(request: &Envelope, payload: Option<Value>) -> Self {
        Self {
            id: request.id.clone(),
            kind: MessageType::Response,
            category: request.category.clone(),
            action: request.action.clone(),
            payload,
            session_id: request.session_id.clone(),
            error: None,
        }
    }

    /// Failed response to `request`
    pub fn error_response(request: &Envelope, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::response(request, None)
        }
    }

    fn new(kind: MessageType, category: Category, action: String, payload: Option<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            category,
            action,
            payload,
            session_id: None,
            error: None,
        }
    }

    /// Scope the message to a caller-side session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageType::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == MessageType::Response
    }

    pub fn is_event(&self) -> bool {
        self.kind == MessageType::Event
    }

    /// The peer's `system/ready` announcement
    pub fn is_system_ready(&self) -> bool {
        self.is_event() && self.category == Category::System && self.action == actions::READY
    }

    /// Decode the payload into a handler-specific type
    ///
    /// A missing payload is decoded from `null`, so `Option<T>` and unit-like
    /// types accept it.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            Error::InvalidPayload(format!("{}/{}: {}", self.category, self.action, e))
        })
    }
}

/// Encode an envelope as one frame (no delimiter)
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Decode one frame into an envelope
pub fn decode(frame: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(frame).map_err(|e| Error::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::payload::MAX_PAYLOAD_DEPTH;
    use serde_json::json;

    fn nested(levels: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..levels {
            value = json!({ "next": value });
        }
        value
    }

    fn roundtrip(envelope: &Envelope) -> Envelope {
        decode(&encode(envelope).unwrap()).unwrap()
    }

    #[test]
    fn test_roundtrip_full_envelope() {
        let request = Envelope::request(
            Category::Terminal,
            "spawn",
            Some(json!({"cwd": "/tmp", "argv": ["zsh", "-l"], "cols": 80, "ratio": 0.5})),
        )
        .with_session("session-7");
        assert_eq!(roundtrip(&request), request);

        let failed = Envelope::error_response(&request, "permission denied");
        assert_eq!(roundtrip(&failed), failed);
    }

    #[test]
    fn test_roundtrip_at_depth_cap() {
        let event = Envelope::event(Category::Screencap, "frame", Some(nested(MAX_PAYLOAD_DEPTH)));
        assert_eq!(roundtrip(&event), event);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let event = Envelope::event("system", "ready", None);
        let text = String::from_utf8(encode(&event).unwrap()).unwrap();
        assert!(!text.contains("payload"));
        assert!(!text.contains("sessionId"));
        assert!(!text.contains("error"));
        assert_eq!(roundtrip(&event), event);
    }

    #[test]
    fn test_exact_wire_form() {
        let request = decode(br#"{"id":"abc","type":"request","category":"system","action":"ping"}"#)
            .unwrap();
        let response = Envelope::response(&request, Some(json!({"status": "ok"})));
        assert_eq!(
            String::from_utf8(encode(&response).unwrap()).unwrap(),
            r#"{"id":"abc","type":"response","category":"system","action":"ping","payload":{"status":"ok"}}"#
        );
    }

    #[test]
    fn test_session_id_is_camel_case() {
        let envelope = decode(
            br#"{"id":"1","type":"event","category":"git","action":"changed","sessionId":"s1"}"#,
        )
        .unwrap();
        assert_eq!(envelope.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_response_preserves_correlation() {
        let request = Envelope::request(Category::Git, "status", None).with_session("s");
        let response = Envelope::response(&request, None);
        assert_eq!(response.id, request.id);
        assert_eq!(response.category, request.category);
        assert_eq!(response.action, request.action);
        assert_eq!(response.kind, MessageType::Response);
        assert_eq!(response.session_id.as_deref(), Some("s"));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Envelope::request(Category::System, "ping", None);
        let b = Envelope::request(Category::System, "ping", None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_unknown_category_preserved() {
        let envelope =
            decode(br#"{"id":"1","type":"event","category":"power","action":"sleep"}"#).unwrap();
        assert_eq!(envelope.category, Category::Other("power".to_string()));
        let text = String::from_utf8(encode(&envelope).unwrap()).unwrap();
        assert!(text.contains(r#""category":"power""#));
    }

    #[test]
    fn test_deep_payload_truncated_not_rejected() {
        let frame = serde_json::to_vec(&json!({
            "id": "deep",
            "type": "event",
            "category": "screencap",
            "action": "tree",
            "payload": nested(100),
        }))
        .unwrap();

        let envelope = decode(&frame).unwrap();
        let mut cursor = envelope.payload.as_ref().unwrap();
        for _ in 0..MAX_PAYLOAD_DEPTH {
            cursor = &cursor["next"];
        }
        assert_eq!(cursor, &json!({}));
    }

    #[test]
    fn test_payload_deeper_than_parser_limit_decodes() {
        let levels = 5000;
        let mut frame = String::from(
            r#"{"id":"deeper","type":"event","category":"screencap","action":"tree","payload":"#,
        );
        frame.push_str(&r#"{"next":"#.repeat(levels));
        frame.push_str("1");
        frame.push_str(&"}".repeat(levels));
        frame.push('}');

        let envelope = decode(frame.as_bytes()).unwrap();
        assert_eq!(envelope.id, "deeper");
        let payload = envelope.payload.unwrap();
        assert_eq!(crate::control::payload::depth(&payload), MAX_PAYLOAD_DEPTH + 1);
    }

    #[test]
    fn test_malformed_frames() {
        let frames: [&[u8]; 5] = [
            b"not json",
            br#"{"id":"1","type":"request","category":"system"}"#,
            br#"{"id":"1","type":"bogus","category":"system","action":"x"}"#,
            br#"{"type":"ping","timestamp":1}"#,
            br#"{"id":"1","type":"request","category":"system","action":"x""#,
        ];
        for frame in frames {
            assert!(matches!(decode(frame), Err(Error::MalformedFrame(_))));
        }
    }

    #[test]
    fn test_payload_as_typed() {
        #[derive(Deserialize)]
        struct Spawn {
            cwd: String,
            cols: u16,
        }

        let request = Envelope::request("terminal", "spawn", Some(json!({"cwd": "/", "cols": 120})));
        let spawn: Spawn = request.payload_as().unwrap();
        assert_eq!(spawn.cwd, "/");
        assert_eq!(spawn.cols, 120);

        let bad = Envelope::request("terminal", "spawn", Some(json!({"cwd": 3})));
        assert!(matches!(bad.payload_as::<Spawn>(), Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn test_system_ready_detection() {
        assert!(Envelope::event(Category::System, "ready", None).is_system_ready());
        assert!(!Envelope::request(Category::System, "ready", None).is_system_ready());
        assert!(!Envelope::event(Category::Git, "ready", None).is_system_ready());
    }
}
