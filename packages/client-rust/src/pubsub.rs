//! Text frames exchanged over the pub/sub socket.
//!
//! Every frame is a JSON object tagged by `type`. Outbound: `PING`, `LISTEN`,
//! `UNLISTEN`. Inbound: `PONG`, `RECONNECT`, `RESPONSE`, `MESSAGE`. A
//! `MESSAGE` carries the topic wire string and the payload as a JSON-encoded
//! string, decoded on demand by [`MessageData::payload`].

use dropwire_core::TopicAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frame encode/decode failures.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame: {0}")]
    Frame(#[source] serde_json::Error),
    #[error("invalid message payload on {topic}: {source}")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ClientFrame {
    Ping,
    Listen { nonce: String, data: ListenData },
    Unlisten { nonce: String, data: ListenData },
}

/// Topic list of a `LISTEN`/`UNLISTEN` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenData {
    pub topics: Vec<String>,
    /// Opaque token supplied by the caller; passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth_token: Option<String>,
}

impl ClientFrame {
    /// `LISTEN` for the given topics with a fresh nonce.
    #[must_use]
    pub fn listen<'a>(topics: impl IntoIterator<Item = &'a TopicAddress>, auth_token: Option<String>) -> Self {
        Self::Listen {
            nonce: new_nonce(),
            data: listen_data(topics, auth_token),
        }
    }

    /// `UNLISTEN` for the given topics with a fresh nonce.
    #[must_use]
    pub fn unlisten<'a>(topics: impl IntoIterator<Item = &'a TopicAddress>, auth_token: Option<String>) -> Self {
        Self::Unlisten {
            nonce: new_nonce(),
            data: listen_data(topics, auth_token),
        }
    }

    /// Nonce of a `LISTEN`/`UNLISTEN`, echoed back in the `RESPONSE`.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        match self {
            Self::Ping => None,
            Self::Listen { nonce, .. } | Self::Unlisten { nonce, .. } => Some(nonce),
        }
    }

    /// JSON text of the frame.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Frame)
    }
}

fn listen_data<'a>(topics: impl IntoIterator<Item = &'a TopicAddress>, auth_token: Option<String>) -> ListenData {
    ListenData {
        topics: topics.into_iter().map(|t| t.render().to_string()).collect(),
        auth_token,
    }
}

fn new_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Frames received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ServerFrame {
    Pong,
    Reconnect,
    Response {
        #[serde(default)]
        nonce: String,
        #[serde(default)]
        error: String,
    },
    Message { data: MessageData },
}

/// Body of a `MESSAGE` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    /// Topic wire string, e.g. `"video-playback-by-id.42"`.
    pub topic: String,
    /// JSON-encoded payload.
    pub message: String,
}

impl ServerFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Frame`] for malformed JSON or an unknown `type`.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(FrameError::Frame)
    }

    /// For a `RESPONSE`, the error string if the server reported one.
    #[must_use]
    pub fn response_error(&self) -> Option<&str> {
        match self {
            Self::Response { error, .. } if !error.is_empty() => Some(error),
            _ => None,
        }
    }
}

impl MessageData {
    /// Decodes the JSON-encoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if the payload is not valid JSON.
    pub fn payload(&self) -> Result<serde_json::Value, FrameError> {
        serde_json::from_str(&self.message).map_err(|source| FrameError::Payload {
            topic: self.topic.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use dropwire_core::{kinds, TopicCategory, TopicNameTable};
    use serde_json::json;

    use super::*;

    fn address(kind: &str, id: u64) -> TopicAddress {
        TopicAddress::new(&TopicNameTable::builtin(), TopicCategory::Channel, kind, id, |_, _| Ok(())).unwrap()
    }

    // ---- Outbound ----

    #[test]
    fn ping_encodes_type_only() {
        let text = ClientFrame::Ping.encode().unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), json!({ "type": "PING" }));
    }

    #[test]
    fn listen_carries_wire_topics_and_nonce() {
        let topics = [address(kinds::STREAM_STATE, 42), address(kinds::STREAM_UPDATE, 42)];
        let frame = ClientFrame::listen(&topics, Some("token".to_string()));
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "LISTEN");
        assert_eq!(
            value["data"]["topics"],
            json!(["video-playback-by-id.42", "broadcast-settings-update.42"])
        );
        assert_eq!(value["data"]["auth_token"], "token");
        let nonce = frame.nonce().unwrap();
        assert_eq!(nonce.len(), 32);
        assert_eq!(value["nonce"], nonce);
    }

    #[test]
    fn unlisten_without_token_omits_it() {
        let topics = [address(kinds::STREAM_STATE, 1)];
        let value: serde_json::Value =
            serde_json::from_str(&ClientFrame::unlisten(&topics, None).encode().unwrap()).unwrap();
        assert_eq!(value["type"], "UNLISTEN");
        assert!(value["data"].get("auth_token").is_none());
    }

    #[test]
    fn nonces_are_unique() {
        let a = ClientFrame::listen(&[], None);
        let b = ClientFrame::listen(&[], None);
        assert_ne!(a.nonce(), b.nonce());
    }

    // ---- Inbound ----

    #[test]
    fn decodes_control_frames() {
        assert_eq!(ServerFrame::decode(r#"{"type":"PONG"}"#).unwrap(), ServerFrame::Pong);
        assert_eq!(ServerFrame::decode(r#"{"type":"RECONNECT"}"#).unwrap(), ServerFrame::Reconnect);
    }

    #[test]
    fn response_error_only_when_non_empty() {
        let ok = ServerFrame::decode(r#"{"type":"RESPONSE","nonce":"n1","error":""}"#).unwrap();
        assert!(ok.response_error().is_none());
        let bad = ServerFrame::decode(r#"{"type":"RESPONSE","nonce":"n1","error":"ERR_BADAUTH"}"#).unwrap();
        assert_eq!(bad.response_error(), Some("ERR_BADAUTH"));
    }

    #[test]
    fn message_payload_decodes_on_demand() {
        let frame = ServerFrame::decode(
            r#"{"type":"MESSAGE","data":{"topic":"video-playback-by-id.42","message":"{\"type\":\"viewcount\",\"viewers\":7}"}}"#,
        )
        .unwrap();
        let ServerFrame::Message { data } = frame else {
            panic!("expected MESSAGE");
        };
        assert_eq!(data.topic, "video-playback-by-id.42");
        assert_eq!(data.payload().unwrap(), json!({ "type": "viewcount", "viewers": 7 }));
    }

    #[test]
    fn bad_payload_names_topic() {
        let data = MessageData {
            topic: "presence.1".to_string(),
            message: "{not json".to_string(),
        };
        let err = data.payload().unwrap_err();
        assert!(err.to_string().starts_with("invalid message payload on presence.1"));
    }

    #[test]
    fn unknown_frame_type_rejected() {
        assert!(matches!(ServerFrame::decode(r#"{"type":"WHISPER"}"#), Err(FrameError::Frame(_))));
    }
}
