//! Frame codec.
//!
//! Turns raw transport frames into [`Decoded`] values and client messages
//! into frames. The connection manager only sees the [`MessageCodec`]
//! trait, so payload encodings can change without touching it.
//!
//! # Accepted Frames
//!
//! | Shape | Result |
//! |-------|--------|
//! | `{"type":"ping"}` | [`Decoded::Ping`] |
//! | `{"type":"pong"}` | [`Decoded::Pong`] |
//! | `{"type":"subscribed"}` (and other acks) | [`Decoded::Control`] |
//! | `{"type":"<topic>_batch","items":[...]}` | one message per item |
//! | `{"type":"<topic>","data":...}` | one message |
//! | `{"topic":"<topic>","data":"<hex/base64 gzip>"}` | one message, payload inflated |
//! | binary frame (gzip or zlib) | inflated, then decoded as text |

// ============================================================================
// Imports
// ============================================================================

use std::time::SystemTime;

use serde_json::{Map, Value, from_str, to_string};

use crate::error::{Error, Result};
use crate::transport::Frame;

use super::compression::{decode_compressed_text, inflate_to_string};
use super::message::{ClientMessage, Message};

// ============================================================================
// Constants
// ============================================================================

/// Suffix marking a batched update frame.
const BATCH_SUFFIX: &str = "_batch";

/// Frame types acknowledged by the server that carry no data for consumers.
const ACK_TYPES: &[&str] = &["subscribed", "unsubscribed", "connected", "keepalive"];

// ============================================================================
// Decoded
// ============================================================================

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Topic updates to fan out, in frame order.
    Messages(Vec<Message>),
    /// Server liveness probe; must be answered with a pong.
    Ping,
    /// Answer to our own ping.
    Pong,
    /// Acknowledgement or other control frame, identified by its type.
    Control(String),
}

// ============================================================================
// MessageCodec
// ============================================================================

/// Converts between transport frames and protocol values.
pub trait MessageCodec: Send + Sync + 'static {
    /// Decodes one inbound frame.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] for malformed frames. Callers drop the frame.
    fn decode(&self, frame: &Frame) -> Result<Decoded>;

    /// Encodes one outbound message.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if the message cannot be serialized.
    fn encode(&self, message: &ClientMessage) -> Result<Frame>;
}

// ============================================================================
// JsonCodec
// ============================================================================

/// Default codec: JSON text frames with optional compressed payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn decode(&self, frame: &Frame) -> Result<Decoded> {
        match frame {
            Frame::Text(text) => self.decode_text(text),
            Frame::Binary(bytes) => {
                let text = inflate_to_string(bytes)?;
                self.decode_text(&text)
            }
        }
    }

    fn encode(&self, message: &ClientMessage) -> Result<Frame> {
        Ok(Frame::Text(to_string(message)?))
    }
}

impl JsonCodec {
    fn decode_text(&self, text: &str) -> Result<Decoded> {
        let value: Value =
            from_str(text).map_err(|e| Error::decode(format!("invalid JSON: {e}")))?;

        let Value::Object(mut object) = value else {
            return Err(Error::decode("frame is not a JSON object"));
        };

        let received_at = SystemTime::now();

        let kind = match object.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(Error::decode(format!("frame type is not a string: {other}")));
            }
            None => return Self::decode_topic_frame(object, received_at),
        };

        match kind.as_str() {
            "ping" => return Ok(Decoded::Ping),
            "pong" => return Ok(Decoded::Pong),
            k if ACK_TYPES.contains(&k) => return Ok(Decoded::Control(kind)),
            "" => return Err(Error::decode("frame type is empty")),
            _ => {}
        }

        if let Some(topic) = kind.strip_suffix(BATCH_SUFFIX)
            && !topic.is_empty()
            && let Some(Value::Array(items)) = object.remove("items")
        {
            let messages = items
                .into_iter()
                .map(|payload| envelope(topic, payload, received_at))
                .collect();
            return Ok(Decoded::Messages(messages));
        }

        let payload = match object.remove("data") {
            Some(data) => data,
            None => Value::Object(object),
        };

        Ok(Decoded::Messages(vec![envelope(&kind, payload, received_at)]))
    }

    /// Handles the `{topic, data}` shape used for compressed payloads.
    fn decode_topic_frame(
        mut object: Map<String, Value>,
        received_at: SystemTime,
    ) -> Result<Decoded> {
        let topic = match object.remove("topic") {
            Some(Value::String(topic)) if !topic.is_empty() => topic,
            _ => return Err(Error::decode("frame has neither type nor topic")),
        };

        let payload = match object.remove("data") {
            Some(Value::String(encoded)) => {
                let text = decode_compressed_text(&encoded)?;
                from_str(&text)
                    .map_err(|e| Error::decode(format!("inflated payload is not JSON: {e}")))?
            }
            Some(plain) => plain,
            None => return Err(Error::decode(format!("frame for {topic} has no data"))),
        };

        Ok(Decoded::Messages(vec![envelope(&topic, payload, received_at)]))
    }
}

#[inline]
fn envelope(topic: &str, payload: Value, received_at: SystemTime) -> Message {
    Message {
        topic: topic.to_owned(),
        payload,
        received_at,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;

    use crate::protocol::ControlMessage;

    fn text(value: Value) -> Frame {
        Frame::Text(value.to_string())
    }

    fn decode(value: Value) -> Decoded {
        JsonCodec.decode(&text(value)).unwrap()
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn messages(decoded: Decoded) -> Vec<Message> {
        match decoded {
            Decoded::Messages(messages) => messages,
            other => panic!("expected messages, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_update() {
        let decoded = decode(json!({ "type": "metrics_update", "data": { "cpu": 42 } }));
        let messages = messages(decoded);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "metrics_update");
        assert_eq!(messages[0].payload, json!({ "cpu": 42 }));
    }

    #[test]
    fn test_update_without_data_uses_remaining_fields() {
        let decoded = decode(json!({
            "type": "security_event",
            "event_id": 7,
            "severity": "high",
        }));
        let messages = messages(decoded);
        assert_eq!(messages[0].payload, json!({ "event_id": 7, "severity": "high" }));
    }

    #[test]
    fn test_batch_expands_in_order() {
        let decoded = decode(json!({
            "type": "logs_batch",
            "items": [{ "n": 1 }, { "n": 2 }, { "n": 3 }],
        }));
        let messages = messages(decoded);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.topic == "logs"));
        let order: Vec<_> = messages
            .iter()
            .map(|m| m.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_suffix_without_items_is_plain_topic() {
        let decoded = decode(json!({ "type": "metrics_batch", "data": [1, 2] }));
        let messages = messages(decoded);
        assert_eq!(messages[0].topic, "metrics_batch");
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(decode(json!({ "type": "ping" })), Decoded::Ping);
        assert_eq!(decode(json!({ "type": "pong" })), Decoded::Pong);
        assert_eq!(
            decode(json!({ "type": "subscribed", "topics": ["a"] })),
            Decoded::Control("subscribed".into())
        );
    }

    #[test]
    fn test_compressed_topic_frame_base64() {
        let data = STANDARD.encode(gzip(r#"{"rows":[1,2]}"#));
        let decoded = decode(json!({ "topic": "cache_stats", "data": data }));
        let messages = messages(decoded);
        assert_eq!(messages[0].topic, "cache_stats");
        assert_eq!(messages[0].payload, json!({ "rows": [1, 2] }));
    }

    #[test]
    fn test_compressed_topic_frame_hex() {
        let data = hex::encode(gzip("[true]"));
        let decoded = decode(json!({ "topic": "flags", "data": data }));
        assert_eq!(messages(decoded)[0].payload, json!([true]));
    }

    #[test]
    fn test_binary_frame() {
        let frame = Frame::Binary(gzip(r#"{"type":"notifications","data":{"count":3}}"#));
        let messages = messages(JsonCodec.decode(&frame).unwrap());
        assert_eq!(messages[0].topic, "notifications");
        assert_eq!(messages[0].payload["count"], 3);
    }

    #[test]
    fn test_malformed_frames() {
        let cases = [
            Frame::Text("{not json".into()),
            Frame::Text("[1,2,3]".into()),
            text(json!({ "type": 5 })),
            text(json!({ "type": "" })),
            text(json!({ "data": 1 })),
            text(json!({ "topic": "x", "data": "%%%" })),
            Frame::Binary(vec![1, 2, 3]),
        ];

        for frame in &cases {
            let err = JsonCodec.decode(frame).unwrap_err();
            assert!(err.is_decode_error(), "{frame:?} -> {err}");
        }
    }

    #[test]
    fn test_encode_control() {
        let frame = JsonCodec
            .encode(&ClientMessage::from(ControlMessage::Pong))
            .unwrap();
        assert_eq!(frame, Frame::Text(r#"{"type":"pong"}"#.into()));
    }
}
