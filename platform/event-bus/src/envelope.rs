//! # Event Envelope
//!
//! The unit of communication between agents: a string `type` tag plus an
//! opaque `data` payload whose shape is implied by the tag.
//!
//! ## Wire format
//!
//! ```json
//! { "type": "testing_result_passed", "data": { "taskId": "task-001" } }
//! ```
//!
//! ## Decode rules
//!
//! - bytes that are not JSON, or JSON that is not an object, are a [`DecodeError`]
//! - an object without a `type` key is a [`DecodeError`]
//! - a `type` that is present but unknown (or not a string) is NOT an error:
//!   the envelope decodes and dispatch treats it as unhandled
//! - a missing `data` key decodes as `null`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed event wrapper carried on the shared queue
///
/// Envelopes are created by a publisher when a business fact becomes true
/// and are never mutated afterwards.
///
/// # Examples
///
/// ```rust
/// use event_bus::{decode, encode, Envelope};
/// use serde_json::json;
///
/// let envelope = Envelope::new("support_ticket_created", json!({"ticketId": "t-1"}));
/// let bytes = encode(&envelope).unwrap();
/// assert_eq!(decode(&bytes).unwrap(), envelope);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event kind; consumers route on this alone
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event-specific payload
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Errors produced when bytes cannot be read as an envelope
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    InvalidStructure(String),

    #[error("message body is not a JSON object")]
    NotAnObject,

    #[error("message body has no `type` field")]
    MissingType,
}

/// Serialize an envelope to its JSON wire form
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(envelope)
}

/// Parse wire bytes into an envelope
///
/// # Errors
///
/// Returns [`DecodeError`] for non-JSON input, non-object JSON, or an object
/// without a `type` key. Never panics on arbitrary input.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidStructure(e.to_string()))?;

    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let event_type = match fields.remove("type") {
        None => return Err(DecodeError::MissingType),
        Some(Value::String(tag)) => tag,
        // Present but not a tag: decodes, and no handler will ever match it
        Some(_) => String::new(),
    };

    let data = fields.remove("data").unwrap_or(Value::Null);

    Ok(Envelope { event_type, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_preserves_envelope() {
        let envelopes = vec![
            Envelope::new("testing_result_passed", json!({"taskId": "task-001"})),
            Envelope::new("documentation_update", json!({
                "documentId": "doc-1",
                "projectId": "project-9",
                "content": "Release notes <b>v2</b>",
                "timestamp": 1_717_171_717_000_i64
            })),
            Envelope::new("some_future_event", Value::Null),
            Envelope::new("", json!([1, 2, 3])),
        ];

        for envelope in envelopes {
            let bytes = encode(&envelope).expect("encode");
            let decoded = decode(&bytes).expect("decode");
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_round_trip_preserves_floats_bit_for_bit() {
        // xorshift64 over raw bit patterns covers subnormals and extreme exponents
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let mut checked = 0;
        while checked < 20_000 {
            let f = f64::from_bits(next());
            if !f.is_finite() {
                continue;
            }
            let g = f64::from_bits(next());
            let g = if g.is_finite() { g } else { 0.5 };

            let envelope = Envelope::new(
                "testing_result_passed",
                json!({
                    "v": f,
                    "nested": {"scores": [f, g, -g], "meta": {"ratio": g / 3.0, "ok": true}},
                }),
            );
            let decoded = decode(&encode(&envelope).unwrap()).unwrap();
            assert_eq!(decoded, envelope, "float {f:e} did not survive the wire");
            assert_eq!(decoded.data["v"].as_f64().map(f64::to_bits), Some(f.to_bits()));
            checked += 1;
        }
    }

    #[test]
    fn test_wire_shape_uses_type_key() {
        let envelope = Envelope::new("internal_comm_message", json!({"employeeId": "e-1"}));
        let value: Value = serde_json::from_slice(&encode(&envelope).unwrap()).unwrap();

        assert_eq!(value["type"], "internal_comm_message");
        assert_eq!(value["data"]["employeeId"], "e-1");
    }

    #[test]
    fn test_decode_rejects_malformed_bytes() {
        let inputs: [&[u8]; 5] = [
            &b""[..],
            &b"not json"[..],
            &b"{\"type\": \"x\""[..],
            &[0xff, 0xfe, 0x00, 0x01][..],
            &b"{'type': 'single_quotes'}"[..],
        ];

        for input in inputs {
            assert!(
                matches!(decode(input), Err(DecodeError::InvalidStructure(_))),
                "expected InvalidStructure for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_decode_rejects_non_object() {
        for input in [&b"[]"[..], &b"42"[..], &b"\"type\""[..], &b"null"[..]] {
            assert!(matches!(decode(input), Err(DecodeError::NotAnObject)));
        }
    }

    #[test]
    fn test_decode_requires_type_key() {
        let result = decode(br#"{"data": {"taskId": "task-001"}}"#);
        assert!(matches!(result, Err(DecodeError::MissingType)));
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let envelope = decode(br#"{"type": "quarterly_report_ready", "data": {}}"#).unwrap();
        assert_eq!(envelope.event_type, "quarterly_report_ready");
    }

    #[test]
    fn test_non_string_type_decodes_as_empty_tag() {
        let envelope = decode(br#"{"type": null, "data": {"a": 1}}"#).unwrap();
        assert_eq!(envelope.event_type, "");
        assert_eq!(envelope.data, json!({"a": 1}));
    }

    #[test]
    fn test_missing_data_decodes_as_null() {
        let envelope = decode(br#"{"type": "new_project_request"}"#).unwrap();
        assert_eq!(envelope.data, Value::Null);
    }
}
