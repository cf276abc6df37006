//! MessagePack envelope shared between producers and this worker.
//!
//! Both record shapes travel as schema-less **named maps**: field names are
//! part of the payload, so a producer can add fields without breaking older
//! readers of the fields that remain. No compression and no version tag are
//! applied. The flip side is that renaming or retyping a field is a breaking
//! change detected only at decode time.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{TranscriptionRequest, TranscriptionResult};

/// MIME type advertised when an encoded record is sent over HTTP.
pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CodecError {
    /// The byte stream did not parse into the expected field set.
    /// Covers truncated input, non-map payloads, missing fields, unknown
    /// fields and type mismatches; a record is never partially populated.
    MalformedMessage(String),
    /// A record failed to serialize. Practically unreachable for these
    /// shapes, surfaced rather than swallowed.
    Encode(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedMessage(msg) => write!(f, "malformed message: {msg}"),
            Self::Encode(msg) => write!(f, "encode failed: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

// ── Public API ─────────────────────────────────────────────────────────────────

pub fn encode_request(request: &TranscriptionRequest) -> Result<Vec<u8>, CodecError> {
    encode(request)
}

pub fn decode_request(data: &[u8]) -> Result<TranscriptionRequest, CodecError> {
    decode(data)
}

pub fn encode_result(result: &TranscriptionResult) -> Result<Vec<u8>, CodecError> {
    encode(result)
}

pub fn decode_result(data: &[u8]) -> Result<TranscriptionResult, CodecError> {
    decode(data)
}

// ── Internals ──────────────────────────────────────────────────────────────────

/// `to_vec_named` keeps field names in the payload (map encoding) instead of
/// the positional array encoding, which is what makes additive schema
/// changes backward-readable.
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    rmp_serde::from_slice(data).map_err(|e| CodecError::MalformedMessage(e.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let request = TranscriptionRequest {
            request_id: "req-42".to_string(),
            fp: "/tmp/a.wav".to_string(),
        };

        let bytes = encode_request(&request).unwrap();
        let decoded = decode_request(&bytes).unwrap();

        assert_eq!(decoded, request);
    }

    #[test]
    fn result_round_trip() {
        let result = TranscriptionResult::new("req-42", "hello world");

        let bytes = encode_result(&result).unwrap();
        let decoded = decode_result(&bytes).unwrap();

        assert_eq!(decoded, result);
    }

    #[test]
    fn result_round_trip_empty_transcription() {
        let result = TranscriptionResult::new("silent", "");

        let bytes = encode_result(&result).unwrap();
        assert_eq!(decode_result(&bytes).unwrap(), result);
    }

    #[test]
    fn field_names_are_on_the_wire() {
        let request = TranscriptionRequest {
            request_id: "r".to_string(),
            fp: "/f".to_string(),
        };

        let bytes = encode_request(&request).unwrap();
        let haystack = String::from_utf8_lossy(&bytes);

        assert!(haystack.contains("request_id"));
        assert!(haystack.contains("fp"));
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        let err = decode_request(b"\xff\xff\xff not msgpack").unwrap_err();
        assert!(matches!(err, CodecError::MalformedMessage(_)));
    }

    #[test]
    fn missing_field_is_malformed() {
        // A valid map, but only one of the two required fields.
        #[derive(serde::Serialize)]
        struct Partial<'a> {
            request_id: &'a str,
        }

        let bytes = rmp_serde::to_vec_named(&Partial { request_id: "r1" }).unwrap();
        let err = decode_request(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::MalformedMessage(_)));
    }

    #[test]
    fn unknown_field_is_malformed() {
        #[derive(serde::Serialize)]
        struct Extended<'a> {
            request_id: &'a str,
            fp: &'a str,
            priority: u32,
        }

        let bytes = rmp_serde::to_vec_named(&Extended {
            request_id: "r1",
            fp: "/tmp/a.wav",
            priority: 7,
        })
        .unwrap();

        let err = decode_request(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::MalformedMessage(_)));
    }

    #[test]
    fn type_mismatch_is_malformed() {
        #[derive(serde::Serialize)]
        struct WrongType<'a> {
            request_id: u64,
            fp: &'a str,
        }

        let bytes = rmp_serde::to_vec_named(&WrongType {
            request_id: 17,
            fp: "/tmp/a.wav",
        })
        .unwrap();

        let err = decode_request(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::MalformedMessage(_)));
    }
}
