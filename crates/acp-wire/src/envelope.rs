use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// Numeric JSON-RPC id, scoped to a single connection. Zero is reserved to
/// mean "could not be parsed" and is never assigned to a real call.
pub type RequestId = u64;

/// Sentinel id used internally when a response's `id` field could not be
/// read as a non-negative integer.
pub const UNPARSEABLE_ID: RequestId = 0;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Largest line the wire codec will attempt to parse before rejecting it
/// outright as oversized.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// `{code, message, data?}` per JSON-RPC 2.0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, detail.into())
    }
}

/// A raw JSON-RPC 2.0 message, in either direction. Field presence, not a
/// tag, determines whether this is a request, a notification, or a response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

fn version() -> String {
    "2.0".to_string()
}

impl Envelope {
    pub fn request(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: version(),
            id: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn response_ok(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn response_err(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id),
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    /// Structural classification: method+id => request, method+no id =>
    /// notification, no method+id => response.
    pub fn classify(&self) -> Result<Classified<'_>, WireError> {
        match (&self.method, self.id) {
            (Some(method), Some(id)) => Ok(Classified::Request {
                id,
                method,
                params: self.params.as_ref(),
            }),
            (Some(method), None) => Ok(Classified::Notification {
                method,
                params: self.params.as_ref(),
            }),
            (None, Some(id)) => Ok(Classified::Response {
                id,
                result: self.result.as_ref(),
                error: self.error.as_ref(),
            }),
            (None, None) => Err(WireError::Unclassifiable),
        }
    }
}

#[derive(Debug)]
pub enum Classified<'a> {
    Request {
        id: RequestId,
        method: &'a str,
        params: Option<&'a Value>,
    },
    Notification {
        method: &'a str,
        params: Option<&'a Value>,
    },
    Response {
        id: RequestId,
        result: Option<&'a Value>,
        error: Option<&'a ErrorObject>,
    },
}

/// Parses one newline-delimited frame. Empty (or whitespace-only) lines
/// decode to `Ok(None)` and are silently skipped by the caller; oversized or
/// malformed lines are an error the caller logs and discards without
/// tearing down the stream.
pub fn decode_frame(line: &str) -> Result<Option<Envelope>, WireError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line.len() > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge {
            size: line.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    let envelope: Envelope = serde_json::from_str(line)?;
    Ok(Some(envelope))
}

/// Serializes a frame as a single line terminated by exactly one `\n`, with
/// no trailing whitespace beyond that newline.
pub fn encode_frame(envelope: &Envelope) -> Result<String, WireError> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_request() {
        let env = Envelope::request(1, "initialize", serde_json::json!({}));
        match env.classify().unwrap() {
            Classified::Request { id, method, .. } => {
                assert_eq!(id, 1);
                assert_eq!(method, "initialize");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let env = Envelope::notification("session/cancel", serde_json::json!({"id": 3}));
        assert!(matches!(
            env.classify().unwrap(),
            Classified::Notification { .. }
        ));
    }

    #[test]
    fn classifies_response() {
        let env = Envelope::response_ok(2, serde_json::json!({"ok": true}));
        match env.classify().unwrap() {
            Classified::Response { id, result, error } => {
                assert_eq!(id, 2);
                assert!(result.is_some());
                assert!(error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn empty_line_is_skipped() {
        assert!(decode_frame("   ").unwrap().is_none());
        assert!(decode_frame("").unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let huge = "x".repeat(MAX_FRAME_BYTES + 1);
        assert!(matches!(
            decode_frame(&huge),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn encode_ends_with_single_newline() {
        let env = Envelope::notification("ping", Value::Null);
        let line = encode_frame(&env).unwrap();
        assert!(line.ends_with('\n'));
        assert!(!line.ends_with("\n\n"));
    }

    #[test]
    fn round_trips_through_json() {
        let original = Envelope::request(42, "session/prompt", serde_json::json!({"x": 1}));
        let encoded = encode_frame(&original).unwrap();
        let decoded = decode_frame(encoded.trim_end()).unwrap().unwrap();
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.method, original.method);
        assert_eq!(decoded.params, original.params);
    }
}
