use serde::{Deserialize, Serialize};

use crate::protocol::requests::RequestId;
use crate::protocol::status::Code;
use crate::transport::TransportError;

/// Response frame sent by a node.
///
/// A unary call is answered by exactly one frame. A streaming call is answered
/// by zero or more item frames followed by one frame with `end_of_stream` set;
/// a non-OK `code` on any frame ends the call with that code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallResponse {
    pub id: RequestId,
    pub code: Code,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub end_of_stream: bool,
}

impl CallResponse {
    /// Unary success, or a single item of a stream.
    pub fn success(id: RequestId, payload: serde_json::Value) -> Self {
        CallResponse {
            id,
            code: Code::Ok,
            message: None,
            payload: Some(payload),
            end_of_stream: false,
        }
    }

    /// Clean end of a stream.
    pub fn end(id: RequestId) -> Self {
        CallResponse {
            id,
            code: Code::Ok,
            message: None,
            payload: None,
            end_of_stream: true,
        }
    }

    pub fn error(id: RequestId, code: Code, message: impl Into<String>) -> Self {
        CallResponse {
            id,
            code,
            message: Some(message.into()),
            payload: None,
            end_of_stream: true,
        }
    }

    pub fn into_result(self) -> Result<serde_json::Value, TransportError> {
        if self.code == Code::Ok {
            Ok(self.payload.unwrap_or(serde_json::Value::Null))
        } else {
            Err(TransportError::new(
                self.code,
                self.message.unwrap_or_default(),
            ))
        }
    }
}
