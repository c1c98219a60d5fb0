use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub type RequestId = u64;
pub type MethodName = String;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Shape of the call a [`CallRequest`] opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// One request frame, one response frame.
    Unary,
    /// One request frame, then response frames until `end_of_stream`.
    ServerStreaming,
}

/// Request frame sent to a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRequest {
    pub id: RequestId,
    pub method: MethodName,
    pub kind: CallKind,
    pub payload: serde_json::Value,
    pub timeout_ms: Option<u64>,
}

impl CallRequest {
    pub fn unary(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(method, CallKind::Unary, payload)
    }

    pub fn server_streaming(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(method, CallKind::ServerStreaming, payload)
    }

    fn new(method: impl Into<String>, kind: CallKind, payload: serde_json::Value) -> Self {
        CallRequest {
            id: generate_request_id(),
            method: method.into(),
            kind,
            payload,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    // upper 32 bits from the clock, lower 32 bits from the counter
    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}
