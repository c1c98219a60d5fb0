use crate::protocol::error::Result;
use crate::protocol::{CallRequest, CallResponse};

/// JSON codec for call frames.
///
/// # Example
///
/// ```
/// use ledgerpc_common::transport::JsonCodec;
/// use ledgerpc_common::CallRequest;
/// use serde_json::json;
///
/// let request = CallRequest::unary("proto.CryptoService/cryptoGetBalance", json!({"n": 42}));
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// let decoded = JsonCodec::decode_request(&encoded).unwrap();
/// assert_eq!(request, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &CallRequest) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<CallRequest> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &CallResponse) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<CallResponse> {
        Ok(serde_json::from_slice(data)?)
    }
}
