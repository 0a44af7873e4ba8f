//! JSON-RPC 2.0 Envelope Types
//!
//! Request and response envelopes plus the proxy's error-code table.
//!
//! # Error Codes
//!
//! Standard JSON-RPC 2.0 codes, plus one proxy-specific code:
//! - `-32700`: Parse error (also used for oversized bodies)
//! - `-32600`: Invalid request (missing `jsonrpc` or `method`)
//! - `-32601`: Method not allowed (non-POST requests to the RPC path)
//! - `-32603`: Internal error (upstream failure, generic)
//! - `-32050`: Upstream request timeout
//!
//! # Field Order
//!
//! Responses serialize as `jsonrpc`, `id`, then `result` or `error`.
//! serde_json emits struct fields in declaration order and the absent
//! member of the `result`/`error` pair is skipped, so the declaration
//! below IS the wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request envelope.
///
/// `params` is optional per JSON-RPC 2.0; `id` may be a number, a string, or
/// null, and is preserved verbatim through the whole proxy pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Name of the method to invoke
    pub method: String,
    /// Parameter values (array or object, or omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier (number, string, or null)
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC 2.0 response envelope.
///
/// Exactly one of `result`/`error` is present; the absent one is skipped
/// during serialization so clients always see a single payload member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Request identifier, echoed from the request
    pub id: Value,
    /// Result value on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    /// Error code (standard codes are negative integers)
    pub code: i32,
    /// Short description of the error
    pub message: String,
    /// Additional data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Invalid JSON was received, or the body was oversized
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i32 = -32600;
/// Non-POST HTTP method on the RPC path
pub const METHOD_NOT_ALLOWED: i32 = -32601;
/// Upstream failure or other internal error
pub const INTERNAL_ERROR: i32 = -32603;
/// Upstream attempt exceeded its deadline
pub const UPSTREAM_TIMEOUT: i32 = -32050;

impl RpcRequest {
    /// Create a request envelope.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl RpcError {
    /// Parse error (-32700): the body was not valid JSON.
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Parse error".into(),
            data: None,
        }
    }

    /// Parse error (-32700) variant for bodies over the size limit.
    pub fn request_too_large() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Request too large".into(),
            data: None,
        }
    }

    /// Invalid request (-32600): missing `jsonrpc` or `method`.
    pub fn invalid_request() -> Self {
        Self {
            code: INVALID_REQUEST,
            message: "Invalid Request".into(),
            data: None,
        }
    }

    /// Method not allowed (-32601): non-POST on the RPC path.
    pub fn method_not_allowed() -> Self {
        Self {
            code: METHOD_NOT_ALLOWED,
            message: "Method not allowed".into(),
            data: None,
        }
    }

    /// Internal error (-32603), with the underlying failure text in `data`.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: "Internal error".into(),
            data: Some(Value::String(detail.into())),
        }
    }

    /// Upstream timeout (-32050), with the underlying failure text in `data`.
    pub fn upstream_timeout(detail: impl Into<String>) -> Self {
        Self {
            code: UPSTREAM_TIMEOUT,
            message: "Request timeout".into(),
            data: Some(Value::String(detail.into())),
        }
    }
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// True when the envelope carries a result rather than an error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_field_order() {
        let res = RpcResponse::success(json!(1), json!("0x10"));
        let serialized = serde_json::to_string(&res).unwrap();
        assert_eq!(serialized, r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#);

        let res = RpcResponse::error(json!("abc"), RpcError::parse_error());
        let serialized = serde_json::to_string(&res).unwrap();
        assert_eq!(
            serialized,
            r#"{"jsonrpc":"2.0","id":"abc","error":{"code":-32700,"message":"Parse error"}}"#
        );
    }

    #[test]
    fn test_response_single_payload_member() {
        let ok = serde_json::to_string(&RpcResponse::success(json!(1), json!(null))).unwrap();
        assert!(ok.contains("\"result\""));
        assert!(!ok.contains("\"error\""));

        let err =
            serde_json::to_string(&RpcResponse::error(json!(1), RpcError::invalid_request()))
                .unwrap();
        assert!(err.contains("\"error\""));
        assert!(!err.contains("\"result\""));
    }

    #[test]
    fn test_request_missing_id_defaults_to_null() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"eth_blockNumber"}"#).unwrap();
        assert_eq!(req.id, Value::Null);
        assert!(req.params.is_none());
    }

    #[test]
    fn test_request_serialization_skips_absent_params() {
        let req = RpcRequest::new("eth_chainId", None, json!(7));
        let serialized = serde_json::to_string(&req).unwrap();
        assert_eq!(serialized, r#"{"jsonrpc":"2.0","method":"eth_chainId","id":7}"#);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::parse_error().code, -32700);
        assert_eq!(RpcError::request_too_large().code, -32700);
        assert_eq!(RpcError::invalid_request().code, -32600);
        assert_eq!(RpcError::method_not_allowed().code, -32601);
        assert_eq!(RpcError::internal_error("x").code, -32603);
        assert_eq!(RpcError::upstream_timeout("x").code, -32050);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(RpcError::parse_error().message, "Parse error");
        assert_eq!(RpcError::request_too_large().message, "Request too large");
        assert_eq!(RpcError::invalid_request().message, "Invalid Request");
        assert_eq!(RpcError::method_not_allowed().message, "Method not allowed");
        assert_eq!(RpcError::internal_error("x").message, "Internal error");
        assert_eq!(RpcError::upstream_timeout("x").message, "Request timeout");
    }

    #[test]
    fn test_upstream_error_deserialization() {
        let body = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"rate limit exceeded"}}"#;
        let res: RpcResponse = serde_json::from_str(body).unwrap();
        assert!(res.result.is_none());
        let err = res.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "rate limit exceeded");
        assert_eq!(err.data, None);
    }

    #[test]
    fn test_upstream_response_with_string_id() {
        let body = r#"{"jsonrpc":"2.0","id":"req-9","result":"0xabc"}"#;
        let res: RpcResponse = serde_json::from_str(body).unwrap();
        assert!(res.is_success());
        assert_eq!(res.id, json!("req-9"));
    }
}
