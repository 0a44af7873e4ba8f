use crate::cache::{cache_key, ResponseCache};
use crate::forwarder::RetryForwarder;
use axum::http::StatusCode;
use evmrelay_common::{RpcError, RpcRequest, RpcResponse};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Body of a `/rpc` reply: one envelope, or one envelope per batch
/// element in input order.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RpcPayload {
    Single(RpcResponse),
    Batch(Vec<RpcResponse>),
}

/// Request intake and dispatch pipeline.
///
/// The router owns everything between raw body bytes and a response
/// payload: the size and parse guards, the `{}` probe handshake, shape
/// validation with batch iteration, the local chain-identity shortcut,
/// the response cache, and the forwarder invocation. Framing errors are
/// produced here and never reach the dispatch core.
pub struct RelayRouter {
    forwarder: RetryForwarder,
    cache: Arc<RwLock<ResponseCache>>,
    max_request_size: usize,
    chain_id_hex: String,
    net_version: String,
}

impl RelayRouter {
    pub fn new(
        forwarder: RetryForwarder,
        cache: Arc<RwLock<ResponseCache>>,
        max_request_size: usize,
        chain_id_hex: String,
        net_version: String,
    ) -> Self {
        Self {
            forwarder,
            cache,
            max_request_size,
            chain_id_hex,
            net_version,
        }
    }

    /// Process one `/rpc` POST body into a status and payload.
    pub async fn handle(&self, body: &[u8]) -> (StatusCode, RpcPayload) {
        if body.len() > self.max_request_size {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                RpcPayload::Single(RpcResponse::error(
                    Value::Null,
                    RpcError::request_too_large(),
                )),
            );
        }

        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    RpcPayload::Single(RpcResponse::error(Value::Null, RpcError::parse_error())),
                )
            }
        };

        match parsed {
            // `{}` is the probe handshake some client libraries open
            // with; answer it as a synthetic chain-id query
            Value::Object(map) if map.is_empty() => (
                StatusCode::OK,
                RpcPayload::Single(RpcResponse::success(
                    Value::from(1),
                    Value::String(self.chain_id_hex.clone()),
                )),
            ),
            Value::Object(map) => match validate_envelope(map) {
                Ok(request) => (
                    StatusCode::OK,
                    RpcPayload::Single(self.process(request).await),
                ),
                Err(error_response) => (StatusCode::BAD_REQUEST, RpcPayload::Single(error_response)),
            },
            Value::Array(items) if items.is_empty() => (
                StatusCode::BAD_REQUEST,
                RpcPayload::Single(RpcResponse::error(Value::Null, RpcError::invalid_request())),
            ),
            Value::Array(items) => {
                let mut responses = Vec::with_capacity(items.len());
                for item in items {
                    let response = match item {
                        Value::Object(map) => match validate_envelope(map) {
                            Ok(request) => self.process(request).await,
                            Err(error_response) => error_response,
                        },
                        _ => RpcResponse::error(Value::Null, RpcError::invalid_request()),
                    };
                    responses.push(response);
                }
                (StatusCode::OK, RpcPayload::Batch(responses))
            }
            _ => (
                StatusCode::BAD_REQUEST,
                RpcPayload::Single(RpcResponse::error(Value::Null, RpcError::parse_error())),
            ),
        }
    }

    /// Run one valid envelope through the pipeline: local shortcut, cache
    /// lookup, upstream forward, cache store.
    async fn process(&self, request: RpcRequest) -> RpcResponse {
        match request.method.as_str() {
            "eth_chainId" => {
                return RpcResponse::success(
                    request.id,
                    Value::String(self.chain_id_hex.clone()),
                )
            }
            "net_version" => {
                return RpcResponse::success(request.id, Value::String(self.net_version.clone()))
            }
            _ => {}
        }

        let key = cache_key(&request.method, &request.params);
        if let Some(mut cached) = self.cache.write().await.get(&key) {
            cached.id = request.id.clone();
            return cached;
        }

        let response = self.forwarder.forward(&request).await;
        self.cache.write().await.insert(key, &response);
        response
    }
}

/// Validate one envelope object: `jsonrpc` and `method` must be present,
/// `method` a string. The id is echoed into the error envelope when the
/// shape is bad, and `params: null` is folded into absent params.
fn validate_envelope(map: Map<String, Value>) -> Result<RpcRequest, RpcResponse> {
    let id = map.get("id").cloned().unwrap_or(Value::Null);

    let jsonrpc = match map.get("jsonrpc") {
        Some(Value::String(v)) => v.clone(),
        _ => return Err(RpcResponse::error(id, RpcError::invalid_request())),
    };
    let method = match map.get("method") {
        Some(Value::String(m)) if !m.is_empty() => m.clone(),
        _ => return Err(RpcResponse::error(id, RpcError::invalid_request())),
    };
    let params = map.get("params").cloned().filter(|p| !p.is_null());

    Ok(RpcRequest {
        jsonrpc,
        method,
        params,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_envelope() {
        let req = validate_envelope(envelope(json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1
        })))
        .unwrap();
        assert_eq!(req.method, "eth_blockNumber");
        assert_eq!(req.params, Some(json!([])));
        assert_eq!(req.id, json!(1));
    }

    #[test]
    fn test_validate_rejects_missing_method() {
        let err = validate_envelope(envelope(json!({"jsonrpc": "2.0", "id": 7}))).unwrap_err();
        assert_eq!(err.id, json!(7));
        assert_eq!(err.error.unwrap().code, -32600);
    }

    #[test]
    fn test_validate_rejects_missing_jsonrpc() {
        let err =
            validate_envelope(envelope(json!({"method": "eth_blockNumber", "id": "x"})))
                .unwrap_err();
        assert_eq!(err.id, json!("x"));
        assert_eq!(err.error.unwrap().code, -32600);
    }

    #[test]
    fn test_validate_echoes_null_id_when_absent() {
        let err = validate_envelope(envelope(json!({"method": "m"}))).unwrap_err();
        assert_eq!(err.id, Value::Null);
    }

    #[test]
    fn test_validate_folds_null_params() {
        let req = validate_envelope(envelope(json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": null,
            "id": 1
        })))
        .unwrap();
        assert!(req.params.is_none());
    }

    #[test]
    fn test_validate_rejects_non_string_method() {
        let err = validate_envelope(envelope(json!({
            "jsonrpc": "2.0",
            "method": 5,
            "id": 1
        })))
        .unwrap_err();
        assert_eq!(err.error.unwrap().code, -32600);
    }
}
