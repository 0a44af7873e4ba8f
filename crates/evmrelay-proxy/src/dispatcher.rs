use crate::registry::EndpointRegistry;
use evmrelay_common::classify::{classify_rpc_error, ErrorClass};
use evmrelay_common::{RelayError, RpcError, RpcRequest, RpcResponse};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// User-Agent sent on every upstream request.
pub const USER_AGENT: &str = concat!("evmrelay/", env!("CARGO_PKG_VERSION"));

/// Outcome of a single upstream attempt.
///
/// `failure` carries the attempt's classification: `None` for a clean
/// result, `Some(RpcError)` when the upstream answered with an
/// application-level error (delivered verbatim, never retried), and
/// `Some(EndpointFailure)` for provider-attributable failures, which feed
/// the retry policy.
pub struct DispatchOutcome {
    pub response: RpcResponse,
    pub failure: Option<ErrorClass>,
}

impl DispatchOutcome {
    fn success(response: RpcResponse) -> Self {
        Self {
            response,
            failure: None,
        }
    }

    fn rpc_error(response: RpcResponse) -> Self {
        Self {
            response,
            failure: Some(ErrorClass::RpcError),
        }
    }

    fn endpoint_failure(response: RpcResponse) -> Self {
        Self {
            response,
            failure: Some(ErrorClass::EndpointFailure),
        }
    }
}

/// Single-attempt upstream forwarder.
///
/// One shared reqwest client serves every endpoint; HTTP/1.1 keep-alive
/// gives connection reuse per upstream, and each attempt carries its own
/// deadline. `dispatch` never fails: every exit path produces a
/// well-formed response envelope, and the endpoint's in-flight counter is
/// released on all of them.
pub struct UpstreamDispatcher {
    client: reqwest::Client,
    registry: Arc<RwLock<EndpointRegistry>>,
    timeout: Duration,
}

impl UpstreamDispatcher {
    pub fn new(
        registry: Arc<RwLock<EndpointRegistry>>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            registry,
            timeout,
        })
    }

    /// Forward `request` to `url` and settle the endpoint's health from
    /// the result.
    pub async fn dispatch(&self, request: &RpcRequest, url: &str) -> DispatchOutcome {
        self.registry.write().await.begin_dispatch(url);
        let started = Instant::now();
        let outcome = self.attempt(request, url, started).await;
        self.registry.write().await.end_dispatch(url);
        outcome
    }

    async fn attempt(&self, request: &RpcRequest, url: &str, started: Instant) -> DispatchOutcome {
        let sent = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .timeout(self.timeout)
            .send()
            .await;

        let http_response = match sent {
            Ok(r) => r,
            Err(e) => return self.transport_failure(request, url, &e).await,
        };

        let status = http_response.status();
        if !status.is_success() {
            debug!("upstream {} answered HTTP {}", url, status);
            self.registry.write().await.record_failure(url);
            return DispatchOutcome::endpoint_failure(RpcResponse::error(
                request.id.clone(),
                RpcError::internal_error(format!("upstream returned HTTP {}", status)),
            ));
        }

        let body = match http_response.json::<RpcResponse>().await {
            Ok(b) => b,
            Err(e) => return self.transport_failure(request, url, &e).await,
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let failure_class = body.error.as_ref().map(classify_rpc_error);

        match failure_class {
            Some(ErrorClass::EndpointFailure) => {
                if let Some(err) = &body.error {
                    debug!(
                        "upstream {} returned endpoint-failure error: {}",
                        url, err.message
                    );
                }
                self.registry.write().await.record_failure(url);
                DispatchOutcome::endpoint_failure(normalize(body, request))
            }
            Some(ErrorClass::RpcError) => {
                // an application-level error is still a working provider
                self.registry.write().await.record_success(url, latency_ms);
                DispatchOutcome::rpc_error(normalize(body, request))
            }
            None => {
                self.registry.write().await.record_success(url, latency_ms);
                DispatchOutcome::success(normalize(body, request))
            }
        }
    }

    /// Settle a transport-layer failure: connect errors, elapsed
    /// deadlines, and unparseable bodies all demote the endpoint without
    /// consulting the classifier.
    async fn transport_failure(
        &self,
        request: &RpcRequest,
        url: &str,
        error: &reqwest::Error,
    ) -> DispatchOutcome {
        debug!("dispatch to {} failed: {}", url, error);
        self.registry.write().await.record_failure(url);
        let rpc_error = if error.is_timeout() {
            RpcError::upstream_timeout(error.to_string())
        } else {
            RpcError::internal_error(error.to_string())
        };
        DispatchOutcome::endpoint_failure(RpcResponse::error(request.id.clone(), rpc_error))
    }
}

/// Normalize an upstream envelope before it goes back to the client:
/// protocol version pinned to "2.0", the caller's id restored verbatim,
/// and exactly one of `result`/`error` (`error` wins if an upstream sent
/// both; a missing pair becomes `result: null`).
fn normalize(body: RpcResponse, request: &RpcRequest) -> RpcResponse {
    match body.error {
        Some(error) => RpcResponse::error(request.id.clone(), error),
        None => RpcResponse::success(request.id.clone(), body.result.unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> RpcRequest {
        RpcRequest::new("eth_blockNumber", Some(json!([])), json!(42))
    }

    #[test]
    fn test_normalize_restores_request_id() {
        let upstream = RpcResponse::success(json!(999), json!("0x10"));
        let out = normalize(upstream, &request());
        assert_eq!(out.id, json!(42));
        assert_eq!(out.result, Some(json!("0x10")));
    }

    #[test]
    fn test_normalize_error_wins_over_result() {
        let upstream = RpcResponse {
            jsonrpc: "2.0".into(),
            id: json!(1),
            result: Some(json!("0x10")),
            error: Some(RpcError::internal_error("both present")),
        };
        let out = normalize(upstream, &request());
        assert!(out.result.is_none());
        assert!(out.error.is_some());
    }

    #[test]
    fn test_normalize_missing_pair_becomes_null_result() {
        let upstream = RpcResponse {
            jsonrpc: "2.0".into(),
            id: json!(1),
            result: None,
            error: None,
        };
        let out = normalize(upstream, &request());
        assert_eq!(out.result, Some(Value::Null));
        assert!(out.error.is_none());
    }

    #[test]
    fn test_normalize_null_request_id_round_trips() {
        let req = RpcRequest::new("eth_blockNumber", None, Value::Null);
        let upstream = RpcResponse::success(json!(1), json!("0x1"));
        let out = normalize(upstream, &req);
        assert_eq!(out.id, Value::Null);
    }
}
