use crate::dispatcher::UpstreamDispatcher;
use crate::registry::EndpointRegistry;
use crate::stats::GlobalStats;
use evmrelay_common::classify::ErrorClass;
use evmrelay_common::{RpcError, RpcRequest, RpcResponse};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Retry orchestration over the selector and the dispatcher.
///
/// Each client request gets one primary attempt on the round-robin pick.
/// Only endpoint-failure outcomes are retried, sequentially, on up to
/// `max_retry_attempts` alternative endpoints; an application RPC error
/// reflects the request's own semantics and would be identical anywhere,
/// so it goes straight back to the client. Total upstream attempts per
/// request are bounded by `1 + max_retry_attempts`.
pub struct RetryForwarder {
    registry: Arc<RwLock<EndpointRegistry>>,
    dispatcher: UpstreamDispatcher,
    stats: Arc<RwLock<GlobalStats>>,
    max_retry_attempts: usize,
}

impl RetryForwarder {
    pub fn new(
        registry: Arc<RwLock<EndpointRegistry>>,
        dispatcher: UpstreamDispatcher,
        stats: Arc<RwLock<GlobalStats>>,
        max_retry_attempts: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            stats,
            max_retry_attempts,
        }
    }

    /// Forward a client request, retrying on alternates where warranted,
    /// and settle the global counters on the final delivered response.
    pub async fn forward(&self, request: &RpcRequest) -> RpcResponse {
        self.stats.write().await.record_request();

        let primary = self.registry.write().await.primary_pick();
        let Some(primary) = primary else {
            self.stats.write().await.record_proxy_error();
            return RpcResponse::error(
                request.id.clone(),
                RpcError::internal_error("no upstream endpoints configured"),
            );
        };

        let mut outcome = self.dispatcher.dispatch(request, &primary).await;

        if outcome.failure == Some(ErrorClass::EndpointFailure) && self.max_retry_attempts > 0 {
            let alternates = self
                .registry
                .read()
                .await
                .retry_picks(&primary, self.max_retry_attempts);

            for url in alternates {
                debug!(
                    method = %request.method,
                    "retrying on {} after endpoint failure on {}",
                    url, primary
                );
                let retried = self.dispatcher.dispatch(request, &url).await;
                let delivered = retried.failure.is_none();
                outcome = retried;
                if delivered {
                    break;
                }
            }
        }

        {
            let mut stats = self.stats.write().await;
            match outcome.failure {
                None => stats.record_success(),
                Some(ErrorClass::RpcError) => stats.record_rpc_error(),
                Some(ErrorClass::EndpointFailure) => stats.record_proxy_error(),
            }
        }

        outcome.response
    }
}
