//! HTTP Shell
//!
//! Builds the axum application around the dispatch core and runs it:
//! `POST /rpc` for single and batch JSON-RPC, `GET /health` for the
//! operational report, CORS from configuration, a JSON `-32601` for
//! non-POST methods on the RPC path, and plain-text 404 elsewhere.

use crate::cache::ResponseCache;
use crate::config::RelayConfig;
use crate::dispatcher::UpstreamDispatcher;
use crate::forwarder::RetryForwarder;
use crate::http_router::RelayRouter;
use crate::recovery::{RecoveryConfig, RecoveryScanner};
use crate::registry::{EndpointRegistry, EndpointReport};
use crate::stats::{GlobalStats, StatsReport};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use evmrelay_common::{RelayError, RpcError, RpcResponse};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

/// Shared state behind every handler.
pub struct AppState {
    router: RelayRouter,
    registry: Arc<RwLock<EndpointRegistry>>,
    stats: Arc<RwLock<GlobalStats>>,
    cache: Arc<RwLock<ResponseCache>>,
    config: RelayConfig,
}

/// The assembled proxy: dispatch core, recovery scanner, and HTTP app.
///
/// Construction wires the whole pipeline and spawns the recovery scanner;
/// `run` binds the listener and serves until an interrupt arrives. Must be
/// created inside a tokio runtime.
pub struct RelayServer {
    state: Arc<AppState>,
    /// Keeps the scanner task alive for the server's lifetime
    _scanner_handle: tokio::task::JoinHandle<()>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let registry = Arc::new(RwLock::new(EndpointRegistry::new(
            config.rpc_urls.clone(),
            config.max_concurrent_requests,
        )));
        let stats = Arc::new(RwLock::new(GlobalStats::new()));
        let cache = Arc::new(RwLock::new(ResponseCache::new(
            config.enable_cache,
            config.cache_ttl,
        )));

        let dispatcher = UpstreamDispatcher::new(registry.clone(), config.request_timeout)?;
        let forwarder = RetryForwarder::new(
            registry.clone(),
            dispatcher,
            stats.clone(),
            config.max_retry_attempts,
        );
        let router = RelayRouter::new(
            forwarder,
            cache.clone(),
            config.max_request_size,
            config.chain_id_hex(),
            config.net_version(),
        );

        let scanner = RecoveryScanner::new(registry.clone(), RecoveryConfig::default())?;
        let scanner_handle = scanner.spawn();

        Ok(Self {
            state: Arc::new(AppState {
                router,
                registry,
                stats,
                cache,
                config,
            }),
            _scanner_handle: scanner_handle,
        })
    }

    /// Build the axum application. Exposed separately from `run` so tests
    /// can serve it on an ephemeral listener.
    pub fn app(&self) -> Router {
        Router::new()
            .route(
                "/rpc",
                post(handle_rpc)
                    .options(handle_preflight)
                    .fallback(handle_method_not_allowed),
            )
            .route("/health", get(handle_health))
            .fallback(handle_not_found)
            .layer(cors_layer(&self.state.config))
            .layer(DefaultBodyLimit::disable())
            .with_state(self.state.clone())
    }

    /// Bind and serve until interrupted.
    pub async fn run(self, addr: SocketAddr) -> Result<(), RelayError> {
        let app = self.app();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("failed to bind to {}: {}", addr, e)))?;

        info!(
            "evmrelay listening on {}",
            listener
                .local_addr()
                .map_err(|e| RelayError::Transport(format!("failed to get local addr: {}", e)))?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::Transport(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// CORS layer from the configured origin list. A `*` entry allows any
/// origin; otherwise the configured origins are echoed back on match.
fn cors_layer(config: &RelayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    if config.allows_any_origin() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

async fn handle_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let (status, payload) = state.router.handle(&body).await;
    json_response(status, &payload)
}

async fn handle_preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn handle_method_not_allowed() -> Response {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &RpcResponse::error(Value::Null, RpcError::method_not_allowed()),
    )
}

async fn handle_not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let (endpoints, healthy_endpoints, total_active_requests, current_index) = {
        let registry = state.registry.read().await;
        (
            registry.snapshot(),
            registry.healthy_count(),
            registry.total_active(),
            registry.current_index(),
        )
    };
    let stats = state.stats.read().await.snapshot();
    let cache = {
        let cache = state.cache.read().await;
        CacheReport {
            enabled: cache.enabled(),
            size: cache.len(),
            ttl: cache.ttl().as_millis() as u64,
        }
    };

    let report = HealthReport {
        status: if healthy_endpoints == 0 {
            "degraded"
        } else {
            "healthy"
        },
        stats,
        rpc_urls: state.config.rpc_urls.clone(),
        healthy_endpoints,
        total_active_requests,
        current_index,
        endpoints,
        cache,
        config: ConfigReport {
            max_concurrent_requests: state.config.max_concurrent_requests,
            request_timeout: state.config.request_timeout.as_millis() as u64,
            max_request_size: state.config.max_request_size,
        },
    };
    json_response(StatusCode::OK, &report)
}

/// Serialize a payload with the proxy's JSON content type. Serialization
/// of these types cannot fail; an empty body would indicate a bug, not a
/// client error.
fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    let body = serde_json::to_vec(payload).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body))
        .unwrap()
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, shutting down"),
        Err(e) => error!("failed to install interrupt handler: {}", e),
    }
}

/// Operational report served on `/health`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    status: &'static str,
    stats: StatsReport,
    rpc_urls: Vec<String>,
    healthy_endpoints: usize,
    total_active_requests: u64,
    current_index: usize,
    endpoints: Vec<EndpointReport>,
    cache: CacheReport,
    config: ConfigReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheReport {
    enabled: bool,
    size: usize,
    /// Entry lifetime in milliseconds
    ttl: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigReport {
    max_concurrent_requests: u32,
    /// Per-attempt deadline in milliseconds
    request_timeout: u64,
    max_request_size: usize,
}
