//! evmrelay Proxy Core
//!
//! This crate provides the dispatch core and HTTP shell of evmrelay, a
//! JSON-RPC reverse proxy for Ethereum-compatible RPC providers. The proxy
//! sits between clients and a pool of upstream providers, forwarding each
//! request with round-robin load balancing, health-aware selection, and
//! classifier-driven retries.
//!
//! # Architecture
//!
//! A request flows through the pipeline as: intake → local chain-identity
//! shortcut → cache lookup → retry forwarder → selector → dispatcher →
//! classifier → health update → response out. Batches run the pipeline per
//! element and return an array in input order.
//!
//! 1. **Registry & Selector** ([`registry`]): the health table keyed by
//!    upstream URL and the round-robin cursor. Primary picks accept only
//!    healthy endpoints with spare capacity, falling back to the
//!    least-loaded endpoint when the whole pool rejects; retry picks walk
//!    forward from the failed URL without moving the cursor.
//! 2. **Dispatcher** ([`dispatcher`]): one upstream POST per attempt with
//!    an independent deadline; transport failures become `-32050`/`-32603`
//!    envelopes and demote endpoint health directly, while upstream
//!    envelope errors are classified before health settles.
//! 3. **Forwarder** ([`forwarder`]): primary attempt plus sequential
//!    retries on alternates, only for provider-attributable failures.
//! 4. **Recovery** ([`recovery`]): a background scanner that probes
//!    quiescent unhealthy endpoints and returns them to service.
//! 5. **HTTP shell** ([`http_router`], [`http_server`]): framing guards,
//!    batch handling, the `{}` probe handshake, CORS, and the `/health`
//!    report.
//!
//! # Health Model
//!
//! Three consecutive dispatch failures mark an endpoint unhealthy; any
//! successful dispatch (including one that delivered an application-level
//! RPC error) marks it healthy again. Unhealthy endpoints that stay quiet
//! for a minute are probed by the recovery scanner.
//!
//! # Example
//!
//! ```no_run
//! use evmrelay_proxy::{RelayConfig, RelayServer};
//! use std::net::SocketAddr;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = RelayConfig::from_env();
//! config.rpc_urls = vec![
//!     "https://arb1.arbitrum.io/rpc".to_string(),
//!     "https://arbitrum-one.publicnode.com".to_string(),
//! ];
//!
//! let server = RelayServer::new(config.clone())?;
//! let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
//! server.run(addr).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod forwarder;
pub mod http_router;
pub mod http_server;
pub mod recovery;
pub mod registry;
pub mod stats;

pub use cache::ResponseCache;
pub use config::RelayConfig;
pub use dispatcher::{DispatchOutcome, UpstreamDispatcher};
pub use endpoint::{EndpointHealth, LATENCY_WINDOW, UNHEALTHY_THRESHOLD};
pub use forwarder::RetryForwarder;
pub use http_router::RelayRouter;
pub use http_server::RelayServer;
pub use recovery::{RecoveryConfig, RecoveryScanner};
pub use registry::{EndpointRegistry, EndpointReport};
pub use stats::GlobalStats;
