use crate::dispatcher::USER_AGENT;
use crate::registry::EndpointRegistry;
use evmrelay_common::classify::{classify_rpc_error, ErrorClass};
use evmrelay_common::{RelayError, RpcRequest, RpcResponse};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Recovery scanner configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Time between scan passes
    pub interval: Duration,
    /// How long an endpoint must be failure-free before it is probed
    pub quiescence: Duration,
    /// Deadline of one probe request
    pub probe_timeout: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            quiescence: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Background task that returns unhealthy endpoints to service.
///
/// On each pass, every unhealthy endpoint that has been quiescent long
/// enough receives a minimal `eth_blockNumber` probe. A 2xx answer whose
/// body either lacks an error or carries an error that is not an
/// endpoint failure counts as recovery; anything else leaves the
/// endpoint for the next pass.
pub struct RecoveryScanner {
    registry: Arc<RwLock<EndpointRegistry>>,
    client: reqwest::Client,
    config: RecoveryConfig,
}

impl RecoveryScanner {
    pub fn new(
        registry: Arc<RwLock<EndpointRegistry>>,
        config: RecoveryConfig,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build probe client: {}", e)))?;
        Ok(Self {
            registry,
            client,
            config,
        })
    }

    /// Starts the scanner task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        // the first tick fires immediately, skip it so a freshly started
        // proxy does not probe before anything could have failed
        interval.tick().await;
        loop {
            interval.tick().await;
            self.scan().await;
        }
    }

    /// One scan pass over the quiescent unhealthy endpoints.
    pub async fn scan(&self) {
        let candidates = {
            let registry = self.registry.read().await;
            registry.recovery_candidates(self.config.quiescence)
        };
        if candidates.is_empty() {
            return;
        }

        debug!("probing {} unhealthy endpoint(s)", candidates.len());

        let probes = candidates.into_iter().map(|url| async move {
            let recovered = self.probe(&url).await;
            (url, recovered)
        });
        let results = futures::future::join_all(probes).await;

        for (url, recovered) in results {
            if recovered {
                info!("recovery probe succeeded for {}", url);
                self.registry.write().await.force_healthy(&url);
            } else {
                debug!("recovery probe failed for {}", url);
            }
        }
    }

    /// Send one `eth_blockNumber` probe; true means the endpoint serves
    /// again.
    async fn probe(&self, url: &str) -> bool {
        let request = RpcRequest::new("eth_blockNumber", Some(json!([])), json!(1));
        let sent = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .timeout(self.config.probe_timeout)
            .send()
            .await;

        let response = match sent {
            Ok(r) if r.status().is_success() => r,
            _ => return false,
        };

        match response.json::<RpcResponse>().await {
            Ok(body) => match &body.error {
                None => true,
                Some(err) => classify_rpc_error(err) != ErrorClass::EndpointFailure,
            },
            Err(_) => false,
        }
    }
}
