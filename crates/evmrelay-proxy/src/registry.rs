use crate::endpoint::EndpointHealth;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Per-endpoint entry of the `/health` report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointReport {
    pub url: String,
    pub is_healthy: bool,
    pub active_requests: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub failure_rate: f64,
    pub average_response_time: f64,
    pub last_failure: Option<u64>,
}

/// Registry of upstream endpoints: the health table plus the selector.
///
/// Endpoints are kept in a map for O(1) health updates and in the stable
/// configured order for round-robin iteration. The shared cursor advances
/// exactly once per primary pick, which is what spreads consecutive
/// requests across the healthy set.
pub struct EndpointRegistry {
    /// All endpoints indexed by URL
    endpoints: HashMap<String, EndpointHealth>,
    /// Configured URL order, the basis for both pickers
    urls: Vec<String>,
    /// Round-robin cursor, advanced only by `primary_pick`
    cursor: usize,
    /// Per-endpoint in-flight cap enforced by the selector
    max_concurrent: u32,
}

impl EndpointRegistry {
    /// Create a registry with a static URL list. Duplicates are collapsed.
    pub fn new(urls: Vec<String>, max_concurrent: u32) -> Self {
        let mut unique = Vec::with_capacity(urls.len());
        let mut endpoints = HashMap::with_capacity(urls.len());
        for url in urls {
            if !endpoints.contains_key(&url) {
                endpoints.insert(url.clone(), EndpointHealth::new(url.clone()));
                unique.push(url);
            }
        }
        Self {
            endpoints,
            urls: unique,
            cursor: 0,
            max_concurrent,
        }
    }

    /// Pick the endpoint for a request's primary attempt.
    ///
    /// Advances the cursor once, then scans one full revolution from the
    /// pre-advance position for a healthy endpoint with spare capacity.
    /// When the whole revolution rejects, falls back to the least-loaded
    /// endpoint regardless of health so a fully degraded pool still
    /// drains rather than deadlocks.
    pub fn primary_pick(&mut self) -> Option<String> {
        if self.urls.is_empty() {
            return None;
        }

        let len = self.urls.len();
        let start = self.cursor % len;
        self.cursor = self.cursor.wrapping_add(1) % len;

        for i in 0..len {
            let url = &self.urls[(start + i) % len];
            let ep = &self.endpoints[url];
            if ep.is_healthy && ep.active_requests < self.max_concurrent {
                return Some(url.clone());
            }
        }

        // least-loaded last resort
        self.urls
            .iter()
            .min_by_key(|url| self.endpoints[*url].active_requests)
            .cloned()
    }

    /// Collect up to `n` retry alternatives for a failed primary attempt.
    ///
    /// Walks forward (with wrap) from the position after `failed_url`,
    /// keeping healthy endpoints with spare capacity. Never advances the
    /// primary cursor and never yields `failed_url` itself.
    pub fn retry_picks(&self, failed_url: &str, n: usize) -> Vec<String> {
        let len = self.urls.len();
        if len == 0 || n == 0 {
            return Vec::new();
        }

        let start = self
            .urls
            .iter()
            .position(|u| u == failed_url)
            .map(|p| (p + 1) % len)
            .unwrap_or(0);

        let mut picks = Vec::new();
        for i in 0..len {
            let url = &self.urls[(start + i) % len];
            if url == failed_url {
                continue;
            }
            let ep = &self.endpoints[url];
            if ep.is_healthy && ep.active_requests < self.max_concurrent {
                picks.push(url.clone());
                if picks.len() == n {
                    break;
                }
            }
        }
        picks
    }

    /// Record a successful dispatch against `url`.
    pub fn record_success(&mut self, url: &str, latency_ms: f64) {
        if let Some(ep) = self.endpoints.get_mut(url) {
            if ep.record_success(latency_ms) {
                info!("endpoint {} back in service after successful dispatch", url);
            }
        }
    }

    /// Record a failed dispatch against `url`.
    pub fn record_failure(&mut self, url: &str) {
        if let Some(ep) = self.endpoints.get_mut(url) {
            let failures = ep.consecutive_failures + 1;
            if ep.record_failure() {
                warn!(
                    "endpoint {} marked unhealthy after {} consecutive failures",
                    url, failures
                );
            }
        }
    }

    /// Reserve an in-flight slot before the network send.
    pub fn begin_dispatch(&mut self, url: &str) {
        if let Some(ep) = self.endpoints.get_mut(url) {
            ep.active_requests += 1;
        }
    }

    /// Release the in-flight slot; called on every dispatch exit path.
    pub fn end_dispatch(&mut self, url: &str) {
        if let Some(ep) = self.endpoints.get_mut(url) {
            ep.active_requests = ep.active_requests.saturating_sub(1);
        }
    }

    /// Return an endpoint to service after a successful recovery probe.
    pub fn force_healthy(&mut self, url: &str) {
        if let Some(ep) = self.endpoints.get_mut(url) {
            if !ep.is_healthy {
                info!("endpoint {} recovered by scanner probe", url);
            }
            ep.force_healthy();
        }
    }

    /// Unhealthy endpoints that have been failure-free for `quiet`.
    pub fn recovery_candidates(&self, quiet: Duration) -> Vec<String> {
        self.urls
            .iter()
            .filter(|url| {
                let ep = &self.endpoints[*url];
                !ep.is_healthy && ep.quiescent_for(quiet)
            })
            .cloned()
            .collect()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.endpoints.values().filter(|e| e.is_healthy).count()
    }

    pub fn total_active(&self) -> u64 {
        self.endpoints
            .values()
            .map(|e| e.active_requests as u64)
            .sum()
    }

    /// Current round-robin cursor position, exposed on `/health`.
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn get(&self, url: &str) -> Option<&EndpointHealth> {
        self.endpoints.get(url)
    }

    /// Per-endpoint rows for the `/health` report, in configured order.
    pub fn snapshot(&self) -> Vec<EndpointReport> {
        self.urls
            .iter()
            .map(|url| {
                let ep = &self.endpoints[url];
                EndpointReport {
                    url: ep.url.clone(),
                    is_healthy: ep.is_healthy,
                    active_requests: ep.active_requests,
                    total_requests: ep.total_requests,
                    total_failures: ep.total_failures,
                    failure_rate: ep.failure_rate(),
                    average_response_time: ep.average_response_time,
                    last_failure: ep.last_failure_millis(),
                }
            })
            .collect()
    }
}
