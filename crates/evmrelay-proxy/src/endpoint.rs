use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Capacity of the per-endpoint latency ring.
pub const LATENCY_WINDOW: usize = 100;

/// Consecutive dispatch failures before an endpoint is marked unhealthy.
pub const UNHEALTHY_THRESHOLD: u32 = 3;

/// Health record for a single upstream RPC endpoint.
///
/// One record exists per configured URL for the process lifetime. The
/// healthy flag gates primary selection; any successful dispatch (including
/// one that delivered an application-level RPC error) flips the endpoint
/// back to healthy, while [`UNHEALTHY_THRESHOLD`] consecutive failures flip
/// it to unhealthy.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    /// Upstream URL, the stable identifier and dispatch target
    pub url: String,
    /// Gate for primary selection
    pub is_healthy: bool,
    /// Failures since the last success; reset to 0 on any success
    pub consecutive_failures: u32,
    /// Timestamp of the most recent failure
    pub last_failure_at: Option<SystemTime>,
    /// In-flight dispatches to this URL
    pub active_requests: u32,
    /// Total dispatches attempted against this URL
    pub total_requests: u64,
    /// Total failed dispatches
    pub total_failures: u64,
    /// Ring of successful response times in milliseconds, newest last
    latency_samples: VecDeque<f64>,
    /// Mean of `latency_samples`
    pub average_response_time: f64,
}

impl EndpointHealth {
    pub fn new(url: String) -> Self {
        Self {
            url,
            is_healthy: true,
            consecutive_failures: 0,
            last_failure_at: None,
            active_requests: 0,
            total_requests: 0,
            total_failures: 0,
            latency_samples: VecDeque::with_capacity(LATENCY_WINDOW),
            average_response_time: 0.0,
        }
    }

    /// Record a successful dispatch and its latency.
    ///
    /// Returns `true` when this success transitioned the endpoint from
    /// unhealthy back to healthy.
    pub fn record_success(&mut self, latency_ms: f64) -> bool {
        self.total_requests += 1;
        self.consecutive_failures = 0;

        if self.latency_samples.len() == LATENCY_WINDOW {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
        self.average_response_time =
            self.latency_samples.iter().sum::<f64>() / self.latency_samples.len() as f64;

        let recovered = !self.is_healthy;
        self.is_healthy = true;
        recovered
    }

    /// Record a failed dispatch.
    ///
    /// Returns `true` when this failure crossed the threshold and
    /// transitioned the endpoint from healthy to unhealthy.
    pub fn record_failure(&mut self) -> bool {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_failure_at = Some(SystemTime::now());

        if self.is_healthy && self.consecutive_failures >= UNHEALTHY_THRESHOLD {
            self.is_healthy = false;
            return true;
        }
        false
    }

    /// Reset the failure streak and mark healthy (recovery scanner only).
    pub fn force_healthy(&mut self) {
        self.consecutive_failures = 0;
        self.is_healthy = true;
    }

    /// Fraction of dispatches that failed, 0.0 when none were attempted.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_requests as f64
        }
    }

    /// Last failure as milliseconds since the UNIX epoch, for reporting.
    pub fn last_failure_millis(&self) -> Option<u64> {
        self.last_failure_at
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
    }

    /// True when the endpoint has been failure-free for at least `quiet`.
    ///
    /// Used by the recovery scanner to avoid hammering an endpoint that is
    /// still actively failing.
    pub fn quiescent_for(&self, quiet: Duration) -> bool {
        match self.last_failure_at {
            Some(at) => at.elapsed().map(|e| e >= quiet).unwrap_or(false),
            None => false,
        }
    }

    pub fn latency_sample_count(&self) -> usize {
        self.latency_samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_endpoint_starts_healthy() {
        let ep = EndpointHealth::new("http://rpc.example".into());
        assert!(ep.is_healthy);
        assert_eq!(ep.consecutive_failures, 0);
        assert_eq!(ep.active_requests, 0);
        assert_eq!(ep.total_requests, 0);
        assert_eq!(ep.total_failures, 0);
        assert!(ep.last_failure_at.is_none());
        assert_eq!(ep.average_response_time, 0.0);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut ep = EndpointHealth::new("a".into());
        ep.record_failure();
        ep.record_failure();
        assert_eq!(ep.consecutive_failures, 2);

        ep.record_success(12.0);
        assert_eq!(ep.consecutive_failures, 0);
        assert!(ep.is_healthy);
    }

    #[test]
    fn test_unhealthy_after_threshold() {
        let mut ep = EndpointHealth::new("a".into());
        assert!(!ep.record_failure());
        assert!(!ep.record_failure());
        assert!(ep.is_healthy);
        // third consecutive failure crosses the threshold
        assert!(ep.record_failure());
        assert!(!ep.is_healthy);
        // further failures do not re-report the transition
        assert!(!ep.record_failure());
    }

    #[test]
    fn test_success_recovers_unhealthy_endpoint() {
        let mut ep = EndpointHealth::new("a".into());
        for _ in 0..3 {
            ep.record_failure();
        }
        assert!(!ep.is_healthy);

        assert!(ep.record_success(5.0));
        assert!(ep.is_healthy);
        assert_eq!(ep.consecutive_failures, 0);
    }

    #[test]
    fn test_latency_ring_is_bounded() {
        let mut ep = EndpointHealth::new("a".into());
        for i in 0..150 {
            ep.record_success(i as f64);
        }
        assert_eq!(ep.latency_sample_count(), LATENCY_WINDOW);
        // oldest 50 samples evicted: ring holds 50..149, mean 99.5
        assert!((ep.average_response_time - 99.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_rate() {
        let mut ep = EndpointHealth::new("a".into());
        assert_eq!(ep.failure_rate(), 0.0);
        ep.record_success(1.0);
        ep.record_failure();
        ep.record_failure();
        ep.record_success(1.0);
        assert!((ep.failure_rate() - 0.5).abs() < f64::EPSILON);
        assert!(ep.total_failures <= ep.total_requests);
    }

    #[test]
    fn test_force_healthy() {
        let mut ep = EndpointHealth::new("a".into());
        for _ in 0..5 {
            ep.record_failure();
        }
        ep.force_healthy();
        assert!(ep.is_healthy);
        assert_eq!(ep.consecutive_failures, 0);
        // failure history is retained
        assert_eq!(ep.total_failures, 5);
        assert!(ep.last_failure_at.is_some());
    }

    #[test]
    fn test_quiescence() {
        let mut ep = EndpointHealth::new("a".into());
        // no failure recorded yet
        assert!(!ep.quiescent_for(Duration::from_secs(0)));

        ep.record_failure();
        assert!(ep.quiescent_for(Duration::from_secs(0)));
        assert!(!ep.quiescent_for(Duration::from_secs(60)));
    }
}
