use serde::Serialize;
use std::time::{Duration, Instant};

/// Smoothing factor of the requests-per-second EMA. One fold happens per
/// elapsed second, so 0.1 weights roughly the last ten seconds.
const RPS_EMA_ALPHA: f64 = 0.1;

/// Wire form of the global counters, embedded in the `/health` report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rpc_errors: u64,
    pub proxy_errors: u64,
    pub requests_per_second: f64,
    /// Seconds since process start
    pub uptime: u64,
}

/// Process-lifetime dispatch counters.
///
/// Counters settle once per forwarded client request on the final
/// delivered response: a clean result and a passed-through application
/// RPC error both count as successful deliveries (the latter also ticks
/// `rpc_errors`), while an endpoint-failure-class final response counts
/// as failed and ticks `proxy_errors`.
pub struct GlobalStats {
    started_at: Instant,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rpc_errors: u64,
    proxy_errors: u64,
    /// Folded once per elapsed second from `bucket_count`
    rps_ema: f64,
    bucket_started: Instant,
    bucket_count: u64,
}

impl GlobalStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rpc_errors: 0,
            proxy_errors: 0,
            rps_ema: 0.0,
            bucket_started: now,
            bucket_count: 0,
        }
    }

    /// Tick the request counter and the RPS window. Called once per
    /// forwarded client request, before dispatch.
    pub fn record_request(&mut self) {
        self.roll_window();
        self.total_requests += 1;
        self.bucket_count += 1;
    }

    /// Final response delivered a clean result.
    pub fn record_success(&mut self) {
        self.successful_requests += 1;
    }

    /// Final response passed through an application RPC error.
    pub fn record_rpc_error(&mut self) {
        self.successful_requests += 1;
        self.rpc_errors += 1;
    }

    /// Final response was an endpoint-failure-class error.
    pub fn record_proxy_error(&mut self) {
        self.failed_requests += 1;
        self.proxy_errors += 1;
    }

    /// Fold completed one-second buckets into the EMA.
    fn roll_window(&mut self) {
        let elapsed = self.bucket_started.elapsed().as_secs();
        if elapsed == 0 {
            return;
        }
        self.rps_ema =
            RPS_EMA_ALPHA * self.bucket_count as f64 + (1.0 - RPS_EMA_ALPHA) * self.rps_ema;
        if elapsed > 1 {
            // idle seconds decay toward zero
            self.rps_ema *= (1.0 - RPS_EMA_ALPHA).powi((elapsed - 1) as i32);
        }
        self.bucket_count = 0;
        self.bucket_started += Duration::from_secs(elapsed);
    }

    pub fn requests_per_second(&self) -> f64 {
        // decay the stored EMA for seconds that elapsed since the last
        // fold, without mutating state
        let elapsed = self.bucket_started.elapsed().as_secs();
        if elapsed == 0 {
            return self.rps_ema;
        }
        let mut ema =
            RPS_EMA_ALPHA * self.bucket_count as f64 + (1.0 - RPS_EMA_ALPHA) * self.rps_ema;
        if elapsed > 1 {
            ema *= (1.0 - RPS_EMA_ALPHA).powi((elapsed - 1) as i32);
        }
        ema
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self) -> StatsReport {
        StatsReport {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            rpc_errors: self.rpc_errors,
            proxy_errors: self.proxy_errors,
            requests_per_second: self.requests_per_second(),
            uptime: self.uptime().as_secs(),
        }
    }
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new()
    }
}
