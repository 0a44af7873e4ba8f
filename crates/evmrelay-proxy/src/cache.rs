use evmrelay_common::RpcResponse;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entry count above which an insert sweeps expired entries first.
const SWEEP_THRESHOLD: usize = 1000;

struct CacheEntry {
    response: RpcResponse,
    inserted_at: Instant,
}

/// Bounded TTL cache of successful upstream responses.
///
/// Keyed by `method + ":" + canonical(params)`; only error-free responses
/// are stored, and a hit is re-bound to the caller's own request id before
/// it goes out. Stale entries are dropped on lookup; inserts sweep the
/// table opportunistically once it grows past [`SWEEP_THRESHOLD`].
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

/// Cache key for a request: the method plus the compact serialization of
/// its params (`null` when absent).
pub fn cache_key(method: &str, params: &Option<Value>) -> String {
    match params {
        Some(p) => format!("{}:{}", method, p),
        None => format!("{}:null", method),
    }
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            enabled,
        }
    }

    /// Look up a fresh cached response. Stale entries are removed.
    pub fn get(&mut self, key: &str) -> Option<RpcResponse> {
        if !self.enabled {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a response if caching is enabled and the response is a
    /// success. Error responses are never cached.
    pub fn insert(&mut self, key: String, response: &RpcResponse) {
        if !self.enabled || !response.is_success() {
            return;
        }
        if self.entries.len() > SWEEP_THRESHOLD {
            self.sweep_expired();
        }
        self.entries.insert(
            key,
            CacheEntry {
                response: response.clone(),
                inserted_at: Instant::now(),
            },
        );
    }

    fn sweep_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmrelay_common::RpcError;
    use serde_json::json;

    fn ok_response() -> RpcResponse {
        RpcResponse::success(json!(1), json!("0x10"))
    }

    #[test]
    fn test_cache_key_canonicalization() {
        assert_eq!(cache_key("eth_blockNumber", &None), "eth_blockNumber:null");
        assert_eq!(
            cache_key("eth_getBalance", &Some(json!(["0xabc", "latest"]))),
            r#"eth_getBalance:["0xabc","latest"]"#
        );
    }

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = ResponseCache::new(true, Duration::from_secs(60));
        cache.insert("k".into(), &ok_response());
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.result, Some(json!("0x10")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_after_expiry() {
        let mut cache = ResponseCache::new(true, Duration::from_millis(0));
        cache.insert("k".into(), &ok_response());
        assert!(cache.get("k").is_none());
        // the stale entry was dropped by the lookup
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let mut cache = ResponseCache::new(false, Duration::from_secs(60));
        cache.insert("k".into(), &ok_response());
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_error_responses_not_cached() {
        let mut cache = ResponseCache::new(true, Duration::from_secs(60));
        let err = RpcResponse::error(json!(1), RpcError::internal_error("boom"));
        cache.insert("k".into(), &err);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_sweep_drops_expired_entries() {
        let mut cache = ResponseCache::new(true, Duration::from_secs(60));
        for i in 0..=SWEEP_THRESHOLD {
            cache.insert(format!("k{}", i), &ok_response());
        }
        // age out everything, then trigger the sweep with one more insert
        for entry in cache.entries.values_mut() {
            entry.inserted_at -= Duration::from_secs(120);
        }
        cache.insert("fresh".into(), &ok_response());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }
}
