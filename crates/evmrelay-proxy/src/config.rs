use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration of the proxy.
///
/// Every knob has a built-in default and an environment variable; CLI
/// flags (parsed by the binary) override both. Durations are configured
/// in milliseconds.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// HTTP listen port (`PORT`)
    pub port: u16,
    /// Upstream provider URLs in dispatch order (`RPC_URLS`, csv)
    pub rpc_urls: Vec<String>,
    /// Allowed CORS origins, `*` for any (`CORS_ORIGINS`, csv)
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body in bytes (`MAX_REQUEST_SIZE`)
    pub max_request_size: usize,
    /// Per-attempt upstream deadline (`REQUEST_TIMEOUT`, ms)
    pub request_timeout: Duration,
    /// Per-endpoint in-flight dispatch cap (`MAX_CONCURRENT_REQUESTS`)
    pub max_concurrent_requests: u32,
    /// Response cache switch (`ENABLE_CACHE`)
    pub enable_cache: bool,
    /// Response cache entry lifetime (`CACHE_TTL`, ms)
    pub cache_ttl: Duration,
    /// Retries on alternative endpoints after an endpoint failure
    /// (`MAX_RETRY_ATTEMPTS`)
    pub max_retry_attempts: usize,
    /// Chain identity answered locally (`CHAIN_ID`)
    pub chain_id: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            rpc_urls: Vec::new(),
            cors_origins: vec!["*".to_string()],
            max_request_size: 1_048_576,
            request_timeout: Duration::from_millis(6000),
            max_concurrent_requests: 200,
            enable_cache: false,
            cache_ttl: Duration::from_millis(1000),
            max_retry_attempts: 2,
            chain_id: 42161,
        }
    }
}

/// Parse an environment variable, falling back to `default` when the
/// variable is unset or unparseable.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Split a csv value into trimmed, non-empty entries.
fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Truthy environment flag: `1`, `true`, `yes`, `on` (case-insensitive).
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT", defaults.port),
            rpc_urls: env::var("RPC_URLS")
                .map(|v| parse_csv(&v))
                .unwrap_or(defaults.rpc_urls),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| parse_csv(&v))
                .unwrap_or(defaults.cors_origins),
            max_request_size: env_parse("MAX_REQUEST_SIZE", defaults.max_request_size),
            request_timeout: Duration::from_millis(env_parse(
                "REQUEST_TIMEOUT",
                defaults.request_timeout.as_millis() as u64,
            )),
            max_concurrent_requests: env_parse(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            enable_cache: env::var("ENABLE_CACHE")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enable_cache),
            cache_ttl: Duration::from_millis(env_parse(
                "CACHE_TTL",
                defaults.cache_ttl.as_millis() as u64,
            )),
            max_retry_attempts: env_parse("MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts),
            chain_id: env_parse("CHAIN_ID", defaults.chain_id),
        }
    }

    /// Chain id in 0x-hex form, the `eth_chainId` answer.
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// Chain id as a decimal string, the `net_version` answer.
    pub fn net_version(&self) -> String {
        self.chain_id.to_string()
    }

    /// True when `origin` is allowed by the CORS configuration.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.rpc_urls.is_empty());
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.max_request_size, 1_048_576);
        assert_eq!(config.request_timeout, Duration::from_millis(6000));
        assert_eq!(config.max_concurrent_requests, 200);
        assert!(!config.enable_cache);
        assert_eq!(config.cache_ttl, Duration::from_millis(1000));
        assert_eq!(config.max_retry_attempts, 2);
        assert_eq!(config.chain_id, 42161);
    }

    #[test]
    fn test_chain_identity_forms() {
        let config = RelayConfig::default();
        assert_eq!(config.chain_id_hex(), "0xa4b1");
        assert_eq!(config.net_version(), "42161");

        let mainnet = RelayConfig {
            chain_id: 1,
            ..Default::default()
        };
        assert_eq!(mainnet.chain_id_hex(), "0x1");
        assert_eq!(mainnet.net_version(), "1");
    }

    #[test]
    fn test_parse_csv() {
        assert_eq!(
            parse_csv("http://a:8545, http://b:8545 ,"),
            vec!["http://a:8545".to_string(), "http://b:8545".to_string()]
        );
        assert!(parse_csv("").is_empty());
        assert!(parse_csv(" , ").is_empty());
    }

    #[test]
    fn test_parse_flag() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!parse_flag(v), "{v}");
        }
    }

    #[test]
    fn test_wildcard_origin() {
        let config = RelayConfig::default();
        assert!(config.allows_any_origin());

        let restricted = RelayConfig {
            cors_origins: vec!["https://app.example".to_string()],
            ..Default::default()
        };
        assert!(!restricted.allows_any_origin());
    }
}
