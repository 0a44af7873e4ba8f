//! # evmrelay Entry Point
//!
//! Main binary for the evmrelay JSON-RPC reverse proxy. Configuration
//! comes from the environment (see [`RelayConfig::from_env`]); the flags
//! below override it for ad-hoc runs.
//!
//! ## Usage
//!
//! ```bash
//! # Configure via environment
//! RPC_URLS=https://arb1.arbitrum.io/rpc,https://arbitrum-one.publicnode.com evmrelay
//!
//! # Or via flags
//! evmrelay -u https://arb1.arbitrum.io/rpc -u https://arbitrum-one.publicnode.com -p 3000
//!
//! # Point a wallet or dApp at http://127.0.0.1:3000/rpc
//! curl -s http://127.0.0.1:3000/rpc \
//!   -H 'Content-Type: application/json' \
//!   -d '{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}'
//! ```
//!
//! ## URL Format
//!
//! Upstream URLs must include the `http://` or `https://` prefix.

use anyhow::Result;
use argh::FromArgs;
use evmrelay_proxy::{RelayConfig, RelayServer};
use std::net::SocketAddr;

/// Validates that a URL string starts with http:// or https://
fn validate_http_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid upstream URL: '{}' must start with http:// or https://",
            url
        ))
    }
}

#[derive(FromArgs)]
/// evmrelay - JSON-RPC reverse proxy for Ethereum-compatible RPC providers
struct Cli {
    /// listen port (overrides PORT, default 3000)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// upstream RPC provider URL, repeatable (overrides RPC_URLS)
    ///
    /// Requests are distributed across the given providers with
    /// round-robin load balancing and health-aware retries.
    /// Must include the http:// or https:// prefix.
    #[argh(option, short = 'u', long = "rpc-url")]
    rpc_urls: Vec<String>,

    /// chain id answered locally for eth_chainId and net_version
    /// (overrides CHAIN_ID, default 42161)
    #[argh(option, long = "chain-id")]
    chain_id: Option<u64>,

    /// enable the response cache (overrides ENABLE_CACHE)
    #[argh(switch, long = "enable-cache")]
    enable_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default log level INFO, overridable via RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = RelayConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if !cli.rpc_urls.is_empty() {
        config.rpc_urls = cli.rpc_urls;
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if cli.enable_cache {
        config.enable_cache = true;
    }

    for url in &config.rpc_urls {
        validate_http_url(url)?;
    }
    if config.rpc_urls.is_empty() {
        tracing::warn!(
            "no upstream endpoints configured; only eth_chainId and net_version will be served"
        );
    }

    tracing::info!(
        "starting evmrelay for chain {} ({})",
        config.chain_id,
        config.chain_id_hex()
    );
    tracing::info!("upstream endpoints: {:?}", config.rpc_urls);
    if config.enable_cache {
        tracing::info!(
            "response cache enabled, ttl {}ms",
            config.cache_ttl.as_millis()
        );
    }

    let server = RelayServer::new(config.clone())
        .map_err(|e| anyhow::anyhow!("failed to assemble proxy: {}", e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    server
        .run(addr)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_defaults() {
        let cli: Cli = Cli::from_args(&["evmrelay"], &[]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.rpc_urls.is_empty());
        assert!(cli.chain_id.is_none());
        assert!(!cli.enable_cache);
    }

    #[test]
    fn test_cli_parse_port() {
        let cli: Cli = Cli::from_args(&["evmrelay"], &["-p", "8080"]).unwrap();
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn test_cli_parse_multiple_rpc_urls() {
        let cli: Cli = Cli::from_args(
            &["evmrelay"],
            &[
                "--rpc-url",
                "https://a.example/rpc",
                "--rpc-url",
                "https://b.example/rpc",
            ],
        )
        .unwrap();
        assert_eq!(
            cli.rpc_urls,
            vec![
                "https://a.example/rpc".to_string(),
                "https://b.example/rpc".to_string(),
            ]
        );
    }

    #[test]
    fn test_cli_parse_chain_id() {
        let cli: Cli = Cli::from_args(&["evmrelay"], &["--chain-id", "1"]).unwrap();
        assert_eq!(cli.chain_id, Some(1));
    }

    #[test]
    fn test_cli_parse_enable_cache() {
        let cli: Cli = Cli::from_args(&["evmrelay"], &["--enable-cache"]).unwrap();
        assert!(cli.enable_cache);
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:8545").is_ok());
        assert!(validate_http_url("https://arb1.arbitrum.io/rpc").is_ok());
        assert!(validate_http_url("arb1.arbitrum.io/rpc").is_err());
        assert!(validate_http_url("ws://arb1.arbitrum.io").is_err());
    }
}
