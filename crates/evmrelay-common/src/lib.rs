//! evmrelay Common Types
//!
//! This crate provides the protocol definitions shared by the evmrelay
//! reverse proxy components.
//!
//! # Overview
//!
//! evmrelay is a JSON-RPC reverse proxy for Ethereum-compatible RPC
//! providers. This crate contains the pieces every component agrees on:
//!
//! - **Protocol Layer**: JSON-RPC 2.0 request/response envelopes and the
//!   proxy's error-code table
//! - **Error Classification**: the ordered pattern tables that decide
//!   whether an upstream error is the provider's fault (retryable,
//!   health-demoting) or the request's own fault (passed through)
//!
//! # Wire Format
//!
//! - **Transport**: HTTP/1.1, `Content-Type: application/json`
//! - **Protocol**: JSON-RPC 2.0
//! - **Response field order**: `jsonrpc`, `id`, then `result` or `error` —
//!   the order is observable and part of the contract
//!
//! # Example
//!
//! ```
//! use evmrelay_common::{RpcRequest, RpcResponse};
//! use serde_json::json;
//!
//! let request = RpcRequest::new("eth_blockNumber", Some(json!([])), json!(1));
//! let response = RpcResponse::success(json!(1), json!("0x10"));
//! assert!(response.error.is_none());
//! ```

pub mod classify;
pub mod protocol;

pub use classify::{classify_error, ErrorClass};
pub use protocol::error::{RelayError, Result};
pub use protocol::jsonrpc::{RpcError, RpcRequest, RpcResponse};
