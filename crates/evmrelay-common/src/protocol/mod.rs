//! evmrelay Protocol Definitions
//!
//! This module defines the JSON-RPC 2.0 envelope types and the proxy's
//! error-code table.
//!
//! # Protocol Types
//!
//! - **[`RpcRequest`]**: a client request with method name, optional params,
//!   and the caller's id (number, string, or null)
//! - **[`RpcResponse`]**: a response carrying exactly one of `result` or
//!   `error`, serialized in the fixed wire order `jsonrpc, id, {result|error}`
//! - **[`RpcError`]**: the error object with `code`, `message`, and optional
//!   `data`
//! - **[`RelayError`]**: the crate-wide error type for the proxy's own
//!   failures (bind errors, configuration errors, serialization)
//!
//! # Error Strata
//!
//! The proxy distinguishes three kinds of failure:
//! - **Framing errors** (parse error, oversize, bad shape) are reported with
//!   an HTTP status and a JSON-RPC envelope before any dispatch happens
//! - **Proxy errors** (upstream unreachable, deadline elapsed) use the
//!   `-32050`/`-32603` codes and participate in retry and health accounting
//! - **Application RPC errors** from upstreams are passed through verbatim

pub mod error;
pub mod jsonrpc;

pub use error::{RelayError, Result};
pub use jsonrpc::{RpcError, RpcRequest, RpcResponse};
