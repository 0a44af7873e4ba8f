//! Upstream Error Classification
//!
//! Decides whether an error returned by an upstream provider is the
//! provider's fault or the request's own fault:
//!
//! - [`ErrorClass::RpcError`] — application-level: the request itself is
//!   bad (reverted call, bad nonce, underpriced transaction). Retrying on
//!   another provider would return the same answer, so these are passed
//!   through verbatim and do not affect endpoint health.
//! - [`ErrorClass::EndpointFailure`] — provider-level: rate limiting,
//!   exhausted quota, connectivity trouble, 5xx-class failures. These
//!   trigger a retry on an alternative endpoint and count against the
//!   failing endpoint's health.
//!
//! The pattern tables are ordered configuration, not logic: the normal
//! RPC-error table is always consulted first, so a string like
//! "gas required exceeds gas limit" stays application-class even though
//! it shares words with provider-failure messages. Unknown errors default
//! to application-class, which keeps unfamiliar provider responses from
//! knocking endpoints out of rotation.
//!
//! Transport-layer failures (connect errors, non-2xx statuses, elapsed
//! deadlines) never reach this classifier — the dispatcher tags them as
//! endpoint failures directly.

use crate::protocol::jsonrpc::RpcError;
use serde_json::Value;

/// Classification of an upstream error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Application-level RPC error: passed through, never retried.
    RpcError,
    /// Provider-level failure: retried elsewhere, demotes endpoint health.
    EndpointFailure,
}

/// Errors intrinsic to the request. Checked first; a match here wins.
const NORMAL_RPC_PATTERNS: &[&str] = &[
    "intrinsic gas",
    "insufficient funds",
    "nonce too low",
    "nonce too high",
    "transaction underpriced",
    "invalid argument",
    "execution reverted",
    "call exception",
    "invalid signature",
    "gas limit",
    "already known",
    "replacement transaction",
];

/// Errors attributable to the provider. Checked only when no normal
/// pattern matched.
const ENDPOINT_FAILURE_PATTERNS: &[&str] = &[
    // rate limiting and quota exhaustion
    "rate limit",
    "too many requests",
    "request limit exceeded",
    "throttl",
    "429",
    "ru credits",
    "compute units",
    "quota exceeded",
    "insufficient credits",
    // connectivity
    "econnrefused",
    "etimedout",
    "enotfound",
    "socket hang up",
    "network error",
    "connection refused",
    "connection reset",
    "connection closed",
    "timeout",
    // provider-side HTTP failures
    "service unavailable",
    "503",
    "502",
    "gateway",
    "internal server error",
    "500",
];

/// Reduce a polymorphic error value to one searchable string.
///
/// Upstreams return errors as plain strings, structured objects with
/// `message`/`data`, or nonstandard shapes; the fallback is the compact
/// serialization of the whole value.
fn error_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(msg)) = map.get("message") {
                msg.clone()
            } else if let Some(data) = map.get("data") {
                match data {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            } else {
                value.to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Classify an error message string.
pub fn classify_str(message: &str) -> ErrorClass {
    let haystack = message.to_lowercase();

    if NORMAL_RPC_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return ErrorClass::RpcError;
    }
    if ENDPOINT_FAILURE_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return ErrorClass::EndpointFailure;
    }
    ErrorClass::RpcError
}

/// Classify an arbitrary JSON error value.
pub fn classify_error(value: &Value) -> ErrorClass {
    classify_str(&error_to_string(value))
}

/// Classify a structured JSON-RPC error object.
///
/// The search string is `message` when non-empty, else `data`: the
/// message field is structurally always present on a parsed error object,
/// so an empty one is treated as absent and the diagnostic falls through
/// to `data`. A provider that reports "ETIMEDOUT" only in `data` still
/// classifies as an endpoint failure.
pub fn classify_rpc_error(error: &RpcError) -> ErrorClass {
    if !error.message.is_empty() {
        return classify_str(&error.message);
    }
    match &error.data {
        Some(Value::String(s)) => classify_str(s),
        Some(other) => classify_str(&other.to_string()),
        None => classify_str(&error.message),
    }
}
