//! Remote service endpoint and invoker configuration.

use serde::Deserialize;

// ============================================================================
// Configuration
// ============================================================================

/// Service endpoint configuration.
///
/// Maps a workflow step's `service` name to the base URL its methods are
/// reached under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoint {
    /// Service name as referenced by workflow steps.
    pub name: String,
    /// Base URL (scheme, host, port, optional path prefix).
    pub address: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Step invoker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// TCP connect timeout in milliseconds. Per-call deadlines come from
    /// each step's own timeout.
    pub connect_timeout_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
        }
    }
}

/// Parse `"name=url,name2=url2"` endpoint lists.
///
/// Malformed entries are returned separately so callers can log them.
pub fn parse_endpoint_list(value: &str) -> (Vec<ServiceEndpoint>, Vec<String>) {
    let mut endpoints = Vec::new();
    let mut rejected = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once('=') {
            Some((name, address)) if !name.trim().is_empty() && !address.trim().is_empty() => {
                endpoints.push(ServiceEndpoint::new(name.trim(), address.trim()));
            }
            _ => rejected.push(item.to_string()),
        }
    }
    (endpoints, rejected)
}
