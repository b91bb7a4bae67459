//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the route proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path under which the proxy is mounted (e.g., "/api/proxy").
    pub mount_path: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Proxy endpoints keyed by route prefix.
    pub endpoints: BTreeMap<String, EndpointEntry>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Caller authentication settings.
    pub auth: AuthConfig,

    /// Upstream transport settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mount_path: "/api/proxy".to_string(),
            listener: ListenerConfig::default(),
            endpoints: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7007").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7007".to_string(),
        }
    }
}

/// A configured endpoint, either a bare target URL or a full definition.
///
/// ```toml
/// [endpoints]
/// "/simple" = "http://localhost:3000"
///
/// [endpoints."/full"]
/// target = "http://localhost:4000"
/// credentials = "dangerously-allow-unauthenticated"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EndpointEntry {
    Target(String),
    Full(EndpointConfig),
}

impl EndpointEntry {
    /// Expand the shorthand form into a full endpoint definition.
    pub fn to_endpoint(&self) -> EndpointConfig {
        match self {
            EndpointEntry::Target(target) => EndpointConfig {
                target: target.clone(),
                ..EndpointConfig::default()
            },
            EndpointEntry::Full(endpoint) => endpoint.clone(),
        }
    }
}

impl From<EndpointConfig> for EndpointEntry {
    fn from(endpoint: EndpointConfig) -> Self {
        EndpointEntry::Full(endpoint)
    }
}

/// Full endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Absolute upstream base URL.
    pub target: String,

    /// Credential policy: "require", "forward" or
    /// "dangerously-allow-unauthenticated".
    #[serde(default = "default_credentials")]
    pub credentials: String,

    /// HTTP methods accepted on this route. All methods when absent.
    #[serde(default)]
    pub allowed_methods: Option<Vec<String>>,

    /// Subjects permitted on authenticated routes. Any authenticated
    /// subject when absent.
    #[serde(default)]
    pub allowed_subjects: Option<Vec<String>>,

    /// Ordered header rules applied to the outbound request.
    #[serde(default)]
    pub headers: Vec<HeaderRuleConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            credentials: default_credentials(),
            allowed_methods: None,
            allowed_subjects: None,
            headers: Vec::new(),
        }
    }
}

fn default_credentials() -> String {
    "require".to_string()
}

/// A single header rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderRuleConfig {
    /// Header name (case-insensitive).
    pub name: String,

    /// One of "forward", "strip", "override".
    pub action: String,

    /// Replacement value, required for "override".
    #[serde(default)]
    pub value: Option<String>,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until upstream response headers arrive, in seconds.
    pub header_secs: u64,

    /// Idle pooled upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            header_secs: 30,
            idle_secs: 90,
        }
    }
}

/// Caller authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer tokens accepted as caller credentials.
    pub static_tokens: Vec<StaticTokenConfig>,
}

/// A static bearer token and the subject it authenticates as.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticTokenConfig {
    pub token: String,
    pub subject: String,
}

/// Upstream transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Request body chunks buffered between caller and upstream.
    pub pipe_capacity: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { pipe_capacity: 16 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
