//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! has a default so a minimal file only lists its remotes.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Admin status endpoint.
    pub admin: AdminConfig,

    /// One entry per guarded repository remote.
    pub remotes: Vec<RemoteConfig>,
}

/// A proxied repository and its remote.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RemoteConfig {
    /// Repository name, unique.
    pub name: String,

    /// Remote base URL (e.g., "http://repo.example.com/maven2/").
    pub url: String,

    /// Repository format, for logs.
    #[serde(default = "default_format")]
    pub format: String,

    /// Manually block the remote.
    #[serde(default)]
    pub blocked: bool,

    /// Automatically block the remote when it fails.
    #[serde(default = "default_true")]
    pub auto_block: bool,

    /// Repository online. An offline repository never contacts its remote.
    #[serde(default = "default_true")]
    pub online: bool,

    #[serde(default)]
    pub auto_block_policy: AutoBlockPolicyConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

fn default_format() -> String {
    "raw".to_string()
}

fn default_true() -> bool {
    true
}

/// Block window sizing and which statuses trip the breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AutoBlockPolicyConfig {
    /// First block window in seconds.
    pub min_block_secs: u64,

    /// Optional ceiling for a block window in seconds.
    pub max_block_secs: Option<u64>,

    /// Status codes that mark the remote unavailable. Unset means any 5xx.
    pub block_on_status: Option<Vec<u16>>,
}

impl Default for AutoBlockPolicyConfig {
    fn default() -> Self {
        Self {
            min_block_secs: 40,
            max_block_secs: None,
            block_on_status: None,
        }
    }
}

/// Outbound connection settings for one remote.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_timeout_secs: u64,

    /// Maximum concurrent requests to the remote.
    pub max_connections: usize,

    /// How long a request may wait for a free connection, in milliseconds.
    pub pool_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 20,
            request_timeout_secs: 60,
            idle_timeout_secs: 30,
            max_connections: 20,
            pool_timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "remote_guard=info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:8081").
    pub bind_address: String,

    /// Bearer token required on every admin request.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: "admin-secret-key".to_string(),
            request_timeout_secs: 30,
        }
    }
}
