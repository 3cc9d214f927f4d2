//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Unique, non-empty repository names
//! - Remote URLs are absolute plain-HTTP URLs with a host; the transport
//!   has no TLS, so `https` remotes would only ever fail to connect
//! - Value ranges (block windows, timeouts, status codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: GuardConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GuardConfig, RemoteConfig};

/// Largest configurable block window: one week.
pub const MAX_BLOCK_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    let mut names = HashSet::new();
    for (i, remote) in config.remotes.iter().enumerate() {
        let prefix = format!("remotes[{}]", i);
        if !remote.name.is_empty() && !names.insert(remote.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", prefix),
                format!("duplicate repository name '{}'", remote.name),
            ));
        }
        validate_remote(&prefix, remote, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_remote(prefix: &str, remote: &RemoteConfig, errors: &mut Vec<ValidationError>) {
    if remote.name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.name", prefix), "must not be empty"));
    }

    match Url::parse(&remote.url) {
        Ok(url) => {
            if url.scheme() != "http" {
                errors.push(ValidationError::new(
                    format!("{}.url", prefix),
                    format!("unsupported scheme '{}', only plain http remotes are supported", url.scheme()),
                ));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new(format!("{}.url", prefix), "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new(
            format!("{}.url", prefix),
            format!("'{}' is not a valid URL: {}", remote.url, e),
        )),
    }

    let policy = &remote.auto_block_policy;
    if policy.min_block_secs == 0 {
        errors.push(ValidationError::new(
            format!("{}.auto_block_policy.min_block_secs", prefix),
            "must be greater than 0",
        ));
    }
    if policy.min_block_secs > MAX_BLOCK_SECS {
        errors.push(ValidationError::new(
            format!("{}.auto_block_policy.min_block_secs", prefix),
            format!("must not exceed {}", MAX_BLOCK_SECS),
        ));
    }
    if let Some(max) = policy.max_block_secs {
        if max > MAX_BLOCK_SECS {
            errors.push(ValidationError::new(
                format!("{}.auto_block_policy.max_block_secs", prefix),
                format!("must not exceed {}", MAX_BLOCK_SECS),
            ));
        } else if max < policy.min_block_secs {
            errors.push(ValidationError::new(
                format!("{}.auto_block_policy.max_block_secs", prefix),
                "must not be less than min_block_secs",
            ));
        }
    }
    if let Some(codes) = &policy.block_on_status {
        for code in codes.iter().filter(|c| !(100..=599).contains(*c)) {
            errors.push(ValidationError::new(
                format!("{}.auto_block_policy.block_on_status", prefix),
                format!("{} is not an HTTP status code", code),
            ));
        }
    }

    let connection = &remote.connection;
    for (field, value) in [
        ("connect_timeout_secs", connection.connect_timeout_secs),
        ("request_timeout_secs", connection.request_timeout_secs),
        ("pool_timeout_ms", connection.pool_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(
                format!("{}.connection.{}", prefix, field),
                "must be greater than 0",
            ));
        }
    }
    if connection.max_connections == 0 {
        errors.push(ValidationError::new(
            format!("{}.connection.max_connections", prefix),
            "must be greater than 0",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AutoBlockPolicyConfig, ConnectionConfig};

    fn remote(name: &str, url: &str) -> RemoteConfig {
        RemoteConfig {
            name: name.to_string(),
            url: url.to_string(),
            format: "maven2".to_string(),
            blocked: false,
            auto_block: true,
            online: true,
            auto_block_policy: AutoBlockPolicyConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let mut config = GuardConfig::default();
        config.remotes.push(remote("central", "http://repo.example.com/maven2/"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.admin.api_key.clear();
        config.remotes.push(remote("central", "ftp://mirror.example.com/"));
        config.remotes.push(remote("central", "not a url"));
        let mut bad = remote("", "http://ok.example.com/");
        bad.auto_block_policy.min_block_secs = 0;
        bad.auto_block_policy.block_on_status = Some(vec![503, 42]);
        bad.connection.max_connections = 0;
        config.remotes.push(bad);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert!(fields.contains(&"admin.api_key"));
        assert!(fields.contains(&"remotes[0].url"));
        assert!(fields.contains(&"remotes[1].name"));
        assert!(fields.contains(&"remotes[1].url"));
        assert!(fields.contains(&"remotes[2].name"));
        assert!(fields.contains(&"remotes[2].auto_block_policy.min_block_secs"));
        assert!(fields.contains(&"remotes[2].auto_block_policy.block_on_status"));
        assert!(fields.contains(&"remotes[2].connection.max_connections"));
    }

    #[test]
    fn test_max_block_below_min_rejected() {
        let mut config = GuardConfig::default();
        let mut r = remote("central", "http://repo.example.com/maven2/");
        r.auto_block_policy.max_block_secs = Some(10);
        config.remotes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "remotes[0].auto_block_policy.max_block_secs");
    }

    #[test]
    fn test_https_remote_rejected() {
        let mut config = GuardConfig::default();
        config.remotes.push(remote("npm", "https://registry.npmjs.org/"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "remotes[0].url");
        assert!(errors[0].message.contains("'https'"));
    }

    #[test]
    fn test_block_windows_are_bounded() {
        let mut config = GuardConfig::default();
        let mut huge_min = remote("a", "http://a.example.com/");
        huge_min.auto_block_policy.min_block_secs = 9_223_372_036_854_775_807;
        let mut huge_max = remote("b", "http://b.example.com/");
        huge_max.auto_block_policy.max_block_secs = Some(MAX_BLOCK_SECS + 1);
        let mut at_limit = remote("c", "http://c.example.com/");
        at_limit.auto_block_policy.min_block_secs = MAX_BLOCK_SECS;
        at_limit.auto_block_policy.max_block_secs = Some(MAX_BLOCK_SECS);
        config.remotes.extend([huge_min, huge_max, at_limit]);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "remotes[0].auto_block_policy.min_block_secs",
                "remotes[1].auto_block_policy.max_block_secs",
            ]
        );
    }
}
