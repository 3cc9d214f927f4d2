//! Auto-block policies.
//!
//! A policy decides which HTTP status codes signal that the remote is
//! unavailable. Not every non-2xx response trips the breaker: a 404 from a
//! proxied repository is an ordinary answer, a 503 is not.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::config::schema::AutoBlockPolicyConfig;

/// Decides whether a response status marks the remote as unavailable.
pub trait AutoBlockPolicy: Send + Sync + fmt::Debug {
    fn should_block(&self, status: StatusCode) -> bool;
}

/// Blocks on every 5xx response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerErrorPolicy;

impl AutoBlockPolicy for ServerErrorPolicy {
    fn should_block(&self, status: StatusCode) -> bool {
        status.is_server_error()
    }
}

/// Blocks only on an explicit set of status codes.
#[derive(Debug, Clone, Default)]
pub struct StatusCodePolicy {
    codes: BTreeSet<u16>,
}

impl StatusCodePolicy {
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

impl AutoBlockPolicy for StatusCodePolicy {
    fn should_block(&self, status: StatusCode) -> bool {
        self.codes.contains(&status.as_u16())
    }
}

/// Build the policy a remote's configuration asks for.
pub fn policy_from_config(config: &AutoBlockPolicyConfig) -> Arc<dyn AutoBlockPolicy> {
    match &config.block_on_status {
        Some(codes) => Arc::new(StatusCodePolicy::new(codes.iter().copied())),
        None => Arc::new(ServerErrorPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_policy() {
        let policy = ServerErrorPolicy;
        assert!(policy.should_block(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(policy.should_block(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!policy.should_block(StatusCode::NOT_FOUND));
        assert!(!policy.should_block(StatusCode::UNAUTHORIZED));
        assert!(!policy.should_block(StatusCode::OK));
    }

    #[test]
    fn test_status_code_policy_only_listed_codes() {
        let policy = StatusCodePolicy::new([503]);
        assert!(policy.should_block(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!policy.should_block(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!policy.should_block(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_policy_from_config() {
        let default = policy_from_config(&AutoBlockPolicyConfig::default());
        assert!(default.should_block(StatusCode::BAD_GATEWAY));

        let config = AutoBlockPolicyConfig {
            block_on_status: Some(vec![429, 503]),
            ..Default::default()
        };
        let listed = policy_from_config(&config);
        assert!(listed.should_block(StatusCode::TOO_MANY_REQUESTS));
        assert!(!listed.should_block(StatusCode::BAD_GATEWAY));
    }
}
