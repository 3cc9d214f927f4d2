//! Failure classification.
//!
//! Maps transport errors and response statuses onto the question the guard
//! cares about: does this outcome say anything about the remote's health?
//!
//! # Rules
//! - Pool checkout timeouts are local exhaustion and never block the remote
//! - TLS trust failures block with reason "Untrusted Remote"
//! - Every other transport error blocks, reason `"<Kind>: <message>"`
//! - Response statuses are delegated to the remote's [`AutoBlockPolicy`]

use axum::http::StatusCode;

use crate::client::transport::TransportError;
use crate::resilience::policy::AutoBlockPolicy;

pub const UNTRUSTED_REMOTE: &str = "Untrusted Remote";

/// Outcome of classifying a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Client-side condition; circuit state must not change.
    Ignorable,
    /// The remote looks unhealthy.
    RemoteUnavailable { reason: String },
}

pub fn classify_transport_failure(err: &TransportError) -> FailureClass {
    match err {
        TransportError::PoolTimeout(_) => FailureClass::Ignorable,
        TransportError::UntrustedRemote(_) => FailureClass::RemoteUnavailable {
            reason: UNTRUSTED_REMOTE.to_string(),
        },
        other => FailureClass::RemoteUnavailable {
            reason: format!("{}: {}", other.kind_name(), other),
        },
    }
}

/// True when the policy treats `status` as a remote-unavailable signal.
pub fn classify_status_code(status: StatusCode, policy: &dyn AutoBlockPolicy) -> bool {
    policy.should_block(status)
}

/// Reason recorded for a policy-flagged response.
pub fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}
