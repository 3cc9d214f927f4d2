//! Remote connection status snapshots.
//!
//! # States
//! ```text
//! Uninitialized → Ready | Offline | ManuallyBlocked   (at construction)
//! Ready → Available | AutoBlockedUnavailable | Unavailable
//! Available ⇄ AutoBlockedUnavailable                  (auto-block on)
//! Available ⇄ Unavailable                             (auto-block off)
//! ```
//!
//! A [`ConnectionStatus`] is immutable. The guard replaces it wholesale, so a
//! reader always sees a consistent kind/reason/deadline triple. The deadline
//! exists exactly when the kind is `AutoBlockedUnavailable`; the constructors
//! are the only way to build a status.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Uninitialized = 0,
    Ready = 1,
    Available = 2,
    ManuallyBlocked = 3,
    AutoBlockedUnavailable = 4,
    Unavailable = 5,
    Offline = 6,
}

impl StatusKind {
    pub fn description(&self) -> &'static str {
        match self {
            StatusKind::Uninitialized => "Uninitialised",
            StatusKind::Ready => "Ready to Connect",
            StatusKind::Available => "Remote Available",
            StatusKind::ManuallyBlocked => "Remote Manually Blocked",
            StatusKind::AutoBlockedUnavailable => "Remote Auto Blocked and Unavailable",
            StatusKind::Unavailable => "Remote Unavailable",
            StatusKind::Offline => "Repository Offline",
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, StatusKind::ManuallyBlocked | StatusKind::AutoBlockedUnavailable)
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusKind::Uninitialized => "UNINITIALIZED",
            StatusKind::Ready => "READY",
            StatusKind::Available => "AVAILABLE",
            StatusKind::ManuallyBlocked => "MANUALLY_BLOCKED",
            StatusKind::AutoBlockedUnavailable => "AUTO_BLOCKED_UNAVAILABLE",
            StatusKind::Unavailable => "UNAVAILABLE",
            StatusKind::Offline => "OFFLINE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    kind: StatusKind,
    reason: Option<String>,
    blocked_until: Option<Instant>,
    request_url: Option<String>,
}

impl ConnectionStatus {
    fn of(kind: StatusKind, reason: Option<String>, request_url: Option<String>) -> Self {
        Self {
            kind,
            reason,
            blocked_until: None,
            request_url,
        }
    }

    pub fn uninitialized() -> Self {
        Self::of(StatusKind::Uninitialized, None, None)
    }

    pub fn ready() -> Self {
        Self::of(StatusKind::Ready, None, None)
    }

    pub fn offline() -> Self {
        Self::of(StatusKind::Offline, None, None)
    }

    pub fn manually_blocked() -> Self {
        Self::of(StatusKind::ManuallyBlocked, None, None)
    }

    pub fn available(request_url: Option<String>) -> Self {
        Self::of(StatusKind::Available, None, request_url)
    }

    pub fn unavailable(reason: impl Into<String>, request_url: Option<String>) -> Self {
        Self::of(StatusKind::Unavailable, Some(reason.into()), request_url)
    }

    pub fn auto_blocked(
        reason: impl Into<String>,
        blocked_until: Instant,
        request_url: Option<String>,
    ) -> Self {
        Self {
            kind: StatusKind::AutoBlockedUnavailable,
            reason: Some(reason.into()),
            blocked_until: Some(blocked_until),
            request_url,
        }
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocked_until
    }

    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    pub fn description(&self) -> &'static str {
        self.kind.description()
    }

    /// Remaining cool-down, zero once the deadline has passed.
    pub fn blocked_for(&self) -> Option<Duration> {
        self.blocked_until
            .map(|until| until.saturating_duration_since(Instant::now()))
    }

    /// Serialisable projection with the deadline as wall-clock time.
    pub fn view(&self) -> StatusView {
        let blocked_for = self.blocked_for();
        let blocked_until = blocked_for.map(|remaining| {
            SystemTime::now()
                .checked_add(remaining)
                .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
                .map_or(u64::MAX, saturating_millis)
        });

        StatusView {
            kind: self.kind,
            description: self.kind.description().to_string(),
            reason: self.reason.clone(),
            blocked_until,
            blocked_for_ms: blocked_for.map(saturating_millis),
            request_url: self.request_url.clone(),
        }
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::uninitialized()
    }
}

/// Status as exposed to dashboards and the admin API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusView {
    pub kind: StatusKind,
    pub description: String,
    pub reason: Option<String>,
    /// Unix epoch milliseconds.
    pub blocked_until: Option<u64>,
    pub blocked_for_ms: Option<u64>,
    pub request_url: Option<String>,
}
