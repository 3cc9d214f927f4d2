//! Remote connection guard.
//!
//! Wraps a [`Transport`] and protects one remote (the main target):
//!
//! ```text
//! execute(request)
//!     → off-target?            → transport, unfiltered
//!     → manually blocked?      → GuardError::ManuallyBlocked
//!     → offline?               → GuardError::Offline
//!     → inside block window?   → GuardError::AutoBlocked
//!     → transport
//!         → success            → reset backoff, retire probe, AVAILABLE
//!         → ignorable failure  → no bookkeeping
//!         → remote failure or
//!           policy-flagged     → open window (first one wins), probe,
//!                                AUTO_BLOCKED_UNAVAILABLE / UNAVAILABLE
//!     → caller gets the transport's outcome unchanged
//! ```
//!
//! All shared bookkeeping (deadline, backoff, probe handle, published status)
//! is written under one short mutex; the transport call never holds it.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode, Uri};
use thiserror::Error;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::client::target::Target;
use crate::client::transport::{Transport, TransportError};
use crate::config::schema::RemoteConfig;
use crate::health::probe::ProbeHandle;
use crate::health::publisher::StatusPublisher;
use crate::health::status::ConnectionStatus;
use crate::observability::metrics;
use crate::resilience::backoff::{BackoffSequence, DEFAULT_MIN_BLOCK};
use crate::resilience::classify::{
    classify_status_code, classify_transport_failure, status_reason, FailureClass,
};
use crate::resilience::policy::AutoBlockPolicy;

const PROBE_USER_AGENT: &str = "remote-guard-probe";

/// Longest single block window, whatever the backoff or options say.
pub const LONGEST_BLOCK: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Errors returned by [`ConnectionGuard::execute`].
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Remote Manually Blocked")]
    ManuallyBlocked,

    #[error("Remote Auto Blocked for another {}s", .remaining.as_secs())]
    AutoBlocked { until: Instant, remaining: Duration },

    #[error("Repository Offline")]
    Offline,

    /// Whatever the transport raised, untouched.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GuardError {
    /// True for errors raised by the guard without contacting the remote.
    pub fn is_blocked(&self) -> bool {
        !matches!(self, GuardError::Transport(_))
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            GuardError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Construction-time settings; changing any of them means a new guard.
#[derive(Debug, Clone)]
pub struct GuardOptions {
    pub repository: String,
    /// Fixes the main target up front. Without it the first absolute request
    /// decides.
    pub remote_url: Option<Url>,
    pub manual_block: bool,
    pub auto_block: bool,
    pub online: bool,
    pub min_block: Duration,
    /// Optional ceiling for a single block window.
    pub max_block: Option<Duration>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            repository: "default".to_string(),
            remote_url: None,
            manual_block: false,
            auto_block: true,
            online: true,
            min_block: DEFAULT_MIN_BLOCK,
            max_block: None,
        }
    }
}

impl GuardOptions {
    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self {
            repository: remote.name.clone(),
            remote_url: Url::parse(&remote.url).ok(),
            manual_block: remote.blocked,
            auto_block: remote.auto_block,
            online: remote.online,
            min_block: Duration::from_secs(remote.auto_block_policy.min_block_secs),
            max_block: remote.auto_block_policy.max_block_secs.map(Duration::from_secs),
        }
    }
}

struct GuardState {
    blocked_until: Option<Instant>,
    backoff: BackoffSequence,
    probe: Option<ProbeHandle>,
    closed: bool,
}

struct GuardInner {
    options: GuardOptions,
    transport: Arc<dyn Transport>,
    policy: Arc<dyn AutoBlockPolicy>,
    publisher: StatusPublisher,
    main_target: OnceLock<Target>,
    state: Mutex<GuardState>,
}

/// Health guard around the transport of one repository remote.
///
/// Cheap to clone; clones share state. Dropping the last clone cancels a
/// sleeping probe.
#[derive(Clone)]
pub struct ConnectionGuard {
    inner: Arc<GuardInner>,
}

impl ConnectionGuard {
    pub fn new(
        options: GuardOptions,
        transport: Arc<dyn Transport>,
        policy: Arc<dyn AutoBlockPolicy>,
        publisher: StatusPublisher,
    ) -> Self {
        let main_target = OnceLock::new();
        if let Some(target) = options.remote_url.as_ref().and_then(Target::from_url) {
            let _ = main_target.set(target);
        }

        let initial = if options.manual_block {
            ConnectionStatus::manually_blocked()
        } else if !options.online {
            ConnectionStatus::offline()
        } else {
            ConnectionStatus::ready()
        };

        let inner = GuardInner {
            state: Mutex::new(GuardState {
                blocked_until: None,
                backoff: BackoffSequence::new(options.min_block),
                probe: None,
                closed: false,
            }),
            options,
            transport,
            policy,
            publisher,
            main_target,
        };

        {
            let _state = inner.lock_state();
            inner.publisher.publish(initial);
        }

        tracing::debug!(
            repository = %inner.options.repository,
            main_target = ?inner.main_target.get().map(|t| t.to_string()),
            auto_block = inner.options.auto_block,
            "Created connection guard"
        );

        Self { inner: Arc::new(inner) }
    }

    /// Send `request` through the guard.
    pub async fn execute(&self, request: Request<Body>) -> Result<Response<Body>, GuardError> {
        self.inner.execute(request).await
    }

    /// HEAD the remote through the guard, as the recovery probe does.
    ///
    /// `None` until the main target is known.
    pub async fn check(&self) -> Option<Result<StatusCode, GuardError>> {
        let uri = self.inner.probe_uri()?;
        let request = match probe_request(&uri) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build check request");
                return None;
            }
        };
        Some(self.inner.execute(request).await.map(|response| response.status()))
    }

    pub fn current_status(&self) -> Arc<ConnectionStatus> {
        self.inner.publisher.current()
    }

    pub fn repository(&self) -> &str {
        &self.inner.options.repository
    }

    pub fn options(&self) -> &GuardOptions {
        &self.inner.options
    }

    pub fn main_target(&self) -> Option<&Target> {
        self.inner.main_target.get()
    }

    /// Deadline of the open block window, if any.
    pub fn blocked_until(&self) -> Option<Instant> {
        self.inner.lock_state().blocked_until
    }

    /// Deadline of the scheduled probe, if any.
    pub fn probe_deadline(&self) -> Option<Instant> {
        self.inner.lock_state().probe.as_ref().map(ProbeHandle::deadline)
    }

    /// Cancel any sleeping probe and stop scheduling new ones. Idempotent.
    pub fn close(&self) {
        let mut state = self.inner.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        if let Some(probe) = state.probe.take() {
            probe.retire();
        }
        tracing::debug!(repository = %self.inner.options.repository, "Closed connection guard");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("repository", &self.inner.options.repository)
            .field("main_target", &self.inner.main_target.get())
            .field("status", &self.inner.publisher.current().kind())
            .finish()
    }
}

impl GuardInner {
    fn lock_state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn repository(&self) -> &str {
        &self.options.repository
    }

    fn is_main_target(&self, uri: &Uri) -> bool {
        match Target::from_uri(uri) {
            Some(target) => *self.main_target.get_or_init(|| target.clone()) == target,
            // Relative URIs resolve against the remote.
            None => true,
        }
    }

    async fn execute(self: &Arc<Self>, request: Request<Body>) -> Result<Response<Body>, GuardError> {
        if !self.is_main_target(request.uri()) {
            return self.transport.send(request).await.map_err(GuardError::from);
        }

        self.check_blocked()?;

        let request_url = request.uri().to_string();
        match self.transport.send(request).await {
            Ok(response) => {
                let status = response.status();
                if classify_status_code(status, self.policy.as_ref()) {
                    self.record_failure(status_reason(status), request_url);
                } else {
                    self.record_success(request_url);
                }
                Ok(response)
            }
            Err(err) => {
                match classify_transport_failure(&err) {
                    FailureClass::Ignorable => {
                        tracing::debug!(
                            repository = %self.repository(),
                            error = %err,
                            "Local transport failure; remote status unchanged"
                        );
                    }
                    FailureClass::RemoteUnavailable { reason } => {
                        self.record_failure(reason, request_url);
                    }
                }
                Err(err.into())
            }
        }
    }

    fn check_blocked(&self) -> Result<(), GuardError> {
        if self.options.manual_block {
            metrics::record_blocked_request(self.repository(), "manual");
            return Err(GuardError::ManuallyBlocked);
        }
        if !self.options.online {
            metrics::record_blocked_request(self.repository(), "offline");
            return Err(GuardError::Offline);
        }

        let blocked_until = self.lock_state().blocked_until;
        if let Some(until) = blocked_until {
            let now = Instant::now();
            if now < until {
                metrics::record_blocked_request(self.repository(), "auto");
                return Err(GuardError::AutoBlocked {
                    until,
                    remaining: until - now,
                });
            }
        }
        Ok(())
    }

    fn record_success(&self, request_url: String) {
        let mut state = self.lock_state();
        state.backoff.reset();
        state.blocked_until = None;
        if let Some(probe) = state.probe.take() {
            probe.retire();
        }
        self.publisher.publish(ConnectionStatus::available(Some(request_url)));
    }

    fn record_failure(self: &Arc<Self>, reason: String, request_url: String) {
        metrics::record_remote_failure(self.repository());
        let mut state = self.lock_state();

        if !self.options.auto_block {
            self.publisher
                .publish(ConnectionStatus::unavailable(reason, Some(request_url)));
            return;
        }

        // Deadline is checked now, not when the failure was observed.
        let now = Instant::now();
        if let Some(until) = state.blocked_until {
            if until > now {
                tracing::trace!(repository = %self.repository(), "Block window already open");
                return;
            }
        }

        let mut window = state.backoff.next().min(LONGEST_BLOCK);
        if let Some(max) = self.options.max_block {
            window = window.min(max);
        }
        let until = now
            .checked_add(window)
            .unwrap_or_else(|| now + DEFAULT_MIN_BLOCK);
        state.blocked_until = Some(until);

        if state.closed {
            tracing::debug!(repository = %self.repository(), "Guard closed; not scheduling probe");
        } else {
            self.schedule_probe(&mut state, until);
        }

        tracing::warn!(
            repository = %self.repository(),
            reason = %reason,
            url = %request_url,
            block_secs = window.as_secs(),
            "Remote auto-blocked"
        );
        self.publisher.publish(ConnectionStatus::auto_blocked(
            reason,
            until,
            Some(request_url),
        ));
    }

    fn schedule_probe(self: &Arc<Self>, state: &mut GuardState, deadline: Instant) {
        if let Some(previous) = state.probe.take() {
            previous.retire();
        }

        let Some(uri) = self.probe_uri() else {
            tracing::warn!(repository = %self.repository(), "No main target to probe");
            return;
        };

        let guard = Arc::downgrade(self);
        state.probe = Some(ProbeHandle::spawn(deadline, move || async move {
            if let Some(inner) = guard.upgrade() {
                inner.run_probe(uri).await;
            }
        }));
    }

    async fn run_probe(self: Arc<Self>, uri: Uri) {
        let request = match probe_request(&uri) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(repository = %self.repository(), error = %e, "Failed to build probe request");
                return;
            }
        };

        match self.execute(request).await {
            Ok(response) => {
                let outcome = if self.policy.should_block(response.status()) {
                    "flagged"
                } else {
                    "ok"
                };
                metrics::record_probe(self.repository(), outcome);
                tracing::debug!(
                    repository = %self.repository(),
                    status = %response.status(),
                    "Recovery probe completed"
                );
            }
            Err(e) => {
                metrics::record_probe(self.repository(), "failed");
                tracing::debug!(repository = %self.repository(), error = %e, "Recovery probe failed");
            }
        }
    }

    fn probe_uri(&self) -> Option<Uri> {
        self.options
            .remote_url
            .as_ref()
            .and_then(|url| url.as_str().parse().ok())
            .or_else(|| self.main_target.get().and_then(Target::root_uri))
    }
}

fn probe_request(uri: &Uri) -> Result<Request<Body>, axum::http::Error> {
    Request::head(uri.clone())
        .header(header::USER_AGENT, PROBE_USER_AGENT)
        .header("x-request-id", Uuid::new_v4().to_string())
        .body(Body::empty())
}
