//! Status publication with transition de-duplication.
//!
//! The publisher keeps the latest [`ConnectionStatus`] for lock-free reads and
//! forwards a change to its sinks only when it is meaningful:
//!
//! ```text
//! kind changed                                  → forward
//! AUTO_BLOCKED → AUTO_BLOCKED, later deadline   → forward (continuation)
//! anything else                                 → keep, don't forward
//! ```
//!
//! Callers serialise `publish` (the guard holds its state lock), so sinks see
//! transitions in order.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::health::status::{ConnectionStatus, StatusKind};
use crate::observability::metrics;

/// Receives meaningful status transitions.
pub trait StatusSink: Send + Sync {
    fn on_status_changed(&self, old: &ConnectionStatus, new: &ConnectionStatus);
}

pub struct StatusPublisher {
    repository: String,
    current: ArcSwap<ConnectionStatus>,
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl StatusPublisher {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            current: ArcSwap::from_pointee(ConnectionStatus::uninitialized()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn current(&self) -> Arc<ConnectionStatus> {
        self.current.load_full()
    }

    /// Store `new` and notify sinks if the transition is meaningful.
    ///
    /// Returns whether sinks were notified.
    pub fn publish(&self, new: ConnectionStatus) -> bool {
        let new = Arc::new(new);
        let old = self.current.swap(Arc::clone(&new));

        if !is_meaningful(&old, &new) {
            return false;
        }

        metrics::record_status_change(&self.repository, new.kind());
        for sink in &self.sinks {
            sink.on_status_changed(&old, &new);
        }
        true
    }
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("repository", &self.repository)
            .field("current", &self.current.load().kind())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

fn is_meaningful(old: &ConnectionStatus, new: &ConnectionStatus) -> bool {
    if old.kind() != new.kind() {
        return true;
    }
    if new.kind() != StatusKind::AutoBlockedUnavailable {
        return false;
    }
    match (old.blocked_until(), new.blocked_until()) {
        (Some(previous), Some(next)) => next > previous,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Logs every forwarded transition for one repository.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    repository: String,
}

impl LoggingSink {
    pub fn new(repository: impl Into<String>) -> Self {
        Self { repository: repository.into() }
    }
}

impl StatusSink for LoggingSink {
    fn on_status_changed(&self, old: &ConnectionStatus, new: &ConnectionStatus) {
        let blocked_for = new.blocked_for().map(|d| format!("{}s", d.as_secs()));

        if old.kind() == StatusKind::AutoBlockedUnavailable
            && new.kind() == StatusKind::AutoBlockedUnavailable
        {
            tracing::info!(
                repository = %self.repository,
                status = %new.kind(),
                blocked_for = blocked_for.as_deref().unwrap_or("n/a"),
                reason = %reason_of(new),
                previous_reason = %reason_of(old),
                "Repository status continued as blocked"
            );
        } else if old.kind() == StatusKind::Uninitialized {
            tracing::info!(
                repository = %self.repository,
                status = new.description(),
                "Remote connection status set"
            );
        } else {
            tracing::info!(
                repository = %self.repository,
                from = %old.kind(),
                to = %new.kind(),
                blocked_for = blocked_for.as_deref().unwrap_or("n/a"),
                reason = %reason_of(new),
                "Repository status changed"
            );
        }
    }
}

fn reason_of(status: &ConnectionStatus) -> String {
    format!(
        "{} for {}",
        status.reason().unwrap_or("n/a"),
        status.request_url().unwrap_or("n/a")
    )
}

/// A status transition as broadcast to in-process subscribers.
#[derive(Debug, Clone)]
pub struct StatusChangedEvent {
    pub repository: String,
    pub old: ConnectionStatus,
    pub new: ConnectionStatus,
}

/// Fans transitions out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    repository: String,
    tx: broadcast::Sender<StatusChangedEvent>,
}

impl BroadcastSink {
    pub fn new(repository: impl Into<String>, tx: broadcast::Sender<StatusChangedEvent>) -> Self {
        Self {
            repository: repository.into(),
            tx,
        }
    }
}

impl StatusSink for BroadcastSink {
    fn on_status_changed(&self, old: &ConnectionStatus, new: &ConnectionStatus) {
        // No subscribers is fine.
        let _ = self.tx.send(StatusChangedEvent {
            repository: self.repository.clone(),
            old: old.clone(),
            new: new.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(StatusKind, StatusKind)>>,
    }

    impl StatusSink for RecordingSink {
        fn on_status_changed(&self, old: &ConnectionStatus, new: &ConnectionStatus) {
            self.seen.lock().unwrap().push((old.kind(), new.kind()));
        }
    }

    fn publisher_with_recorder() -> (StatusPublisher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let publisher = StatusPublisher::new("maven-central").with_sink(sink.clone());
        (publisher, sink)
    }

    #[test]
    fn test_forwards_kind_changes_only() {
        let (publisher, sink) = publisher_with_recorder();

        assert!(publisher.publish(ConnectionStatus::ready()));
        assert!(publisher.publish(ConnectionStatus::available(Some("http://a/1".into()))));
        assert!(!publisher.publish(ConnectionStatus::available(Some("http://a/2".into()))));
        assert!(publisher.publish(ConnectionStatus::unavailable("Bad Gateway", None)));
        assert!(!publisher.publish(ConnectionStatus::unavailable("Gateway Timeout", None)));

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (StatusKind::Uninitialized, StatusKind::Ready),
                (StatusKind::Ready, StatusKind::Available),
                (StatusKind::Available, StatusKind::Unavailable),
            ]
        );
    }

    #[test]
    fn test_latest_status_kept_even_when_not_forwarded() {
        let (publisher, _sink) = publisher_with_recorder();
        publisher.publish(ConnectionStatus::unavailable("Bad Gateway", None));
        publisher.publish(ConnectionStatus::unavailable("Gateway Timeout", None));
        assert_eq!(publisher.current().reason(), Some("Gateway Timeout"));
    }

    #[test]
    fn test_repeated_failures_in_one_window_notify_once() {
        let (publisher, sink) = publisher_with_recorder();
        publisher.publish(ConnectionStatus::available(None));
        sink.seen.lock().unwrap().clear();

        let until = Instant::now() + Duration::from_secs(40);
        for _ in 0..100 {
            publisher.publish(ConnectionStatus::auto_blocked("Service Unavailable", until, None));
        }
        assert_eq!(sink.seen.lock().unwrap().len(), 1);

        let extended = until + Duration::from_secs(40);
        assert!(publisher.publish(ConnectionStatus::auto_blocked("Service Unavailable", extended, None)));
        assert_eq!(sink.seen.lock().unwrap().len(), 2);

        // An earlier deadline is not a continuation.
        assert!(!publisher.publish(ConnectionStatus::auto_blocked("Service Unavailable", until, None)));
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_events() {
        let (tx, mut rx) = broadcast::channel(8);
        let publisher = StatusPublisher::new("npm-proxy")
            .with_sink(Arc::new(BroadcastSink::new("npm-proxy", tx)));

        publisher.publish(ConnectionStatus::ready());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.repository, "npm-proxy");
        assert_eq!(event.old.kind(), StatusKind::Uninitialized);
        assert_eq!(event.new.kind(), StatusKind::Ready);
    }
}
