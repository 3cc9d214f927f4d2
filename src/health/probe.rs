//! Recovery probe.
//!
//! # Responsibilities
//! - Sleep until a block deadline without holding a request thread
//! - Then run one check (the guard sends a HEAD through itself)
//! - Exit silently if cancelled while still sleeping
//!
//! # Design Decisions
//! - Cancellation only reaches the sleep; a fired probe always finishes its
//!   request
//! - The probe task carries its id in a task-local so the guard can tell
//!   when it is being asked to retire the probe it is running on

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio::time::Instant;

static NEXT_PROBE_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static RUNNING_PROBE: u64;
}

/// Handle to a scheduled probe. Dropping it cancels a probe that has not
/// fired yet.
#[derive(Debug)]
pub struct ProbeHandle {
    id: u64,
    deadline: Instant,
    cancel: Option<oneshot::Sender<()>>,
}

impl ProbeHandle {
    /// Schedule `check` to run once `deadline` is reached.
    pub fn spawn<F, Fut>(deadline: Instant, check: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = NEXT_PROBE_ID.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(RUNNING_PROBE.scope(id, async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = cancel_rx => {
                    tracing::debug!(probe = id, "Recovery probe cancelled before firing");
                    return;
                }
            }
            tracing::debug!(probe = id, "Recovery probe firing");
            check().await;
        }));

        Self {
            id,
            deadline,
            cancel: Some(cancel_tx),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// True when called from inside this probe's own task.
    pub fn is_current_task(&self) -> bool {
        RUNNING_PROBE
            .try_with(|running| *running == self.id)
            .unwrap_or(false)
    }

    /// Retire the probe, cancelling it unless the caller is the probe itself.
    ///
    /// Returns true if a cancellation was signalled.
    pub fn retire(mut self) -> bool {
        if self.is_current_task() {
            // The sleep already completed, so its receiver is gone and
            // dropping the sender reaches nobody.
            tracing::trace!(probe = self.id, "Probe retiring itself; skipping cancellation");
            return false;
        }
        match self.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let start = Instant::now();
        let _handle = ProbeHandle::spawn(start + Duration::from_secs(40), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let handle = ProbeHandle::spawn(Instant::now() + Duration::from_secs(40), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.retire());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let handle = ProbeHandle::spawn(Instant::now() + Duration::from_secs(5), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_recognises_its_own_task() {
        let slot: Arc<std::sync::Mutex<Option<ProbeHandle>>> = Arc::default();
        let (done_tx, done_rx) = oneshot::channel();

        let inner = slot.clone();
        let handle = ProbeHandle::spawn(Instant::now() + Duration::from_secs(1), move || async move {
            let own = inner.lock().unwrap().take().unwrap();
            let is_self = own.is_current_task();
            let signalled = own.retire();
            let _ = done_tx.send((is_self, signalled));
        });
        assert!(!handle.is_current_task());
        *slot.lock().unwrap() = Some(handle);

        let (is_self, signalled) = done_rx.await.unwrap();
        assert!(is_self);
        assert!(!signalled);
    }
}
