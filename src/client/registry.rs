//! Repository name → guard registry.
//!
//! # Responsibilities
//! - Build one guard (and transport) per configured remote
//! - On reconfiguration, recreate guards whose remote settings changed and
//!   close guards whose remote disappeared
//! - Fan every guard's status transitions into one broadcast channel

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::client::guard::{ConnectionGuard, GuardOptions};
use crate::client::transport::{HyperTransport, Transport};
use crate::config::schema::RemoteConfig;
use crate::health::publisher::{BroadcastSink, LoggingSink, StatusChangedEvent, StatusPublisher};
use crate::health::status::ConnectionStatus;
use crate::resilience::policy::policy_from_config;

/// Builds the transport for a remote.
pub type TransportFactory = Arc<dyn Fn(&RemoteConfig) -> Arc<dyn Transport> + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

struct Registered {
    config: RemoteConfig,
    guard: ConnectionGuard,
}

/// What [`GuardRegistry::apply`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: Vec<String>,
    pub recreated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

pub struct GuardRegistry {
    guards: DashMap<String, Registered>,
    transports: TransportFactory,
    events: broadcast::Sender<StatusChangedEvent>,
}

impl GuardRegistry {
    pub fn new(transports: TransportFactory) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            guards: DashMap::new(),
            transports,
            events,
        }
    }

    /// Registry whose remotes use [`HyperTransport`].
    pub fn with_hyper_transport() -> Self {
        Self::new(Arc::new(|remote: &RemoteConfig| {
            Arc::new(HyperTransport::new(&remote.connection)) as Arc<dyn Transport>
        }))
    }

    /// Status transitions of every registered guard.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChangedEvent> {
        self.events.subscribe()
    }

    /// Bring the registry in line with `remotes`.
    pub fn apply(&self, remotes: &[RemoteConfig]) -> ApplySummary {
        let mut summary = ApplySummary::default();
        let wanted: HashSet<&str> = remotes.iter().map(|r| r.name.as_str()).collect();

        self.guards.retain(|name, registered| {
            let keep = wanted.contains(name.as_str());
            if !keep {
                registered.guard.close();
                summary.removed.push(name.clone());
            }
            keep
        });

        for remote in remotes {
            match self.guards.entry(remote.name.clone()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().config == *remote {
                        summary.unchanged.push(remote.name.clone());
                        continue;
                    }
                    let previous = occupied.insert(self.register(remote));
                    previous.guard.close();
                    summary.recreated.push(remote.name.clone());
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(self.register(remote));
                    summary.created.push(remote.name.clone());
                }
            }
        }

        tracing::info!(
            created = summary.created.len(),
            recreated = summary.recreated.len(),
            removed = summary.removed.len(),
            unchanged = summary.unchanged.len(),
            "Applied remote configuration"
        );
        summary
    }

    fn register(&self, remote: &RemoteConfig) -> Registered {
        let publisher = StatusPublisher::new(remote.name.clone())
            .with_sink(Arc::new(LoggingSink::new(remote.name.clone())))
            .with_sink(Arc::new(BroadcastSink::new(remote.name.clone(), self.events.clone())));

        tracing::debug!(repository = %remote.name, format = %remote.format, url = %remote.url, "Creating guard");
        let guard = ConnectionGuard::new(
            GuardOptions::from_config(remote),
            (self.transports)(remote),
            policy_from_config(&remote.auto_block_policy),
            publisher,
        );

        Registered {
            config: remote.clone(),
            guard,
        }
    }

    pub fn get(&self, name: &str) -> Option<ConnectionGuard> {
        self.guards.get(name).map(|r| r.guard.clone())
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Current status of every guard, sorted by repository name.
    pub fn statuses(&self) -> Vec<(String, Arc<ConnectionStatus>)> {
        let mut statuses: Vec<_> = self
            .guards
            .iter()
            .map(|r| (r.key().clone(), r.guard.current_status()))
            .collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    pub fn close_all(&self) {
        for registered in self.guards.iter() {
            registered.guard.close();
        }
    }
}
