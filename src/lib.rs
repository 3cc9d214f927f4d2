//! Remote connection health guard for repository proxies.
//!
//! Wraps the outbound HTTP transport of a proxied repository, blocks the
//! remote manually or automatically after failures, probes it in the
//! background while blocked, and publishes one consistent status per remote.

pub mod admin;
pub mod client;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{ConnectionGuard, GuardError, GuardOptions, GuardRegistry, Transport, TransportError};
pub use config::schema::GuardConfig;
pub use health::{ConnectionStatus, StatusKind};
pub use lifecycle::Shutdown;
