//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard, publisher and probe produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`repository`, `status`, `reason`) on every event
//! - Metrics are cheap and safe to record with no exporter installed

pub mod logging;
pub mod metrics;
