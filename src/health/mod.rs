//! Remote health subsystem.
//!
//! # Data Flow
//! ```text
//! Guard observes an outcome:
//!     → status.rs (new immutable ConnectionStatus)
//!     → publisher.rs (store latest, forward meaningful transitions to sinks)
//!
//! Guard opens a block window:
//!     → probe.rs (sleep until deadline, then HEAD through the guard)
//! ```
//!
//! # Design Decisions
//! - Status is replaced wholesale, never mutated
//! - Sustained outages notify once per window, not once per failure
//! - At most one probe per guard; the newest deadline wins

pub mod probe;
pub mod publisher;
pub mod status;

pub use publisher::{BroadcastSink, LoggingSink, StatusChangedEvent, StatusPublisher, StatusSink};
pub use status::{ConnectionStatus, StatusKind, StatusView};
