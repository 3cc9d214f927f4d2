//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → admin server drains, guards close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Guards are closed last so no probe outlives the process' intent to stop

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
