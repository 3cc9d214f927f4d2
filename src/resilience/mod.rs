//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outcome of a call to the remote:
//!     → classify.rs (ignorable vs remote-unavailable, reason string)
//!     → policy.rs (which response statuses count as unavailable)
//!     → backoff.rs (length of the next block window)
//! ```
//!
//! # Design Decisions
//! - Pure functions and plain values; the guard owns all shared state
//! - Local resource exhaustion never blocks a remote
//! - Cool-downs grow on the Fibonacci sequence and reset on success

pub mod backoff;
pub mod classify;
pub mod policy;
