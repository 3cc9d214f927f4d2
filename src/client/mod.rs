//! Guarded remote client subsystem.
//!
//! # Data Flow
//! ```text
//! Caller
//!     → guard.rs (block checks, outcome bookkeeping)
//!     → transport.rs (real HTTP call)
//!     ← response / transport error unchanged, or a local block error
//!
//! registry.rs: repository name → guard, rebuilt on config change
//! target.rs:   which host a request is addressed to
//! ```
//!
//! # Design Decisions
//! - One guard per repository remote, no process-wide state inside a guard
//! - Only traffic to the main target is filtered
//! - The guard observes outcomes; it never rewrites them

pub mod guard;
pub mod registry;
pub mod target;
pub mod transport;

pub use guard::{ConnectionGuard, GuardError, GuardOptions};
pub use registry::GuardRegistry;
pub use target::Target;
pub use transport::{HyperTransport, Transport, TransportError};
