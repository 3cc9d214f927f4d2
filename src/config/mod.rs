//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry re-applies remotes (changed remotes get a new guard)
//! ```
//!
//! # Design Decisions
//! - A guard reads its remote settings once; changes mean a new guard
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, AutoBlockPolicyConfig, ConnectionConfig, GuardConfig, ObservabilityConfig,
    RemoteConfig,
};
