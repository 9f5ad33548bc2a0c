//! Common types module for the dispatch system.
//!
//! This module defines the core data types and structures shared by every
//! dispatch component. It provides a centralized location for domain types
//! to ensure consistency across the engine, storage, gateway and API layers.

/// Caller identity types supplied by the upstream session layer.
pub mod actor;
/// API error types and the HTTP error envelope.
pub mod api;
/// Event types fanned out to dashboards and live order trackers.
pub mod events;
/// Order aggregate types: parties, itinerary, items and status enums.
pub mod order;
/// Payment reconciliation types shared by the gateway client and the engine.
pub mod payments;
/// Registry trait for self-registering backend implementations.
pub mod registry;
/// Storage namespace types for persistent collections.
pub mod storage;
/// Small helpers used across crates.
pub mod utils;
/// Configuration validation framework for TOML-backed components.
pub mod validation;

mod secret_string;

// Re-export all types for convenient access
pub use actor::*;
pub use api::*;
pub use events::*;
pub use order::*;
pub use payments::*;
pub use registry::*;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
