//! Core types, carrier registry, and dispatch facade for the parcelhub carrier aggregator.

/// In-memory carrier cache.
pub mod cache;
/// Domain models and identifiers shared by all carriers.
pub mod model;
/// Registry and link-time registration of carrier plugins.
pub mod plugin;
/// Traits describing the carrier and cache interfaces.
pub mod ports;
/// High-level facade used by clients.
pub mod service;
/// Dispatch tuning.
pub mod settings;

pub use cache::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use settings::*;
