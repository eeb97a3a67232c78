//! Traits describing carrier capabilities, the cache contract, and the shared error type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;

use crate::model::{
    Config, ConfigurationField, Label, LabelFormat, Location, Order, Service, Shop, Uid,
};

#[derive(thiserror::Error, Debug)]
/// Errors raised by the registry, the dispatcher, or a carrier.
pub enum HubError {
    /// Two registered carriers declare the same UID.
    #[error("Duplicate carrier uid: {0}")]
    DuplicateUid(Uid),
    /// A request or an order names a carrier that is not registered.
    #[error("Unknown carrier uid: {0}")]
    UnknownUid(Uid),
    /// A carrier rejected an order or location.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A required configuration value is missing.
    #[error("Missing configuration value: {0}")]
    MissingConfiguration(String),
    /// A configuration value has the wrong type or an unusable content.
    #[error("Invalid configuration value {field}: {reason}")]
    InvalidConfiguration {
        /// Offending field name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// A carrier payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] JsonError),
    /// A carrier did not answer within the dispatch deadline.
    #[error("Carrier {uid} timed out after {timeout_ms}ms")]
    Timeout {
        /// Carrier that timed out.
        uid: Uid,
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },
    /// Carrier-specific failure.
    #[error("Carrier {uid} failed: {message}")]
    Carrier {
        /// Failing carrier.
        uid: Uid,
        /// Carrier-provided description.
        message: String,
    },
}

impl HubError {
    /// Whether the error means the order or location itself was rejected.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, HubError::Validation(_))
    }
}

/// Key/value cache shared by all carrier instances of one facade.
///
/// Implementations synchronize internally; carriers only hold a shared reference.
pub trait CarrierCache: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store an entry, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>);

    /// Drop an entry.
    fn remove(&self, key: &str);

    /// Atomically bump the big-endian `u64` counter stored under `key` and return the new
    /// value; a missing or malformed entry counts as zero.
    fn increment(&self, key: &str) -> u64;
}

/// Shared handle to the platform cache.
pub type CacheHandle = Arc<dyn CarrierCache>;

#[async_trait]
/// Operations of a constructed carrier instance.
pub trait Carrier: Send + Sync {
    /// UID of the carrier this instance belongs to.
    fn uid(&self) -> Uid;

    /// Look up drop-off points near a location.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] when the carrier backend fails or rejects the location.
    async fn shops(&self, location: &Location, limit: usize) -> Result<Vec<Shop>, HubError>;

    /// Generate a label for an order owned by this carrier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the order does not meet the carrier's
    /// preconditions, or another [`HubError`] when generation fails.
    async fn label(&self, order: &Order, format: LabelFormat) -> Result<Label, HubError>;
}

/// Type-level contract of a carrier plugin.
///
/// Implementors are registered through
/// [`PluginDescriptor::of`](crate::plugin::PluginDescriptor::of).
pub trait CarrierPlugin: Carrier + Sized + 'static {
    /// Globally unique carrier identifier.
    const UID: &'static str;
    /// Human-friendly carrier name.
    const NAME: &'static str;

    /// Configuration fields the carrier reads from [`Config`].
    fn configuration() -> Vec<ConfigurationField>;

    /// Services the carrier can ship; every `parent_id` equals [`Self::UID`].
    fn services() -> Vec<Service>;

    /// Construct an instance bound to a configuration snapshot and the shared cache.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] when the configuration is unusable.
    fn from_config(config: &Config, cache: CacheHandle) -> Result<Self, HubError>;

    /// UID as an owned identifier.
    #[must_use]
    fn uid_value() -> Uid {
        Uid::from(Self::UID)
    }
}
