//! Registry for all carrier plugins and their link-time registration table.
//!
//! Carrier crates register a [`PluginDescriptor`] into [`CARRIER_PLUGINS`]:
//!
//! ```ignore
//! #[linkme::distributed_slice(parcelhub_core::CARRIER_PLUGINS)]
//! static COUNTER: PluginDescriptor = PluginDescriptor::of::<CounterCarrier>();
//! ```
//!
//! A binary only sees carriers whose crates it links.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::model::{CarrierSummary, Config, ConfigurationField, Service, Uid};
use crate::ports::{CacheHandle, Carrier, CarrierPlugin, HubError};

type Factory = fn(&Config, CacheHandle) -> Result<Arc<dyn Carrier>, HubError>;

/// Registration table filled at link time by carrier crates.
#[linkme::distributed_slice]
pub static CARRIER_PLUGINS: [PluginDescriptor] = [..];

/// Type-level entry point of one carrier: its UID and how to query and build it.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    uid: &'static str,
    name: &'static str,
    configuration: fn() -> Vec<ConfigurationField>,
    services: fn() -> Vec<Service>,
    factory: Factory,
}

impl PluginDescriptor {
    /// Describe a carrier plugin type.
    #[must_use]
    pub const fn of<P: CarrierPlugin>() -> Self {
        Self {
            uid: P::UID,
            name: P::NAME,
            configuration: P::configuration,
            services: P::services,
            factory: instantiate::<P>,
        }
    }

    /// Carrier identifier.
    #[must_use]
    pub fn uid(&self) -> Uid {
        Uid::from(self.uid)
    }

    /// Carrier display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared configuration fields.
    #[must_use]
    pub fn configuration(&self) -> Vec<ConfigurationField> {
        (self.configuration)()
    }

    /// Declared services.
    #[must_use]
    pub fn services(&self) -> Vec<Service> {
        (self.services)()
    }

    /// Construct a carrier instance.
    ///
    /// # Errors
    ///
    /// Propagates the carrier's construction error.
    pub fn instantiate(
        &self,
        config: &Config,
        cache: CacheHandle,
    ) -> Result<Arc<dyn Carrier>, HubError> {
        (self.factory)(config, cache)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PluginDescriptor")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn instantiate<P: CarrierPlugin>(
    config: &Config,
    cache: CacheHandle,
) -> Result<Arc<dyn Carrier>, HubError> {
    let carrier: Arc<dyn Carrier> = Arc::new(P::from_config(config, cache)?);
    Ok(carrier)
}

/// Registry that resolves carrier plugins by UID.
#[derive(Debug)]
pub struct PluginRegistry {
    plugins: BTreeMap<Uid, PluginDescriptor>,
}

impl PluginRegistry {
    /// Build a registry from the provided descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateUid`] when two descriptors share a UID; no registry is built.
    pub fn new<I: IntoIterator<Item = PluginDescriptor>>(plugins: I) -> Result<Self, HubError> {
        let mut plugins_map = BTreeMap::new();
        for plugin in plugins {
            let uid = plugin.uid();
            if plugins_map.contains_key(&uid) {
                error!(uid = %uid, "carrier uid registered twice");
                return Err(HubError::DuplicateUid(uid));
            }
            plugins_map.insert(uid, plugin);
        }
        info!(carriers = plugins_map.len(), "carrier registry built");
        Ok(Self {
            plugins: plugins_map,
        })
    }

    /// Build a registry from every carrier linked into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateUid`] when two linked carriers share a UID.
    pub fn discover() -> Result<Self, HubError> {
        Self::new(CARRIER_PLUGINS.iter().copied())
    }

    /// UIDs of all registered carriers.
    #[must_use]
    pub fn uids(&self) -> BTreeSet<Uid> {
        self.plugins.keys().cloned().collect()
    }

    /// UID and display name of all registered carriers.
    #[must_use]
    pub fn carriers(&self) -> Vec<CarrierSummary> {
        self.plugins
            .values()
            .map(|plugin| CarrierSummary {
                uid: plugin.uid(),
                name: plugin.name().to_owned(),
            })
            .collect()
    }

    /// Number of registered carriers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no carrier is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Look up the plugin for one carrier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] when no plugin is registered under `uid`.
    pub fn plugin(&self, uid: &Uid) -> Result<&PluginDescriptor, HubError> {
        self.plugins
            .get(uid)
            .ok_or_else(|| HubError::UnknownUid(uid.clone()))
    }

    /// Resolve a carrier selection.
    ///
    /// `None` or an empty slice selects every carrier in UID order. Otherwise the
    /// result follows the requested order with repeated UIDs collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] for the first requested UID that is not registered.
    pub fn resolve(&self, requested: Option<&[Uid]>) -> Result<Vec<&PluginDescriptor>, HubError> {
        let Some(requested) = requested.filter(|uids| !uids.is_empty()) else {
            return Ok(self.plugins.values().collect());
        };

        let mut seen = BTreeSet::new();
        let mut selected = Vec::with_capacity(requested.len());
        for uid in requested {
            let plugin = self.plugin(uid)?;
            if seen.insert(uid) {
                selected.push(plugin);
            }
        }
        Ok(selected)
    }
}
