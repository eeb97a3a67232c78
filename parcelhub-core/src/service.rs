//! High-level facade combining all carriers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::model::{
    CarrierSummary, Config, ConfigurationField, Label, LabelFormat, Location, Order, Service,
    ServiceId, Shop, Uid,
};
use crate::plugin::{PluginDescriptor, PluginRegistry};
use crate::ports::{CacheHandle, Carrier, HubError};
use crate::settings::DispatchSettings;

/// Default number of shops requested per carrier.
pub const DEFAULT_SHOP_LIMIT: usize = 10;

#[derive(Debug)]
/// Outcome of a shop search for one carrier.
pub struct CarrierShops {
    /// Carrier that was asked.
    pub uid: Uid,
    /// Shops found, or why the carrier could not answer.
    pub shops: Result<Vec<Shop>, HubError>,
}

type InstanceKey = (Uid, u64);

/// Public entry point for listing carriers, searching shops, and generating labels.
pub struct ParcelHub {
    registry: Arc<PluginRegistry>,
    config: RwLock<Arc<Config>>,
    cache: CacheHandle,
    settings: DispatchSettings,
    instances: Mutex<HashMap<InstanceKey, Arc<dyn Carrier>>>,
}

impl ParcelHub {
    /// Create a facade bound to a registry, a configuration snapshot, and the shared cache.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>, config: Config, cache: CacheHandle) -> Self {
        Self {
            registry,
            config: RwLock::new(Arc::new(config)),
            cache,
            settings: DispatchSettings::default(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the dispatch settings.
    #[must_use]
    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Active dispatch settings.
    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new configuration snapshot and drop all cached carrier instances.
    pub fn reconfigure(&self, config: Config) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        self.clear_instances();
    }

    /// Drop all cached carrier instances.
    pub fn clear_instances(&self) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// UIDs of all available carriers.
    #[must_use]
    pub fn list_carriers(&self) -> BTreeSet<Uid> {
        self.registry.uids()
    }

    /// All available carriers with their display names.
    #[must_use]
    pub fn carriers(&self) -> Vec<CarrierSummary> {
        self.registry.carriers()
    }

    /// Configuration fields per carrier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if `carriers` names an unregistered carrier.
    pub fn configuration(
        &self,
        carriers: Option<&[Uid]>,
    ) -> Result<BTreeMap<Uid, Vec<ConfigurationField>>, HubError> {
        Ok(self
            .registry
            .resolve(carriers)?
            .into_iter()
            .map(|plugin| (plugin.uid(), plugin.configuration()))
            .collect())
    }

    /// Services per carrier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if `carriers` names an unregistered carrier.
    pub fn services(
        &self,
        carriers: Option<&[Uid]>,
    ) -> Result<BTreeMap<Uid, Vec<Service>>, HubError> {
        Ok(self
            .registry
            .resolve(carriers)?
            .into_iter()
            .map(|plugin| (plugin.uid(), plugin.services()))
            .collect())
    }

    /// Look up one service of a carrier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if the carrier is not registered.
    pub fn find_service(&self, uid: &Uid, id: &ServiceId) -> Result<Option<Service>, HubError> {
        Ok(self
            .registry
            .plugin(uid)?
            .services()
            .into_iter()
            .find(|service| &service.id == id))
    }

    /// Check the current configuration against each carrier's declared fields.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if `carriers` names an unregistered carrier.
    pub fn validate_configuration(
        &self,
        carriers: Option<&[Uid]>,
    ) -> Result<BTreeMap<Uid, Vec<HubError>>, HubError> {
        let config = self.config();
        Ok(self
            .registry
            .resolve(carriers)?
            .into_iter()
            .map(|plugin| (plugin.uid(), config.validate_against(&plugin.configuration())))
            .collect())
    }

    /// Search drop-off points near `location` at every selected carrier.
    ///
    /// Carriers are queried concurrently, at most `max_concurrency` at a time and each
    /// within the plugin timeout. The result has one entry per selected carrier in
    /// selection order; a carrier failure is reported in its entry unless `fail_fast`
    /// is set, in which case the first failure is returned and pending calls are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if `carriers` names an unregistered carrier, or the
    /// first carrier failure when `fail_fast` is set.
    pub async fn shops(
        &self,
        location: &Location,
        limit: usize,
        carriers: Option<&[Uid]>,
    ) -> Result<Vec<CarrierShops>, HubError> {
        let plugins = self.registry.resolve(carriers)?;
        let config = self.config();
        let mut results = Vec::with_capacity(plugins.len());

        let mut pending = pin!(
            stream::iter(plugins)
                .map(|plugin| {
                    let config = Arc::clone(&config);
                    async move {
                        let uid = plugin.uid();
                        let shops = self
                            .within_deadline(&uid, async {
                                let carrier = self.instance(plugin, &config)?;
                                carrier.shops(location, limit).await
                            })
                            .await;
                        CarrierShops { uid, shops }
                    }
                })
                .buffered(self.settings.concurrency())
        );

        while let Some(entry) = pending.next().await {
            match entry.shops {
                Err(err) if self.settings.fail_fast => {
                    warn!(uid = %entry.uid, error = %err, "carrier shop search failed, aborting");
                    return Err(err);
                }
                Err(ref err) => {
                    warn!(uid = %entry.uid, error = %err, "carrier shop search failed");
                }
                Ok(_) => {}
            }
            results.push(entry);
        }

        Ok(results)
    }

    /// Generate the label for one order at the carrier owning its service.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownUid`] if the service's carrier is not registered, or the
    /// carrier's validation, timeout, or operation error.
    pub async fn label(&self, order: &Order, format: LabelFormat) -> Result<Label, HubError> {
        let uid = order.uid();
        let plugin = self.registry.plugin(uid)?;
        let config = self.config();

        self.within_deadline(uid, async {
            let carrier = self.instance(plugin, &config)?;
            carrier.label(order, format).await
        })
        .await
    }

    /// Generate labels for orders of mixed carriers, skipping orders that fail.
    ///
    /// Labels keep the relative order of their orders.
    pub async fn labels(&self, orders: &[Order], format: LabelFormat) -> Vec<Label> {
        self.labels_detailed(orders, format)
            .await
            .into_iter()
            .zip(orders)
            .filter_map(|(result, order)| match result {
                Ok(label) => Some(label),
                Err(err) => {
                    warn!(
                        order = %order.reference,
                        uid = %order.uid(),
                        error = %err,
                        "skipping order without label"
                    );
                    None
                }
            })
            .collect()
    }

    /// Generate labels for orders of mixed carriers, one result per order in input order.
    pub async fn labels_detailed(
        &self,
        orders: &[Order],
        format: LabelFormat,
    ) -> Vec<Result<Label, HubError>> {
        stream::iter(orders)
            .map(|order| self.label(order, format))
            .buffered(self.settings.concurrency())
            .collect()
            .await
    }

    fn instance(
        &self,
        plugin: &PluginDescriptor,
        config: &Config,
    ) -> Result<Arc<dyn Carrier>, HubError> {
        if !self.settings.reuse_instances {
            return plugin.instantiate(config, Arc::clone(&self.cache));
        }

        let key = (plugin.uid(), config.fingerprint());
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(carrier) = instances.get(&key) {
            debug!(uid = %key.0, "reusing carrier instance");
            return Ok(Arc::clone(carrier));
        }

        let carrier = plugin.instantiate(config, Arc::clone(&self.cache))?;
        instances.insert(key, Arc::clone(&carrier));
        Ok(carrier)
    }

    async fn within_deadline<T, F>(&self, uid: &Uid, call: F) -> Result<T, HubError>
    where
        F: Future<Output = Result<T, HubError>>,
    {
        tokio::time::timeout(self.settings.plugin_timeout(), call)
            .await
            .unwrap_or_else(|_elapsed| {
                Err(HubError::Timeout {
                    uid: uid.clone(),
                    timeout_ms: self.settings.plugin_timeout_ms,
                })
            })
    }
}
