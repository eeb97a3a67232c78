//! Carrier for parcels handed over at the merchant's own store counter.
//!
//! Nothing leaves the building, so there is no backend: the configured store is the
//! only drop-off point and labels are pickup slips rendered locally.

mod slip;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use parcelhub_core::{
    Address, CARRIER_PLUGINS, CacheHandle, Carrier, CarrierPlugin, Config, ConfigurationField,
    FieldKind, GeoPoint, HubError, Label, LabelFormat, Location, Order, PluginDescriptor, Service,
    ServiceId, Shop, Uid,
};

use crate::slip::Slip;

const STORE_NAME: &str = "counter.store_name";
const STREET: &str = "counter.street";
const POSTAL_CODE: &str = "counter.postal_code";
const CITY: &str = "counter.city";
const LATITUDE: &str = "counter.latitude";
const LONGITUDE: &str = "counter.longitude";
const MAX_WEIGHT: &str = "counter.max_weight_grams";

const DEFAULT_MAX_WEIGHT_GRAMS: u32 = 20_000;
const SEQUENCE_KEY: &str = "counter:slip-sequence";

#[linkme::distributed_slice(CARRIER_PLUGINS)]
static COUNTER: PluginDescriptor = PluginDescriptor::of::<CounterCarrier>();

/// Descriptor of the counter carrier, for registries built by hand.
#[must_use]
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::of::<CounterCarrier>()
}

/// Counter carrier bound to one store.
pub struct CounterCarrier {
    store_name: String,
    address: Address,
    position: Option<GeoPoint>,
    max_weight_grams: u32,
    cache: CacheHandle,
}

impl CounterCarrier {
    fn store(&self) -> Shop {
        Shop {
            id: String::from("counter"),
            uid: Self::uid_value(),
            name: self.store_name.clone(),
            address: self.address.clone(),
            position: self.position,
            distance_m: None,
            opening_hours: Vec::new(),
        }
    }

    fn validate(&self, order: &Order, format: LabelFormat) -> Result<(), HubError> {
        if order.uid().as_str() != Self::UID {
            return Err(HubError::Validation(format!(
                "service {} belongs to carrier {}",
                order.service.id,
                order.uid()
            )));
        }
        if !Self::services()
            .iter()
            .any(|service| service.id == order.service.id)
        {
            return Err(HubError::Validation(format!(
                "unknown counter service {}",
                order.service.id
            )));
        }
        if !matches!(format, LabelFormat::Pdf | LabelFormat::Zpl) {
            return Err(HubError::Validation(format!(
                "counter slips cannot be rendered as {format}"
            )));
        }
        if order.recipient.name.trim().is_empty() {
            return Err(HubError::Validation("recipient name is empty".to_owned()));
        }
        if order.parcels.is_empty() {
            return Err(HubError::Validation("order has no parcels".to_owned()));
        }
        if let Some(parcel) = order
            .parcels
            .iter()
            .find(|parcel| parcel.weight_grams == 0 || parcel.weight_grams > self.max_weight_grams)
        {
            return Err(HubError::Validation(format!(
                "parcel weight {}g outside 1..={}g",
                parcel.weight_grams, self.max_weight_grams
            )));
        }
        Ok(())
    }

    // Shared cache counter, so instances built from the same cache never reuse a number.
    fn next_slip_number(&self) -> u64 {
        self.cache.increment(SEQUENCE_KEY)
    }

    fn slip(&self, order: &Order, tracking_number: &str) -> Slip {
        let grams = order.total_weight_grams();
        let mut lines = vec![
            String::from("PICKUP AT COUNTER"),
            self.store_name.clone(),
            self.address.one_line(),
            format!("For: {}", order.recipient.name),
            format!("Order: {}", order.reference),
            format!("Service: {}", order.service.name),
            format!(
                "Parcels: {} ({}.{:03} kg)",
                order.parcels.len(),
                grams / 1000,
                grams % 1000
            ),
        ];
        if let Some(company) = &order.recipient.company {
            lines.insert(4, format!("Company: {company}"));
        }
        Slip {
            lines,
            barcode: tracking_number.to_owned(),
        }
    }
}

#[async_trait]
impl Carrier for CounterCarrier {
    fn uid(&self) -> Uid {
        Self::uid_value()
    }

    async fn shops(&self, location: &Location, limit: usize) -> Result<Vec<Shop>, HubError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut store = self.store();
        if let (Some(query), Some(position)) = (location.point(), self.position) {
            let meters = query.distance_m(&position).round();
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped")]
            let distance = meters.clamp(0.0, f64::from(u32::MAX)) as u32;
            store.distance_m = Some(distance);
        }
        Ok(vec![store])
    }

    async fn label(&self, order: &Order, format: LabelFormat) -> Result<Label, HubError> {
        self.validate(order, format)?;

        let created_at = Utc::now();
        let number = self.next_slip_number();
        let tracking_number = format!("CTR-{}-{number:06}", created_at.format("%Y%m%d"));
        debug!(order = %order.reference, tracking = %tracking_number, "rendering counter slip");

        let slip = self.slip(order, &tracking_number);
        let payload = match format {
            LabelFormat::Zpl => slip.zpl(),
            _ => slip.pdf(),
        };

        Ok(Label {
            uid: Self::uid_value(),
            order_reference: order.reference.clone(),
            format,
            tracking_number: Some(tracking_number),
            payload,
            created_at,
        })
    }
}

impl CarrierPlugin for CounterCarrier {
    const UID: &'static str = "counter";
    const NAME: &'static str = "Store counter";

    fn configuration() -> Vec<ConfigurationField> {
        vec![
            ConfigurationField::required(STORE_NAME, "Store name", FieldKind::Text),
            ConfigurationField::optional(STREET, "Street and number", FieldKind::Text),
            ConfigurationField::optional(POSTAL_CODE, "Postal code", FieldKind::Text),
            ConfigurationField::optional(CITY, "City", FieldKind::Text),
            ConfigurationField::optional(LATITUDE, "Latitude", FieldKind::Float),
            ConfigurationField::optional(LONGITUDE, "Longitude", FieldKind::Float),
            ConfigurationField::optional(
                MAX_WEIGHT,
                "Maximum parcel weight (g)",
                FieldKind::Integer,
            )
            .with_default(i64::from(DEFAULT_MAX_WEIGHT_GRAMS)),
        ]
    }

    fn services() -> Vec<Service> {
        vec![
            Service {
                id: ServiceId(String::from("counter-pickup")),
                parent_id: Self::uid_value(),
                name: String::from("Pickup at counter"),
                description: String::from("Customer collects the parcel at the store."),
                max_weight_grams: Some(DEFAULT_MAX_WEIGHT_GRAMS),
                requires_shop: false,
            },
            Service {
                id: ServiceId(String::from("counter-return")),
                parent_id: Self::uid_value(),
                name: String::from("Return at counter"),
                description: String::from("Customer drops a return parcel at the store."),
                max_weight_grams: Some(DEFAULT_MAX_WEIGHT_GRAMS),
                requires_shop: false,
            },
        ]
    }

    fn from_config(config: &Config, cache: CacheHandle) -> Result<Self, HubError> {
        let store_name = config.require_text(STORE_NAME)?.to_owned();
        let text = |name: &str| config.text(name).unwrap_or_default().trim().to_owned();

        let position = match (config.float(LATITUDE), config.float(LONGITUDE)) {
            (Some(latitude), Some(longitude)) => Some(
                Location::coordinates(latitude, longitude)
                    .ok()
                    .and_then(|location| location.point())
                    .ok_or_else(|| HubError::InvalidConfiguration {
                        field: LATITUDE.to_owned(),
                        reason: format!("coordinates out of range: {latitude}, {longitude}"),
                    })?,
            ),
            (None, None) => None,
            _ => {
                return Err(HubError::InvalidConfiguration {
                    field: LATITUDE.to_owned(),
                    reason: "latitude and longitude must be set together".to_owned(),
                });
            }
        };

        let max_weight_grams = match config.integer(MAX_WEIGHT) {
            None => DEFAULT_MAX_WEIGHT_GRAMS,
            Some(grams) => u32::try_from(grams)
                .ok()
                .filter(|grams| *grams > 0)
                .ok_or_else(|| HubError::InvalidConfiguration {
                    field: MAX_WEIGHT.to_owned(),
                    reason: format!("{grams} is not a positive weight"),
                })?,
        };

        Ok(Self {
            store_name,
            address: Address {
                street: text(STREET),
                house_number: String::new(),
                postal_code: text(POSTAL_CODE),
                city: text(CITY),
                country: String::new(),
            },
            position,
            max_weight_grams,
            cache,
        })
    }
}
