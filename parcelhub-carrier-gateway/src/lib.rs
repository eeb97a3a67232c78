//! Carrier backed by a self-hosted label gateway speaking JSON over HTTP.
//!
//! Endpoints, relative to `gateway.base_url`:
//! - `GET /shops?limit=N&q=…` or `GET /shops?limit=N&lat=…&lng=…` returns a JSON list of
//!   shops.
//! - `POST /labels` with a JSON order returns the label bytes; the tracking number comes in the
//!   `x-tracking-number` header. `422` means the gateway rejected the order.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parcelhub_core::{
    Address, CARRIER_PLUGINS, CacheHandle, Carrier, CarrierPlugin, Config, ConfigurationField,
    FieldKind, GeoPoint, HubError, Label, LabelFormat, Location, Order, Parcel, PluginDescriptor,
    Recipient, Service, ServiceId, Shop, Uid,
};

const BASE_URL: &str = "gateway.base_url";
const API_KEY: &str = "gateway.api_key";
const CACHE_TTL: &str = "gateway.cache_ttl_secs";

const DEFAULT_CACHE_TTL_SECS: u16 = 300;
const MAX_CACHE_TTL_SECS: u32 = 7 * 24 * 60 * 60;
const TRACKING_HEADER: &str = "x-tracking-number";

#[linkme::distributed_slice(CARRIER_PLUGINS)]
static GATEWAY: PluginDescriptor = PluginDescriptor::of::<GatewayCarrier>();

/// Descriptor of the gateway carrier, for registries built by hand.
#[must_use]
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::of::<GatewayCarrier>()
}

/// Shop entry as returned by `GET /shops`.
#[derive(Debug, Deserialize)]
struct ShopEntry {
    id: String,
    name: String,
    #[serde(default)]
    street: String,
    #[serde(default)]
    house_number: String,
    #[serde(default)]
    postal_code: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Meters from the queried location.
    distance: Option<u32>,
    #[serde(default)]
    opening_hours: Vec<String>,
}

/// Body of `POST /labels`.
#[derive(Debug, Serialize)]
struct LabelRequest<'a> {
    reference: &'a str,
    service: &'a ServiceId,
    format: String,
    recipient: &'a Recipient,
    parcels: &'a [Parcel],
    #[serde(skip_serializing_if = "Option::is_none")]
    shop_id: Option<&'a str>,
}

/// Gateway carrier bound to one gateway endpoint.
pub struct GatewayCarrier {
    client: Client,
    base_url: String,
    api_key: String,
    cache_ttl: Duration,
    cache: CacheHandle,
}

impl GatewayCarrier {
    fn validate(order: &Order) -> Result<(), HubError> {
        if order.uid().as_str() != Self::UID {
            return Err(HubError::Validation(format!(
                "service {} belongs to carrier {}",
                order.service.id,
                order.uid()
            )));
        }
        let Some(service) = Self::services()
            .into_iter()
            .find(|service| service.id == order.service.id)
        else {
            return Err(HubError::Validation(format!(
                "unknown gateway service {}",
                order.service.id
            )));
        };
        if order.parcels.is_empty() {
            return Err(HubError::Validation("order has no parcels".to_owned()));
        }
        if service.requires_shop && order.shop_id.as_deref().is_none_or(str::is_empty) {
            return Err(HubError::Validation(format!(
                "service {} needs a drop-off shop",
                service.id
            )));
        }
        Ok(())
    }

    fn shop_query(location: &Location, limit: usize) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", limit.to_string())];
        match location {
            Location::Address(address) => query.push(("q", address.one_line())),
            Location::Point(point) => {
                query.push(("lat", point.latitude.to_string()));
                query.push(("lng", point.longitude.to_string()));
            }
        }
        query
    }

    fn map_shop(entry: ShopEntry) -> Shop {
        let position = entry
            .latitude
            .zip(entry.longitude)
            .map(|(latitude, longitude)| GeoPoint {
                latitude,
                longitude,
            });
        Shop {
            id: entry.id,
            uid: Self::uid_value(),
            name: entry.name,
            address: Address {
                street: entry.street,
                house_number: entry.house_number,
                postal_code: entry.postal_code,
                city: entry.city,
                country: entry.country,
            },
            position,
            distance_m: entry.distance,
            opening_hours: entry.opening_hours,
        }
    }
}

#[async_trait]
impl Carrier for GatewayCarrier {
    fn uid(&self) -> Uid {
        Self::uid_value()
    }

    async fn shops(&self, location: &Location, limit: usize) -> Result<Vec<Shop>, HubError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = Self::shop_query(location, limit);
        let cache_key = format!(
            "gateway:shops:{}:{}",
            self.base_url,
            query
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("&")
        );

        if let Some(shops) = self
            .cache
            .get(&cache_key)
            .and_then(|bytes| serde_json::from_slice::<Vec<Shop>>(&bytes).ok())
        {
            debug!(key = %cache_key, "gateway shops served from cache");
            return Ok(shops);
        }

        let req = self
            .client
            .get(format!("{}/shops", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&query);
        let entries = fetch_json::<Vec<ShopEntry>>(req).await?;

        let shops: Vec<Shop> = entries
            .into_iter()
            .take(limit)
            .map(Self::map_shop)
            .collect();

        self.cache
            .set(&cache_key, serde_json::to_vec(&shops)?, Some(self.cache_ttl));
        Ok(shops)
    }

    async fn label(&self, order: &Order, format: LabelFormat) -> Result<Label, HubError> {
        Self::validate(order)?;

        let body = LabelRequest {
            reference: &order.reference,
            service: &order.service.id,
            format: format.to_string(),
            recipient: &order.recipient,
            parcels: &order.parcels,
            shop_id: order.shop_id.as_deref(),
        };

        let resp = self
            .client
            .post(format!("{}/labels", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let reason = resp.text().await?;
            return Err(HubError::Validation(reason));
        }

        let resp = resp.error_for_status()?;
        let tracking_number = resp
            .headers()
            .get(TRACKING_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = resp.bytes().await?.to_vec();

        Ok(Label {
            uid: Self::uid_value(),
            order_reference: order.reference.clone(),
            format,
            tracking_number,
            payload,
            created_at: Utc::now(),
        })
    }
}

impl CarrierPlugin for GatewayCarrier {
    const UID: &'static str = "gateway";
    const NAME: &'static str = "Label gateway";

    fn configuration() -> Vec<ConfigurationField> {
        vec![
            ConfigurationField::required(BASE_URL, "Gateway URL", FieldKind::Text),
            ConfigurationField::required(API_KEY, "API key", FieldKind::Secret),
            ConfigurationField::optional(CACHE_TTL, "Shop cache lifetime (s)", FieldKind::Integer)
                .with_default(i64::from(DEFAULT_CACHE_TTL_SECS)),
        ]
    }

    fn services() -> Vec<Service> {
        let service = |id: &str, name: &str, description: &str, requires_shop: bool| Service {
            id: ServiceId(id.to_owned()),
            parent_id: Self::uid_value(),
            name: name.to_owned(),
            description: description.to_owned(),
            max_weight_grams: Some(31_500),
            requires_shop,
        };
        vec![
            service(
                "gateway-standard",
                "Standard",
                "Home delivery within two to three working days.",
                false,
            ),
            service(
                "gateway-express",
                "Express",
                "Home delivery on the next working day.",
                false,
            ),
            service(
                "gateway-shop",
                "Shop delivery",
                "Delivery to a drop-off point chosen by the recipient.",
                true,
            ),
        ]
    }

    fn from_config(config: &Config, cache: CacheHandle) -> Result<Self, HubError> {
        let base_url = config.require_text(BASE_URL)?.trim_end_matches('/').to_owned();
        check_base_url(&base_url)?;
        let api_key = config.require_text(API_KEY)?.to_owned();
        let cache_ttl = match config.integer(CACHE_TTL) {
            None => Duration::from_secs(u64::from(DEFAULT_CACHE_TTL_SECS)),
            Some(secs) => u32::try_from(secs)
                .ok()
                .filter(|secs| *secs <= MAX_CACHE_TTL_SECS)
                .map(|secs| Duration::from_secs(u64::from(secs)))
                .ok_or_else(|| HubError::InvalidConfiguration {
                    field: CACHE_TTL.to_owned(),
                    reason: format!("{secs} is outside 0..={MAX_CACHE_TTL_SECS}"),
                })?,
        };

        let client = Client::builder().user_agent("parcelhub/0.1").build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            cache_ttl,
            cache,
        })
    }
}

fn check_base_url(base_url: &str) -> Result<(), HubError> {
    let invalid = |reason: String| HubError::InvalidConfiguration {
        field: BASE_URL.to_owned(),
        reason,
    };
    let url = Url::parse(base_url).map_err(|err| invalid(format!("`{base_url}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("`{base_url}` is not an http(s) URL")));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("`{base_url}` has no host")));
    }
    Ok(())
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, HubError> {
    req.send()
        .await
        .map_err(HubError::from)?
        .error_for_status()
        .map_err(HubError::from)?
        .json()
        .await
        .map_err(HubError::from)
}
