#![allow(dead_code, reason = "shared by several test binaries")]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parcelhub_core::{
    Address, CacheHandle, Carrier, CarrierCache, CarrierPlugin, Config, ConfigurationField,
    FieldKind, HubError, Label, LabelFormat, Location, Order, Parcel, Recipient, Service,
    ServiceId, Shop, Uid,
};

/// Cache that remembers every key written, so tests can see which carriers ran.
#[derive(Default)]
pub struct RecordingCache {
    writes: Mutex<Vec<String>>,
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingCache {
    pub fn handle() -> (Arc<Self>, CacheHandle) {
        let cache = Arc::new(Self::default());
        let handle: CacheHandle = cache.clone();
        (cache, handle)
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("cache lock").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.writes()
            .iter()
            .filter(|key| key.starts_with(prefix))
            .count()
    }
}

impl CarrierCache for RecordingCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().expect("cache lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) {
        self.writes.lock().expect("cache lock").push(key.to_owned());
        self.values
            .lock()
            .expect("cache lock")
            .insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.values.lock().expect("cache lock").remove(key);
    }

    fn increment(&self, key: &str) -> u64 {
        let mut values = self.values.lock().expect("cache lock");
        let next = values
            .get(key)
            .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
            .map_or(0, u64::from_be_bytes)
            + 1;
        values.insert(key.to_owned(), next.to_be_bytes().to_vec());
        next
    }
}

pub fn service(uid: &str, id: &str) -> Service {
    Service {
        id: ServiceId(id.to_owned()),
        parent_id: Uid::from(uid),
        name: format!("{uid} {id}"),
        description: String::new(),
        max_weight_grams: Some(30_000),
        requires_shop: false,
    }
}

pub fn order(uid: &str, reference: &str) -> Order {
    Order {
        reference: reference.to_owned(),
        service: service(uid, "standard"),
        recipient: Recipient {
            name: "Ada Lovelace".to_owned(),
            address: Address {
                street: "Main Street".to_owned(),
                house_number: "1".to_owned(),
                postal_code: "1000".to_owned(),
                city: "Brussels".to_owned(),
                country: "BE".to_owned(),
            },
            ..Recipient::default()
        },
        parcels: vec![Parcel {
            weight_grams: 1_200,
            reference: None,
        }],
        shop_id: None,
    }
}

pub fn invalid_order(uid: &str, reference: &str) -> Order {
    Order {
        parcels: Vec::new(),
        ..order(uid, reference)
    }
}

fn shop(uid: &str, id: &str) -> Shop {
    Shop {
        id: id.to_owned(),
        uid: Uid::from(uid),
        name: format!("{uid} shop {id}"),
        address: Address::default(),
        position: None,
        distance_m: Some(100),
        opening_hours: Vec::new(),
    }
}

async fn record_label(
    cache: &CacheHandle,
    uid: &str,
    order: &Order,
    format: LabelFormat,
) -> Result<Label, HubError> {
    if order.parcels.is_empty() {
        return Err(HubError::Validation("order has no parcels".to_owned()));
    }
    cache.set(&format!("label:{uid}:{}", order.reference), Vec::new(), None);
    Ok(Label {
        uid: Uid::from(uid),
        order_reference: order.reference.clone(),
        format,
        tracking_number: Some(format!("{uid}-{}", order.reference)),
        payload: order.reference.as_bytes().to_vec(),
        created_at: Utc::now(),
    })
}

macro_rules! fake_carrier {
    ($name:ident, $uid:literal, shops: |$limit:ident| $shops:expr) => {
        pub struct $name {
            cache: CacheHandle,
        }

        #[async_trait]
        impl Carrier for $name {
            fn uid(&self) -> Uid {
                Uid::from($uid)
            }

            async fn shops(
                &self,
                _location: &Location,
                $limit: usize,
            ) -> Result<Vec<Shop>, HubError> {
                self.cache.set(&format!("shops:{}", $uid), Vec::new(), None);
                $shops
            }

            async fn label(&self, order: &Order, format: LabelFormat) -> Result<Label, HubError> {
                record_label(&self.cache, $uid, order, format).await
            }
        }

        impl CarrierPlugin for $name {
            const UID: &'static str = $uid;
            const NAME: &'static str = stringify!($name);

            fn configuration() -> Vec<ConfigurationField> {
                vec![
                    ConfigurationField::required(
                        concat!($uid, ".api_key"),
                        "API key",
                        FieldKind::Secret,
                    ),
                    ConfigurationField::optional(
                        concat!($uid, ".retries"),
                        "Retries",
                        FieldKind::Integer,
                    )
                    .with_default(2_i64),
                ]
            }

            fn services() -> Vec<Service> {
                vec![service($uid, "standard"), service($uid, "express")]
            }

            fn from_config(_config: &Config, cache: CacheHandle) -> Result<Self, HubError> {
                cache.set(&format!("built:{}", $uid), Vec::new(), None);
                Ok(Self { cache })
            }
        }
    };
}

fake_carrier!(Alpha, "alpha", shops: |limit| {
    Ok((0..limit.min(2)).map(|index| shop("alpha", &index.to_string())).collect())
});

fake_carrier!(Beta, "beta", shops: |limit| {
    Ok((0..limit.min(1)).map(|index| shop("beta", &index.to_string())).collect())
});

fake_carrier!(Broken, "broken", shops: |_limit| {
    Err(HubError::Carrier {
        uid: Uid::from("broken"),
        message: "quota exceeded".to_owned(),
    })
});

fake_carrier!(Sleepy, "sleepy", shops: |_limit| {
    tokio::time::sleep(Duration::from_secs(3_600)).await;
    Ok(Vec::new())
});

fake_carrier!(AlphaTwin, "alpha", shops: |_limit| { Ok(Vec::new()) });

/// Carrier whose construction always fails.
pub struct Misconfigured;

#[async_trait]
impl Carrier for Misconfigured {
    fn uid(&self) -> Uid {
        Uid::from("misconfigured")
    }

    async fn shops(&self, _location: &Location, _limit: usize) -> Result<Vec<Shop>, HubError> {
        Ok(Vec::new())
    }

    async fn label(&self, _order: &Order, _format: LabelFormat) -> Result<Label, HubError> {
        Err(HubError::Validation("unreachable".to_owned()))
    }
}

impl CarrierPlugin for Misconfigured {
    const UID: &'static str = "misconfigured";
    const NAME: &'static str = "Misconfigured";

    fn configuration() -> Vec<ConfigurationField> {
        vec![ConfigurationField::required(
            "misconfigured.endpoint",
            "Endpoint",
            FieldKind::Text,
        )]
    }

    fn services() -> Vec<Service> {
        vec![service("misconfigured", "standard")]
    }

    fn from_config(config: &Config, _cache: CacheHandle) -> Result<Self, HubError> {
        config.require_text("misconfigured.endpoint")?;
        Ok(Self)
    }
}

pub fn location() -> Location {
    Location::coordinates(50.85, 4.35).expect("valid coordinates")
}
