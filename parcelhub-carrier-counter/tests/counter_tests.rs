use std::collections::HashSet;
use std::sync::Arc;

use parcelhub_carrier_counter::{CounterCarrier, descriptor};
use parcelhub_core::{
    Address, CacheHandle, Carrier, CarrierPlugin, Config, ConfigValue, HubError, LabelFormat,
    Location, MemoryCache, Order, Parcel, PluginRegistry, Recipient, Uid,
};
use pretty_assertions::assert_eq;

fn cache() -> CacheHandle {
    Arc::new(MemoryCache::new())
}

fn config() -> Config {
    Config::new([
        ("counter.store_name", ConfigValue::from("Corner Shop")),
        ("counter.street", ConfigValue::from("Rue Neuve 12")),
        ("counter.postal_code", ConfigValue::from("1000")),
        ("counter.city", ConfigValue::from("Brussels")),
        ("counter.latitude", ConfigValue::from(50.8503)),
        ("counter.longitude", ConfigValue::from(4.3517)),
        ("counter.max_weight_grams", ConfigValue::from(5_000_i64)),
    ])
}

fn order(reference: &str) -> Order {
    let service = CounterCarrier::services()
        .into_iter()
        .next()
        .expect("pickup service");
    Order {
        reference: reference.to_owned(),
        service,
        recipient: Recipient {
            name: "Grace Hopper".to_owned(),
            company: Some("Navy".to_owned()),
            address: Address::default(),
            email: None,
            phone: None,
        },
        parcels: vec![Parcel {
            weight_grams: 1_250,
            reference: None,
        }],
        shop_id: None,
    }
}

#[test]
fn services_are_owned_by_counter() {
    let services = CounterCarrier::services();

    assert_eq!(services.len(), 2);
    assert!(services.iter().all(|service| service.parent_id == Uid::from("counter")));
}

#[test]
fn registry_accepts_counter_descriptor() {
    let registry = PluginRegistry::new([descriptor()]).expect("single carrier");

    assert_eq!(registry.carriers()[0].name, "Store counter");
}

#[test]
fn store_name_is_required() {
    let result = CounterCarrier::from_config(&Config::default(), cache());

    assert!(matches!(
        result,
        Err(HubError::MissingConfiguration(field)) if field == "counter.store_name"
    ));
}

#[test]
fn half_coordinates_are_rejected() {
    let config = Config::new([
        ("counter.store_name", ConfigValue::from("Corner Shop")),
        ("counter.latitude", ConfigValue::from(50.0)),
    ]);

    let result = CounterCarrier::from_config(&config, cache());

    assert!(matches!(result, Err(HubError::InvalidConfiguration { .. })));
}

#[test]
fn declared_fields_accept_sample_configuration() {
    assert!(config().validate_against(&CounterCarrier::configuration()).is_empty());
}

#[tokio::test]
async fn shops_return_store_with_distance() {
    let carrier = CounterCarrier::from_config(&config(), cache()).expect("carrier");
    let near = Location::coordinates(50.8467, 4.3525).expect("coordinates");

    let shops = carrier.shops(&near, 10).await.expect("shops");

    assert_eq!(shops.len(), 1);
    assert_eq!(shops[0].name, "Corner Shop");
    assert_eq!(shops[0].address.city, "Brussels");
    let distance = shops[0].distance_m.expect("distance");
    assert!((300..500).contains(&distance), "unexpected distance {distance}");
}

#[tokio::test]
async fn shops_by_address_have_no_distance_and_respect_zero_limit() {
    let carrier = CounterCarrier::from_config(&config(), cache()).expect("carrier");
    let location = Location::Address(Address {
        city: "Brussels".to_owned(),
        ..Address::default()
    });

    let shops = carrier.shops(&location, 5).await.expect("shops");
    assert_eq!(shops[0].distance_m, None);

    assert!(carrier.shops(&location, 0).await.expect("shops").is_empty());
}

#[tokio::test]
async fn pdf_label_carries_sequential_tracking_numbers() {
    let shared = cache();
    let first = CounterCarrier::from_config(&config(), Arc::clone(&shared)).expect("carrier");
    let second = CounterCarrier::from_config(&config(), shared).expect("carrier");

    let label_one = first.label(&order("A-1"), LabelFormat::Pdf).await.expect("label");
    let label_two = second.label(&order("A-2"), LabelFormat::Pdf).await.expect("label");

    assert!(label_one.payload.starts_with(b"%PDF-1.4"));
    assert_eq!(label_one.format, LabelFormat::Pdf);
    let one = label_one.tracking_number.expect("tracking");
    let two = label_two.tracking_number.expect("tracking");
    assert!(one.ends_with("-000001"), "{one}");
    assert!(two.ends_with("-000002"), "{two}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_labels_get_unique_tracking_numbers() {
    let shared = cache();
    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let carrier =
                CounterCarrier::from_config(&config(), Arc::clone(&shared)).expect("carrier");
            tokio::spawn(async move {
                let mut numbers = Vec::new();
                for n in 0..50 {
                    let label = carrier
                        .label(&order(&format!("W{worker}-{n}")), LabelFormat::Zpl)
                        .await
                        .expect("label");
                    numbers.push(label.tracking_number.expect("tracking"));
                }
                numbers
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for task in tasks {
        numbers.extend(task.await.expect("task"));
    }

    assert_eq!(numbers.len(), 400);
}

#[tokio::test]
async fn zpl_label_mentions_order_and_recipient() {
    let carrier = CounterCarrier::from_config(&config(), cache()).expect("carrier");

    let label = carrier.label(&order("Z-9"), LabelFormat::Zpl).await.expect("label");

    let zpl = String::from_utf8(label.payload).expect("utf8");
    assert!(zpl.contains("Order: Z-9"));
    assert!(zpl.contains("For: Grace Hopper"));
    assert!(zpl.contains("Company: Navy"));
    assert!(zpl.contains("Parcels: 1 (1.250 kg)"));
}

#[tokio::test]
async fn unsupported_format_and_heavy_parcels_are_validation_errors() {
    let carrier = CounterCarrier::from_config(&config(), cache()).expect("carrier");

    let png = carrier.label(&order("P-1"), LabelFormat::Png).await;
    assert!(png.is_err_and(|err| err.is_validation()));

    let mut heavy = order("H-1");
    heavy.parcels[0].weight_grams = 6_000;
    let result = carrier.label(&heavy, LabelFormat::Pdf).await;
    assert!(result.is_err_and(|err| err.is_validation()));
}

#[tokio::test]
async fn foreign_service_is_rejected() {
    let carrier = CounterCarrier::from_config(&config(), cache()).expect("carrier");
    let mut foreign = order("F-1");
    foreign.service.parent_id = Uid::from("gateway");

    let result = carrier.label(&foreign, LabelFormat::Pdf).await;

    assert!(result.is_err_and(|err| err.is_validation()));
}
