//! Domain data structures for carriers, services, drop-off points, orders and labels.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::HubError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Stable identifier naming exactly one carrier plugin.
pub struct Uid(pub String);

impl Uid {
    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<&str> for Uid {
    fn from(uid: &str) -> Self {
        Uid(uid.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier of a service, unique within its carrier.
pub struct ServiceId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Display information about a registered carrier.
pub struct CarrierSummary {
    /// Unique identifier.
    pub uid: Uid,
    /// Human-friendly carrier name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// A single configuration value supplied by the caller.
pub enum ConfigValue {
    /// Boolean switch.
    Boolean(bool),
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Free text, secrets included.
    Text(String),
}

impl Hash for ConfigValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ConfigValue::Boolean(value) => (0_u8, value).hash(state),
            ConfigValue::Integer(value) => (1_u8, value).hash(state),
            ConfigValue::Float(value) => (2_u8, value.to_bits()).hash(state),
            ConfigValue::Text(value) => (3_u8, value).hash(state),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Boolean(value) => write!(formatter, "{value}"),
            ConfigValue::Integer(value) => write!(formatter, "{value}"),
            ConfigValue::Float(value) => write!(formatter, "{value}"),
            ConfigValue::Text(value) => write!(formatter, "{value}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Type of value a configuration field expects.
pub enum FieldKind {
    /// Plain text.
    Text,
    /// Text that must not be displayed back to the user.
    Secret,
    /// Whole number.
    Integer,
    /// Number with a fractional part; integers are accepted too.
    Float,
    /// On/off switch.
    Boolean,
    /// One of a fixed list of text options.
    Choice(Vec<String>),
}

impl FieldKind {
    /// Whether the given value is acceptable for this kind.
    #[must_use]
    pub fn accepts(&self, value: &ConfigValue) -> bool {
        match (self, value) {
            (FieldKind::Text | FieldKind::Secret, ConfigValue::Text(_))
            | (FieldKind::Integer, ConfigValue::Integer(_))
            | (FieldKind::Float, ConfigValue::Float(_) | ConfigValue::Integer(_))
            | (FieldKind::Boolean, ConfigValue::Boolean(_)) => true,
            (FieldKind::Choice(options), ConfigValue::Text(text)) => {
                options.iter().any(|option| option == text)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Input a carrier needs from the caller before it can be used.
pub struct ConfigurationField {
    /// Key under which the value is looked up in [`Config`].
    pub name: String,
    /// Label shown in configuration forms.
    pub label: String,
    /// Expected value type.
    pub kind: FieldKind,
    /// Whether the carrier refuses to start without the value.
    pub required: bool,
    /// Value used when the caller supplies none.
    pub default: Option<ConfigValue>,
}

impl ConfigurationField {
    /// Declare a required field without default.
    #[must_use]
    pub fn required<N: Into<String>, L: Into<String>>(name: N, label: L, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: true,
            default: None,
        }
    }

    /// Declare an optional field.
    #[must_use]
    pub fn optional<N: Into<String>, L: Into<String>>(name: N, label: L, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, label, kind)
        }
    }

    /// Attach a default value.
    #[must_use]
    pub fn with_default<V: Into<ConfigValue>>(mut self, value: V) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
/// Read-only snapshot of the configuration values for all carriers.
///
/// Keys are the field names declared by the carriers, e.g. `counter.store_name`.
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
}

impl Config {
    /// Build a snapshot from key/value pairs.
    #[must_use]
    pub fn new<K, V, I>(values: I) -> Self
    where
        K: Into<String>,
        V: Into<ConfigValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(name)
    }

    /// Text value, if present and textual.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ConfigValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Integer value, if present and integral.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ConfigValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Float value; integers are widened.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "configuration integers are small")]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ConfigValue::Float(value)) => Some(*value),
            Some(ConfigValue::Integer(value)) => Some(*value as f64),
            _ => None,
        }
    }

    /// Boolean value, if present.
    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ConfigValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// Non-empty text value that a carrier cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MissingConfiguration`] when the value is absent, blank or not text.
    pub fn require_text(&self, name: &str) -> Result<&str, HubError> {
        self.text(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| HubError::MissingConfiguration(name.to_owned()))
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Hash over all key/value pairs, used to key cached carrier instances.
    ///
    /// Only stable within one process.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (key, value) in &self.values {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Check this snapshot against a carrier's declared fields.
    ///
    /// Returns one error per problem; an empty vector means the snapshot satisfies the fields.
    #[must_use]
    pub fn validate_against(&self, fields: &[ConfigurationField]) -> Vec<HubError> {
        let mut problems = Vec::new();
        for field in fields {
            match self.values.get(&field.name) {
                Some(value) if !field.kind.accepts(value) => {
                    problems.push(HubError::InvalidConfiguration {
                        field: field.name.clone(),
                        reason: format!("expected {:?}, got `{value}`", field.kind),
                    });
                }
                Some(ConfigValue::Text(text)) if field.required && text.trim().is_empty() => {
                    problems.push(HubError::MissingConfiguration(field.name.clone()));
                }
                None if field.required && field.default.is_none() => {
                    problems.push(HubError::MissingConfiguration(field.name.clone()));
                }
                _ => {}
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Postal address.
pub struct Address {
    /// Street name.
    pub street: String,
    /// House number including additions such as “A”.
    pub house_number: String,
    /// Postal code.
    pub postal_code: String,
    /// City name.
    pub city: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl Address {
    /// Single-line representation, skipping empty parts.
    #[must_use]
    pub fn one_line(&self) -> String {
        let street = format!("{} {}", self.street, self.house_number);
        let city = format!("{} {}", self.postal_code, self.city);
        [street.trim(), city.trim(), self.country.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// WGS84 coordinate pair.
pub struct GeoPoint {
    /// Latitude in degrees, -90..=90.
    pub latitude: f64,
    /// Longitude in degrees, -180..=180.
    pub longitude: f64,
}

impl GeoPoint {
    /// Great-circle distance in meters (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;

        let lat_a = self.latitude.to_radians();
        let lat_b = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let half_chord = (delta_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * half_chord.sqrt().asin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Query for nearby drop-off points; exactly one representation by construction.
pub enum Location {
    /// Search around a postal address.
    Address(Address),
    /// Search around a coordinate pair.
    Point(GeoPoint),
}

impl Location {
    /// Build a coordinate query after range checks.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when latitude or longitude are out of range.
    pub fn coordinates(latitude: f64, longitude: f64) -> Result<Self, HubError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(HubError::Validation(format!(
                "coordinates out of range: {latitude}, {longitude}"
            )));
        }
        Ok(Location::Point(GeoPoint {
            latitude,
            longitude,
        }))
    }

    /// The coordinate pair, if this is a coordinate query.
    #[must_use]
    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            Location::Point(point) => Some(*point),
            Location::Address(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Drop-off or pickup point offered by a carrier.
pub struct Shop {
    /// Carrier-specific shop identifier.
    pub id: String,
    /// Carrier that returned the shop.
    pub uid: Uid,
    /// Display name.
    pub name: String,
    /// Street address of the shop.
    pub address: Address,
    /// Shop position, when known.
    pub position: Option<GeoPoint>,
    /// Distance from the queried location in meters, when the carrier reports it.
    pub distance_m: Option<u32>,
    /// Free-form opening hours, one line per entry.
    #[serde(default)]
    pub opening_hours: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Shipping product offered by a carrier.
pub struct Service {
    /// Identifier unique within the owning carrier.
    pub id: ServiceId,
    /// UID of the owning carrier; the routing key for orders.
    pub parent_id: Uid,
    /// Display name.
    pub name: String,
    /// Longer description for selection screens.
    pub description: String,
    /// Heaviest parcel accepted, if limited.
    pub max_weight_grams: Option<u32>,
    /// Whether orders must name a drop-off shop.
    pub requires_shop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Single parcel of an order.
pub struct Parcel {
    /// Gross weight.
    pub weight_grams: u32,
    /// Optional customer reference printed on the label.
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Receiver of a shipment.
pub struct Recipient {
    /// Person name.
    pub name: String,
    /// Company name, if any.
    pub company: Option<String>,
    /// Delivery address.
    pub address: Address,
    /// Notification e-mail.
    pub email: Option<String>,
    /// Notification phone number.
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Shipment request; its service decides which carrier handles it.
pub struct Order {
    /// Caller reference, echoed on the label.
    pub reference: String,
    /// Chosen service, including the owning carrier UID.
    pub service: Service,
    /// Receiver.
    pub recipient: Recipient,
    /// Parcels to label.
    pub parcels: Vec<Parcel>,
    /// Drop-off shop for shop-delivery services.
    pub shop_id: Option<String>,
}

impl Order {
    /// UID of the carrier owning this order's service.
    #[must_use]
    pub fn uid(&self) -> &Uid {
        &self.service.parent_id
    }

    /// Sum of all parcel weights.
    #[must_use]
    pub fn total_weight_grams(&self) -> u64 {
        self.parcels
            .iter()
            .map(|parcel| u64::from(parcel.weight_grams))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Output format of a label.
pub enum LabelFormat {
    /// Portable Document Format.
    #[default]
    Pdf,
    /// PNG raster image.
    Png,
    /// Zebra Programming Language.
    Zpl,
    /// Eltron Programming Language.
    Epl,
}

impl LabelFormat {
    /// MIME type of payloads in this format.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            LabelFormat::Pdf => "application/pdf",
            LabelFormat::Png => "image/png",
            LabelFormat::Zpl => "application/x-zpl",
            LabelFormat::Epl => "application/x-epl",
        }
    }
}

impl fmt::Display for LabelFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LabelFormat::Pdf => "pdf",
            LabelFormat::Png => "png",
            LabelFormat::Zpl => "zpl",
            LabelFormat::Epl => "epl",
        };
        write!(formatter, "{tag}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Printable label generated for one order.
pub struct Label {
    /// Carrier that generated the label.
    pub uid: Uid,
    /// Reference of the labelled order.
    pub order_reference: String,
    /// Payload format.
    pub format: LabelFormat,
    /// Carrier tracking number, when assigned.
    pub tracking_number: Option<String>,
    /// Rendered label bytes.
    pub payload: Vec<u8>,
    /// Generation time.
    pub created_at: DateTime<Utc>,
}
