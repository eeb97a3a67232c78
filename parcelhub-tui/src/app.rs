use std::sync::Arc;

use parcelhub_core::{
    Address, CarrierShops, CarrierSummary, HubError, Location, ParcelHub, Service, Shop, Uid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    CarrierSelect,
    ShopSearch,
    ShopView,
}

pub(crate) struct App {
    pub hub: Arc<ParcelHub>,

    pub screen: Screen,
    pub carriers: Vec<CarrierSummary>,
    /// Index into the carrier list; 0 is the "all carriers" entry.
    pub carrier_list_index: usize,
    /// `None` searches every registered carrier.
    pub selected_carriers: Option<Vec<Uid>>,

    pub location_input: String,
    pub shop_results: Vec<Shop>,
    pub carrier_errors: Vec<(Uid, String)>,
    pub shop_list_index: usize,

    pub selected_shop: Option<Shop>,
    pub shop_services: Vec<Service>,

    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(hub: Arc<ParcelHub>) -> Self {
        let carriers = hub.carriers();
        Self {
            hub,
            screen: Screen::CarrierSelect,
            carriers,
            carrier_list_index: 0,
            selected_carriers: None,
            location_input: String::new(),
            shop_results: Vec::new(),
            carrier_errors: Vec::new(),
            shop_list_index: 0,
            selected_shop: None,
            shop_services: Vec::new(),
            is_loading: false,
            error_message: None,
        }
    }

    /// Entries of the carrier list, including the leading "all carriers" entry.
    pub(crate) fn carrier_entries(&self) -> usize {
        self.carriers.len() + 1
    }

    pub(crate) fn selection_label(&self) -> String {
        match self.selected_carriers.as_deref() {
            None => "all carriers".to_owned(),
            Some(uids) => uids
                .iter()
                .map(|uid| {
                    self.carriers
                        .iter()
                        .find(|carrier| &carrier.uid == uid)
                        .map_or_else(|| uid.to_string(), |carrier| carrier.name.clone())
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub(crate) fn select_current_carrier(&mut self) {
        self.selected_carriers = match self.carrier_list_index {
            0 => None,
            index => {
                let Some(carrier) = self.carriers.get(index - 1) else {
                    return;
                };
                Some(vec![carrier.uid.clone()])
            }
        };
        self.screen = Screen::ShopSearch;
    }

    pub(crate) fn apply_shop_results(&mut self, results: Vec<CarrierShops>) {
        self.shop_results.clear();
        self.carrier_errors.clear();
        self.shop_list_index = 0;
        self.selected_shop = None;

        for entry in results {
            match entry.shops {
                Ok(shops) => self.shop_results.extend(shops),
                Err(err) => self.carrier_errors.push((entry.uid, err.to_string())),
            }
        }
    }

    pub(crate) fn clear_results(&mut self) {
        self.shop_results.clear();
        self.carrier_errors.clear();
        self.shop_list_index = 0;
    }

    /// Open the highlighted shop together with the services of its carrier.
    pub(crate) fn open_current_shop(&mut self) -> Result<(), HubError> {
        let Some(shop) = self.shop_results.get(self.shop_list_index).cloned() else {
            return Err(HubError::Validation(
                "no shop selected (search and pick one first)".to_owned(),
            ));
        };

        let services = self
            .hub
            .services(Some(std::slice::from_ref(&shop.uid)))?
            .remove(&shop.uid)
            .unwrap_or_default();

        self.shop_services = services;
        self.selected_shop = Some(shop);
        self.screen = Screen::ShopView;
        Ok(())
    }
}

/// Parse the search box: `lat,lng` or `street number, postal city[, country]`.
pub(crate) fn parse_location(input: &str) -> Result<Location, HubError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(HubError::Validation(
            "type an address or `lat,lng`, then press Enter".to_owned(),
        ));
    }

    if let Some((latitude, longitude)) = parse_coordinates(input) {
        return Location::coordinates(latitude, longitude);
    }

    let mut parts = input.split(',').map(str::trim);
    let (street, house_number) = split_house_number(parts.next().unwrap_or_default());
    let (postal_code, city) = split_postal_code(parts.next().unwrap_or_default());
    let country = parts.collect::<Vec<_>>().join(", ");

    Ok(Location::Address(Address {
        street,
        house_number,
        postal_code,
        city,
        country,
    }))
}

fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
    let (lat, lng) = input.split_once(',')?;
    Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
}

fn has_digit(word: &str) -> bool {
    word.chars().any(|ch| ch.is_ascii_digit())
}

fn split_house_number(part: &str) -> (String, String) {
    let words: Vec<&str> = part.split_whitespace().collect();
    match words.split_last() {
        Some((last, street)) if has_digit(last) && !street.is_empty() => {
            (street.join(" "), (*last).to_owned())
        }
        _ => (words.join(" "), String::new()),
    }
}

fn split_postal_code(part: &str) -> (String, String) {
    let words: Vec<&str> = part.split_whitespace().collect();
    match words.split_first() {
        Some((first, city)) if has_digit(first) => ((*first).to_owned(), city.join(" ")),
        _ => (String::new(), words.join(" ")),
    }
}
