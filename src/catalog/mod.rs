//! Catalog filtering and ordering.
//!
//! Everything here works on a borrowed slice of vehicles fetched wholesale
//! from the store and returns a fresh `Vec`, so the fetched list is never
//! reordered or trimmed in place.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Vehicle;

/// Ordering offered by the inventory page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Keep fetch order (newest arrivals first)
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YearNew,
}

impl SortKey {
    /// Parses a sort key, falling back to `Newest` for anything unknown
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortKey::Newest),
            "price_asc" => Ok(SortKey::PriceAsc),
            "price_desc" => Ok(SortKey::PriceDesc),
            "year_new" => Ok(SortKey::YearNew),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

/// Which fields the free-text query is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFields {
    /// "make model", used by the home page search bar
    MakeModel,
    /// "make model year", used by the inventory page
    MakeModelYear,
}

impl SearchFields {
    fn haystack(&self, vehicle: &Vehicle) -> String {
        match self {
            SearchFields::MakeModel => format!("{} {}", vehicle.make, vehicle.model),
            SearchFields::MakeModelYear => {
                format!("{} {} {}", vehicle.make, vehicle.model, vehicle.year)
            }
        }
    }
}

/// Keeps the vehicles whose searchable text contains `query`, ignoring case.
/// An empty query keeps everything.
pub fn filter(vehicles: &[Vehicle], query: &str, fields: SearchFields) -> Vec<Vehicle> {
    let needle = query.to_lowercase();
    vehicles
        .iter()
        .filter(|v| needle.is_empty() || fields.haystack(v).to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Stable sort, so equal prices or years keep their relative order
pub fn sort(vehicles: &mut [Vehicle], key: SortKey) {
    match key {
        SortKey::Newest => {}
        SortKey::PriceAsc => vehicles.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::PriceDesc => vehicles.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortKey::YearNew => vehicles.sort_by(|a, b| b.year.cmp(&a.year)),
    }
}

/// Filter then sort, the full inventory page pipeline
pub fn apply(vehicles: &[Vehicle], query: &str, key: SortKey) -> Vec<Vehicle> {
    let mut view = filter(vehicles, query, SearchFields::MakeModelYear);
    sort(&mut view, key);
    view
}

/// Vehicles flagged for the home page carousel, in fetch order
pub fn featured(vehicles: &[Vehicle]) -> Vec<Vehicle> {
    vehicles.iter().filter(|v| v.is_featured).cloned().collect()
}

/// Search and sort state owned by a single inventory view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogView {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub sort: SortKey,
}

impl CatalogView {
    pub fn new(query: impl Into<String>, sort: SortKey) -> Self {
        Self {
            query: query.into(),
            sort,
        }
    }

    /// "Clear Filters": empty query, newest first
    pub fn clear(&mut self) {
        self.query.clear();
        self.sort = SortKey::Newest;
    }

    pub fn render(&self, vehicles: &[Vehicle]) -> Vec<Vehicle> {
        apply(vehicles, &self.query, self.sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Specs, Status};

    fn car(id: &str, make: &str, model: &str, year: i32, price: f64, status: Status) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            year,
            price,
            status,
            main_image: None,
            image_gallery: vec![],
            is_featured: false,
            specs: Specs::new(),
            created_at: None,
        }
    }

    fn lot() -> Vec<Vehicle> {
        vec![
            car("1", "Toyota", "Harrier", 2021, 3_500_000.0, Status::Available),
            car("2", "Subaru", "Forester", 2019, 2_200_000.0, Status::Sold),
            car("3", "Mazda", "CX-5", 2020, 2_900_000.0, Status::Reserved),
            car("4", "Toyota", "Prado", 2018, 5_100_000.0, Status::Available),
        ]
    }

    fn ids(vehicles: &[Vehicle]) -> Vec<&str> {
        vehicles.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn query_matches_make_case_insensitively() {
        let cars = vec![
            car("h", "Toyota", "Harrier", 2021, 3_500_000.0, Status::Available),
            car("f", "Subaru", "Forester", 2019, 2_200_000.0, Status::Sold),
        ];
        let view = apply(&cars, "toyota", SortKey::Newest);
        assert_eq!(ids(&view), vec!["h"]);

        let sorted = apply(&cars, "", SortKey::PriceDesc);
        assert_eq!(ids(&sorted), vec!["h", "f"]);
    }

    #[test]
    fn empty_query_keeps_everything_in_order() {
        let cars = lot();
        assert_eq!(filter(&cars, "", SearchFields::MakeModelYear), cars);
    }

    #[test]
    fn every_match_contains_the_query() {
        let cars = lot();
        for query in ["TOY", "20", "cx", "forester 2019", "nothing"] {
            let view = filter(&cars, query, SearchFields::MakeModelYear);
            assert!(view.iter().all(|v| cars.contains(v)));
            assert!(view.iter().all(|v| format!("{} {} {}", v.make, v.model, v.year)
                .to_lowercase()
                .contains(&query.to_lowercase())));
        }
    }

    #[test]
    fn year_only_matches_on_inventory_fields() {
        let cars = lot();
        assert_eq!(filter(&cars, "2019", SearchFields::MakeModelYear).len(), 1);
        assert!(filter(&cars, "2019", SearchFields::MakeModel).is_empty());
    }

    #[test]
    fn no_match_is_an_empty_view() {
        assert!(apply(&lot(), "lamborghini", SortKey::PriceAsc).is_empty());
    }

    #[test]
    fn price_orders_are_mirror_images() {
        let cars = lot();
        let asc = apply(&cars, "", SortKey::PriceAsc);
        assert!(asc.windows(2).all(|w| w[0].price <= w[1].price));

        let mut desc = apply(&cars, "", SortKey::PriceDesc);
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn sorting_is_idempotent_and_input_untouched() {
        let cars = lot();
        let before = cars.clone();
        let once = apply(&cars, "", SortKey::YearNew);
        let twice = apply(&once, "", SortKey::YearNew);
        assert_eq!(once, twice);
        assert_eq!(cars, before);
        assert_eq!(ids(&once), vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn equal_prices_keep_input_order() {
        let cars = vec![
            car("a", "Nissan", "Note", 2017, 900_000.0, Status::Available),
            car("b", "Honda", "Fit", 2016, 900_000.0, Status::Available),
            car("c", "Suzuki", "Swift", 2018, 800_000.0, Status::Available),
        ];
        assert_eq!(ids(&apply(&cars, "", SortKey::PriceAsc)), vec!["c", "a", "b"]);
        assert_eq!(ids(&apply(&cars, "", SortKey::PriceDesc)), vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_sort_falls_back_to_newest() {
        assert_eq!(SortKey::parse_or_default("cheapest"), SortKey::Newest);
        assert_eq!(SortKey::parse_or_default("price_desc"), SortKey::PriceDesc);
    }

    #[test]
    fn clearing_a_view_resets_query_and_sort() {
        let mut view = CatalogView::new("toyota", SortKey::PriceAsc);
        assert_eq!(view.render(&lot()).len(), 2);
        view.clear();
        assert_eq!(view, CatalogView::default());
        assert_eq!(view.render(&lot()), lot());
    }

    #[test]
    fn featured_keeps_fetch_order() {
        let mut cars = lot();
        cars[3].is_featured = true;
        cars[0].is_featured = true;
        assert_eq!(ids(&featured(&cars)), vec!["1", "4"]);
    }
}
