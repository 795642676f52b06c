use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fixed key of the singleton site content row
pub const SITE_CONTENT_ID: &str = "1";

/// Sale status of a listed vehicle
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Available,
    Reserved,
    Sold,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::Reserved => "reserved",
            Status::Sold => "sold",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Status::Available),
            "reserved" => Ok(Status::Reserved),
            "sold" => Ok(Status::Sold),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Persisted form of a vehicle's specifications.
///
/// Keys keep the order the upstream store handed them over in. Values written
/// by this crate are always strings; anything else found upstream is coerced
/// to its string form when read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specs(Map<String, Value>);

impl Specs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a spec, returning the value it replaced. An existing key keeps
    /// its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0
            .insert(key.into(), Value::String(value.into()))
            .map(|old| coerce(&old))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(coerce)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in stored key order with values coerced to strings
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), coerce(v)))
    }
}

impl From<Map<String, Value>> for Specs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A listed vehicle as stored in the `cars` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// Asking price in KES
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_gallery: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_featured: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specs: Specs,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Vehicle {
    /// "Make Model"
    pub fn title(&self) -> String {
        format!("{} {}", self.make, self.model)
    }

    /// Short inventory tag shown on the detail page
    pub fn inventory_tag(&self) -> String {
        self.id.chars().take(8).collect()
    }
}

/// Insert payload produced by the add form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub status: Status,
    pub main_image: Option<String>,
    pub image_gallery: Vec<String>,
    pub is_featured: bool,
    pub specs: Specs,
}

/// Partial update produced by the edit form. Images are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleUpdate {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub status: Status,
    pub is_featured: bool,
    pub specs: Specs,
}

/// Singleton row with the static copy shown on the about page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub about_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub about_image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact_phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact_email: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vehicle_tolerates_nulls_from_store() {
        let vehicle: Vehicle = serde_json::from_value(json!({
            "id": "a1b2c3d4-0000",
            "make": "Toyota",
            "model": "Harrier",
            "year": 2021,
            "price": 3500000,
            "status": null,
            "main_image": null,
            "image_gallery": null,
            "is_featured": null,
            "specs": null,
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(vehicle.status, Status::Available);
        assert!(vehicle.image_gallery.is_empty());
        assert!(!vehicle.is_featured);
        assert!(vehicle.specs.is_empty());
        assert_eq!(vehicle.inventory_tag(), "a1b2c3d4");
        assert_eq!(vehicle.title(), "Toyota Harrier");
    }

    #[test]
    fn specs_coerce_non_string_values() {
        let specs: Specs = serde_json::from_value(json!({"Seats": 7, "4WD": true})).unwrap();
        assert_eq!(specs.get("Seats").as_deref(), Some("7"));
        assert_eq!(specs.get("4WD").as_deref(), Some("true"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("SOLD".parse::<Status>().unwrap(), Status::Sold);
        assert!("gone".parse::<Status>().is_err());
    }

    #[test]
    fn site_content_defaults_missing_fields() {
        let content: SiteContent =
            serde_json::from_value(json!({"id": 1, "owner_name": "Amina", "about_text": null}))
                .unwrap();
        assert_eq!(content.owner_name, "Amina");
        assert_eq!(content.about_text, "");
        assert_eq!(content.contact_email, "");
    }
}
