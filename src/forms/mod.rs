//! Admin add/edit/content forms.
//!
//! Submitting the add form uploads every pending image one at a time, then
//! writes a single record. The first failure stops the flow; images that were
//! already uploaded stay in the bucket.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Session, Upload};
use crate::dealership::Dealership;
use crate::editor::{EditorError, SpecDraft};
use crate::models::{NewVehicle, SiteContent, Status, Vehicle, VehicleUpdate};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("No pending image at position {0}")]
    NoSuchImage(usize),

    #[error(transparent)]
    Spec(#[from] EditorError),

    #[error("Error uploading: {0:#}")]
    Upload(anyhow::Error),

    #[error("Error saving: {0:#}")]
    Write(anyhow::Error),

    #[error("Error loading: {0:#}")]
    Load(anyhow::Error),

    #[error("Vehicle {0} not found")]
    NotFound(String),
}

impl FormError {
    /// Failures caused by the remote store rather than the operator's input
    pub fn is_remote(&self) -> bool {
        matches!(self, FormError::Upload(_) | FormError::Write(_) | FormError::Load(_))
    }
}

/// Typed basic fields shared by the add and edit forms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleFields {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub status: Status,
}

impl VehicleFields {
    /// Parses raw form input. Year and price must be numeric.
    pub fn parse(make: &str, model: &str, year: &str, price: &str, status: &str) -> Result<Self, FormError> {
        let year = year.trim();
        let price = price.trim();
        if year.is_empty() {
            return Err(FormError::Missing("year"));
        }
        if price.is_empty() {
            return Err(FormError::Missing("price"));
        }

        let fields = Self {
            make: make.trim().to_string(),
            model: model.trim().to_string(),
            year: year.parse().map_err(|e: std::num::ParseIntError| FormError::Invalid {
                field: "year",
                reason: e.to_string(),
            })?,
            price: price.parse().map_err(|e: std::num::ParseFloatError| FormError::Invalid {
                field: "price",
                reason: e.to_string(),
            })?,
            status: if status.trim().is_empty() {
                Status::default()
            } else {
                status
                    .parse::<Status>()
                    .map_err(|reason| FormError::Invalid { field: "status", reason })?
            },
        };
        fields.validate()?;
        Ok(fields)
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.make.trim().is_empty() {
            return Err(FormError::Missing("make"));
        }
        if self.model.trim().is_empty() {
            return Err(FormError::Missing("model"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(FormError::Invalid {
                field: "price",
                reason: "must be a non-negative amount".into(),
            });
        }
        Ok(())
    }
}

/// Images picked in the add form, plus which one (if any) goes in the slider
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    files: Vec<Upload>,
    slider: Option<usize>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: Upload) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[Upload] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn slider_choice(&self) -> Option<usize> {
        self.slider
    }

    pub fn choose_slider(&mut self, index: usize) -> Result<(), FormError> {
        if index >= self.files.len() {
            return Err(FormError::NoSuchImage(index));
        }
        self.slider = Some(index);
        Ok(())
    }

    /// Drops a pending image. The slider choice follows the image it named.
    pub fn remove(&mut self, index: usize) -> Result<Upload, FormError> {
        if index >= self.files.len() {
            return Err(FormError::NoSuchImage(index));
        }

        self.slider = match self.slider {
            Some(chosen) if chosen == index => None,
            Some(chosen) if chosen > index => Some(chosen - 1),
            other => other,
        };
        Ok(self.files.remove(index))
    }

    /// Featured iff an image was explicitly chosen for the slider
    pub fn is_featured(&self) -> bool {
        self.slider.is_some()
    }
}

/// Object name for an uploaded file: millisecond timestamp, batch position,
/// then the file's own name without any directory part
pub fn object_name(position: usize, file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("image");
    format!("{}-{}-{}", Utc::now().timestamp_millis(), position, base)
}

/// Uploads the batch in order, then inserts the listing
pub async fn publish_vehicle(
    shop: &Dealership,
    session: &Session,
    fields: &VehicleFields,
    images: &UploadBatch,
    specs: &SpecDraft,
) -> Result<Vehicle, FormError> {
    fields.validate()?;

    let mut urls = Vec::with_capacity(images.len());
    for (position, file) in images.files().iter().enumerate() {
        let name = object_name(position, &file.file_name);
        match shop.upload_image(session, &name, file).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                warn!(
                    "Upload {} of {} failed, {} already stored: {:#}",
                    position + 1,
                    images.len(),
                    urls.len(),
                    e
                );
                return Err(FormError::Upload(e));
            }
        }
    }

    let record = NewVehicle {
        make: fields.make.clone(),
        model: fields.model.clone(),
        year: fields.year,
        price: fields.price,
        status: fields.status,
        main_image: urls.first().cloned(),
        image_gallery: urls,
        is_featured: images.is_featured(),
        specs: specs.to_specs(),
    };

    let vehicle = shop
        .add_vehicle(session, &record)
        .await
        .map_err(FormError::Write)?;

    info!(
        "✅ Published {} with {} images",
        vehicle.title(),
        vehicle.image_gallery.len()
    );
    Ok(vehicle)
}

/// State of the edit form after loading a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditForm {
    pub id: String,
    pub fields: VehicleFields,
    pub is_featured: bool,
    pub current_image: Option<String>,
    pub specs: SpecDraft,
}

impl EditForm {
    pub fn from_vehicle(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id.clone(),
            fields: VehicleFields {
                make: vehicle.make.clone(),
                model: vehicle.model.clone(),
                year: vehicle.year,
                price: vehicle.price,
                status: vehicle.status,
            },
            is_featured: vehicle.is_featured,
            current_image: vehicle.main_image.clone(),
            specs: SpecDraft::from_specs(&vehicle.specs),
        }
    }
}

pub async fn load_edit_form(shop: &Dealership, id: &str) -> Result<EditForm, FormError> {
    let vehicle = shop
        .vehicle(id)
        .await
        .map_err(FormError::Load)?
        .ok_or_else(|| FormError::NotFound(id.to_string()))?;
    Ok(EditForm::from_vehicle(&vehicle))
}

/// Writes the edited fields and specs back in one update. Images are untouched.
pub async fn save_vehicle(
    shop: &Dealership,
    session: &Session,
    id: &str,
    fields: &VehicleFields,
    is_featured: bool,
    specs: &SpecDraft,
) -> Result<(), FormError> {
    fields.validate()?;

    let update = VehicleUpdate {
        make: fields.make.clone(),
        model: fields.model.clone(),
        year: fields.year,
        price: fields.price,
        status: fields.status,
        is_featured,
        specs: specs.to_specs(),
    };

    shop.update_vehicle(session, id, &update)
        .await
        .map_err(FormError::Write)
}

/// Loads the site copy for editing; a missing row edits as blank fields
pub async fn load_site_content(shop: &Dealership) -> Result<SiteContent, FormError> {
    Ok(shop
        .site_content()
        .await
        .map_err(FormError::Load)?
        .unwrap_or_default())
}

pub async fn save_site_content(
    shop: &Dealership,
    session: &Session,
    content: &SiteContent,
) -> Result<(), FormError> {
    shop.update_site_content(session, content)
        .await
        .map_err(FormError::Write)?;
    info!("Site info updated");
    Ok(())
}

/// Uploads a new owner photo and returns the reference to store in `about_image`
pub async fn upload_owner_photo(
    shop: &Dealership,
    session: &Session,
    photo: &Upload,
) -> Result<String, FormError> {
    let name = format!("owner-{}", Utc::now().timestamp_millis());
    shop.upload_image(session, &name, photo)
        .await
        .map_err(FormError::Upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::Config;
    use std::sync::Arc;

    async fn shop() -> (Arc<MemoryBackend>, Dealership, Session) {
        let config = Config::from_lookup(|_| None).unwrap();
        let backend = Arc::new(MemoryBackend::new().with_admin("admin@x", "pw"));
        let shop = Dealership::new(backend.clone(), &config);
        let session = shop.sign_in("admin@x", "pw").await.unwrap();
        (backend, shop, session)
    }

    fn fields() -> VehicleFields {
        VehicleFields::parse("Toyota", "Harrier", "2021", "3500000", "available").unwrap()
    }

    fn batch(n: usize) -> UploadBatch {
        let mut batch = UploadBatch::new();
        for i in 0..n {
            batch.push(Upload::new(format!("photo{i}.jpg"), Some("image/jpeg".into()), vec![i as u8]));
        }
        batch
    }

    #[test]
    fn parse_rejects_non_numeric_input() {
        assert!(matches!(
            VehicleFields::parse("Toyota", "Harrier", "twenty", "1", ""),
            Err(FormError::Invalid { field: "year", .. })
        ));
        assert!(matches!(
            VehicleFields::parse("Toyota", "Harrier", "2020", "-5", ""),
            Err(FormError::Invalid { field: "price", .. })
        ));
        assert!(matches!(
            VehicleFields::parse("", "Harrier", "2020", "5", ""),
            Err(FormError::Missing("make"))
        ));
        assert_eq!(fields().status, Status::Available);
    }

    #[test]
    fn slider_choice_follows_removals() {
        let mut images = batch(3);
        images.choose_slider(2).unwrap();
        images.remove(0).unwrap();
        assert_eq!(images.slider_choice(), Some(1));

        images.remove(1).unwrap();
        assert_eq!(images.slider_choice(), None);
        assert!(!images.is_featured());
        assert!(images.choose_slider(4).is_err());
    }

    #[test]
    fn object_names_drop_directories() {
        let name = object_name(2, "C:\\Users\\me\\front.jpg");
        assert!(name.ends_with("-2-front.jpg"));
        assert!(object_name(0, "").ends_with("-0-image"));
    }

    #[tokio::test]
    async fn publish_links_uploads_and_specs() {
        let (backend, shop, session) = shop().await;
        let mut images = batch(2);
        images.choose_slider(1).unwrap();

        let mut specs = SpecDraft::new();
        specs.add("Engine", "2000cc");
        specs.add("Engine", "1800cc");

        let vehicle = publish_vehicle(&shop, &session, &fields(), &images, &specs)
            .await
            .unwrap();

        assert_eq!(vehicle.image_gallery.len(), 2);
        assert_eq!(vehicle.main_image.as_ref(), vehicle.image_gallery.first());
        assert!(vehicle.is_featured);
        assert_eq!(vehicle.specs.get("Engine").as_deref(), Some("1800cc"));
        assert_eq!(backend.object_keys().await.len(), 2);
    }

    #[tokio::test]
    async fn no_images_means_no_main_image() {
        let (_, shop, session) = shop().await;
        let vehicle = publish_vehicle(&shop, &session, &fields(), &UploadBatch::new(), &SpecDraft::new())
            .await
            .unwrap();
        assert!(vehicle.main_image.is_none());
        assert!(vehicle.image_gallery.is_empty());
        assert!(!vehicle.is_featured);
    }

    #[tokio::test]
    async fn upload_failure_stops_the_batch_and_keeps_earlier_files() {
        let (backend, shop, session) = shop().await;
        backend.fail_uploads_after(1);

        let err = publish_vehicle(&shop, &session, &fields(), &batch(3), &SpecDraft::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::Upload(_)));
        assert!(err.is_remote());

        assert_eq!(backend.object_keys().await.len(), 1);
        assert!(shop.vehicles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failure_leaves_uploads_behind() {
        let (backend, shop, session) = shop().await;
        backend.fail_writes(true);

        let err = publish_vehicle(&shop, &session, &fields(), &batch(2), &SpecDraft::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::Write(_)));
        assert_eq!(backend.object_keys().await.len(), 2);
    }

    #[tokio::test]
    async fn edit_round_trip_keeps_images() {
        let (_, shop, session) = shop().await;
        let vehicle = publish_vehicle(&shop, &session, &fields(), &batch(1), &SpecDraft::new())
            .await
            .unwrap();

        let mut form = load_edit_form(&shop, &vehicle.id).await.unwrap();
        assert!(form.specs.is_empty());
        form.fields.price = 3_250_000.0;
        form.fields.status = Status::Reserved;
        form.specs.add("Mileage", "21,000 km");

        save_vehicle(&shop, &session, &form.id, &form.fields, true, &form.specs)
            .await
            .unwrap();

        let stored = shop.vehicle(&vehicle.id).await.unwrap().unwrap();
        assert_eq!(stored.price, 3_250_000.0);
        assert_eq!(stored.status, Status::Reserved);
        assert!(stored.is_featured);
        assert_eq!(stored.image_gallery, vehicle.image_gallery);
        assert_eq!(stored.specs.get("Mileage").as_deref(), Some("21,000 km"));

        assert!(matches!(
            load_edit_form(&shop, "missing").await,
            Err(FormError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn owner_photo_and_content_save() {
        let (backend, shop, session) = shop().await;
        let mut content = load_site_content(&shop).await.unwrap();
        assert_eq!(content, SiteContent::default());

        let photo = Upload::new("me.png", Some("image/png".into()), vec![9]);
        content.about_image = upload_owner_photo(&shop, &session, &photo).await.unwrap();
        assert!(content.about_image.starts_with("memory://car-images/owner-"));
        assert_eq!(backend.object_keys().await.len(), 1);

        content.owner_name = "Amina".into();
        // No row yet, so the update matches nothing and the read stays empty
        save_site_content(&shop, &session, &content).await.unwrap();
        assert!(shop.site_content().await.unwrap().is_none());
    }
}
