use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{Backend, Order, Session, Upload};
use crate::config::Config;
use crate::models::{NewVehicle, SiteContent, Vehicle, VehicleUpdate, SITE_CONTENT_ID};

/// Typed access to the dealership's tables, bucket and auth
#[derive(Clone)]
pub struct Dealership {
    backend: Arc<dyn Backend>,
    vehicles_table: String,
    content_table: String,
    image_bucket: String,
}

impl Dealership {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            vehicles_table: config.vehicles_table.clone(),
            content_table: config.content_table.clone(),
            image_bucket: config.image_bucket.clone(),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.backend.source_name()
    }

    /// Every listing, newest arrivals first
    pub async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        let rows = self
            .backend
            .fetch_all(&self.vehicles_table, &Order::newest_first())
            .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn vehicle(&self, id: &str) -> Result<Option<Vehicle>> {
        self.backend
            .fetch_one(&self.vehicles_table, id)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn site_content(&self) -> Result<Option<SiteContent>> {
        self.backend
            .fetch_one(&self.content_table, SITE_CONTENT_ID)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn add_vehicle(&self, session: &Session, vehicle: &NewVehicle) -> Result<Vehicle> {
        let row = self
            .backend
            .insert(session, &self.vehicles_table, serde_json::to_value(vehicle)?)
            .await?;
        let stored: Vehicle = decode(row)?;
        info!("Listed {} {} {} as {}", stored.year, stored.make, stored.model, stored.id);
        Ok(stored)
    }

    pub async fn update_vehicle(&self, session: &Session, id: &str, update: &VehicleUpdate) -> Result<()> {
        self.backend
            .update(session, &self.vehicles_table, id, serde_json::to_value(update)?)
            .await?;
        info!("Updated vehicle {}", id);
        Ok(())
    }

    pub async fn delete_vehicle(&self, session: &Session, id: &str) -> Result<()> {
        self.backend.delete(session, &self.vehicles_table, id).await?;
        info!("Deleted vehicle {}", id);
        Ok(())
    }

    pub async fn update_site_content(&self, session: &Session, content: &SiteContent) -> Result<()> {
        self.backend
            .update(
                session,
                &self.content_table,
                SITE_CONTENT_ID,
                serde_json::to_value(content)?,
            )
            .await
    }

    /// Stores `file` under `name` in the image bucket and returns its public URL
    pub async fn upload_image(&self, session: &Session, name: &str, file: &Upload) -> Result<String> {
        self.backend
            .upload(session, &self.image_bucket, name, file)
            .await?;
        let url = self.backend.public_url(&self.image_bucket, name)?;
        debug!("Uploaded {} -> {}", name, url);
        Ok(url)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.backend.sign_in(email, password).await?;
        info!("Admin signed in ({})", session.email.as_deref().unwrap_or(email));
        Ok(session)
    }

    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        self.backend.sign_out(session).await
    }

    pub async fn session(&self, access_token: &str) -> Result<Option<Session>> {
        self.backend.current_session(access_token).await
    }
}

fn decode<T: DeserializeOwned>(row: Value) -> Result<T> {
    serde_json::from_value(row).context("Unexpected record shape from store")
}
