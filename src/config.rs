use anyhow::{Context, Result};
use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// Base URL of the hosted backend; `None` serves demo data from memory
    pub baas_url: Option<String>,
    pub baas_anon_key: String,
    pub vehicles_table: String,
    pub content_table: String,
    pub image_bucket: String,
    pub dealer_name: String,
    pub whatsapp_number: String,
    pub carousel_interval: Duration,
    pub max_upload_bytes: usize,
    pub demo_admin_email: String,
    pub demo_admin_password: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, the environment in production
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let baas_url = lookup("BAAS_URL").filter(|url| !url.trim().is_empty());
        let baas_anon_key = match (&baas_url, lookup("BAAS_ANON_KEY")) {
            (_, Some(key)) => key,
            (Some(_), None) => {
                warn!("BAAS_URL is set but BAAS_ANON_KEY is not, requests will be anonymous");
                String::new()
            }
            (None, None) => String::new(),
        };

        let interval_secs: u64 = try_load(&lookup, "CAROUSEL_INTERVAL_SECS", "5")?;
        let upload_mb: usize = try_load(&lookup, "MAX_UPLOAD_MB", "25")?;
        let max_upload_bytes = upload_mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("Invalid MAX_UPLOAD_MB value '{upload_mb}': too large"))?;

        Ok(Self {
            port: try_load(&lookup, "SITE_PORT", "8080")?,
            baas_url,
            baas_anon_key,
            vehicles_table: try_load(&lookup, "VEHICLES_TABLE", "cars")?,
            content_table: try_load(&lookup, "CONTENT_TABLE", "site_content")?,
            image_bucket: try_load(&lookup, "IMAGE_BUCKET", "car-images")?,
            dealer_name: try_load(&lookup, "DEALER_NAME", "TajireeAuto")?,
            whatsapp_number: try_load(&lookup, "WHATSAPP_NUMBER", "254721590781")?,
            carousel_interval: Duration::from_secs(interval_secs.max(1)),
            max_upload_bytes,
            demo_admin_email: try_load(&lookup, "DEMO_ADMIN_EMAIL", "admin@tajiree.example")?,
            demo_admin_password: try_load(&lookup, "DEMO_ADMIN_PASSWORD", "tajiree-demo")?,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}
