use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::traits::{ObjectStorage, RemoteStore, SessionAuth};
use super::types::{Order, Session, Upload};

/// Client for a Supabase-style hosted backend (PostgREST tables, storage
/// buckets and GoTrue auth under one base URL)
pub struct RestBackend {
    client: Client,
    base: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    email: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid backend URL '{base_url}'"))?;
        if base.cannot_be_a_base() {
            bail!("Backend URL '{base_url}' cannot carry paths");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tajiree-site/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        info!("Using hosted backend at {}", base);

        Ok(Self {
            client,
            base,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Backend URL cannot carry paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn table(&self, table: &str) -> Result<Url> {
        self.endpoint(&["rest", "v1", table])
    }

    fn row(&self, table: &str, id: &str) -> Result<Url> {
        let mut url = self.table(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }

    /// Attaches the project key, plus the caller's token when acting as an admin
    fn authorize(&self, request: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let bearer = session.map_or(self.api_key.as_str(), |s| s.access_token.as_str());
        request.header("apikey", &self.api_key).bearer_auth(bearer)
    }
}

async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("{} returned status: {}", what, status);
    bail!("{what} failed ({status}): {body}");
}

#[async_trait]
impl RemoteStore for RestBackend {
    async fn fetch_all(&self, table: &str, order: &Order) -> Result<Vec<Value>> {
        let mut url = self.table(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", &format!("{}.{}", order.column, order.direction.as_str()));

        debug!("Fetching URL: {}", url);

        let response = self
            .authorize(self.client.get(url), None)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {table}"))?;

        let rows: Vec<Value> = check(response, "Table read")
            .await?
            .json()
            .await
            .context("Failed to decode rows")?;

        debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<Value>> {
        let mut url = self.row(table, id)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "1");

        debug!("Fetching URL: {}", url);

        let response = self
            .authorize(self.client.get(url), None)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {table} row {id}"))?;

        let rows: Vec<Value> = check(response, "Row read")
            .await?
            .json()
            .await
            .context("Failed to decode row")?;

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, session: &Session, table: &str, record: Value) -> Result<Value> {
        let url = self.table(table)?;

        let response = self
            .authorize(self.client.post(url), Some(session))
            .header("Prefer", "return=representation")
            .json(&[record])
            .send()
            .await
            .with_context(|| format!("Failed to insert into {table}"))?;

        let rows: Vec<Value> = check(response, "Insert")
            .await?
            .json()
            .await
            .context("Failed to decode inserted row")?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert into {table} returned no row"))
    }

    async fn update(&self, session: &Session, table: &str, id: &str, patch: Value) -> Result<()> {
        let url = self.row(table, id)?;

        let response = self
            .authorize(self.client.patch(url), Some(session))
            .json(&patch)
            .send()
            .await
            .with_context(|| format!("Failed to update {table} row {id}"))?;

        check(response, "Update").await?;
        Ok(())
    }

    async fn delete(&self, session: &Session, table: &str, id: &str) -> Result<()> {
        let url = self.row(table, id)?;

        let response = self
            .authorize(self.client.delete(url), Some(session))
            .send()
            .await
            .with_context(|| format!("Failed to delete {table} row {id}"))?;

        check(response, "Delete").await?;
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "hosted"
    }
}

#[async_trait]
impl ObjectStorage for RestBackend {
    async fn upload(&self, session: &Session, bucket: &str, name: &str, file: &Upload) -> Result<()> {
        let url = self.endpoint(&["storage", "v1", "object", bucket, name])?;
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!("Uploading {} bytes to {}", file.bytes.len(), url);

        let response = self
            .authorize(self.client.post(url), Some(session))
            .header(header::CONTENT_TYPE, content_type)
            .body(file.bytes.clone())
            .send()
            .await
            .with_context(|| format!("Failed to upload {name}"))?;

        check(response, "Upload").await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> Result<String> {
        Ok(self
            .endpoint(&["storage", "v1", "object", "public", bucket, name])?
            .to_string())
    }
}

#[async_trait]
impl SessionAuth for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .authorize(self.client.post(url), None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to reach auth service")?;

        let token: TokenResponse = check(response, "Sign in")
            .await?
            .json()
            .await
            .context("Failed to decode session")?;

        Ok(Session {
            access_token: token.access_token,
            email: token.user.and_then(|u| u.email),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let url = self.endpoint(&["auth", "v1", "logout"])?;

        let response = self
            .authorize(self.client.post(url), Some(session))
            .send()
            .await
            .context("Failed to reach auth service")?;

        check(response, "Sign out").await?;
        Ok(())
    }

    async fn current_session(&self, access_token: &str) -> Result<Option<Session>> {
        let url = self.endpoint(&["auth", "v1", "user"])?;

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to reach auth service")?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user: AuthUser = check(response, "Session lookup")
            .await?
            .json()
            .await
            .context("Failed to decode user")?;

        Ok(Some(Session {
            access_token: access_token.to_string(),
            email: user.email,
            expires_at: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path_and_encode_names() {
        let backend = RestBackend::new("https://abc.supabase.co/", "anon").unwrap();

        assert_eq!(
            backend.row("cars", "42").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/cars?id=eq.42"
        );
        assert_eq!(
            backend.public_url("car-images", "1700000000000-0-front view.jpg").unwrap(),
            "https://abc.supabase.co/storage/v1/object/public/car-images/1700000000000-0-front%20view.jpg"
        );

        let nested = RestBackend::new("https://proxy.local/baas", "anon").unwrap();
        assert_eq!(
            nested.table("cars").unwrap().as_str(),
            "https://proxy.local/baas/rest/v1/cars"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(RestBackend::new("not a url", "anon").is_err());
        assert!(RestBackend::new("mailto:owner@example.com", "anon").is_err());
    }
}
