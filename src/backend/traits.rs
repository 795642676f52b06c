use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::types::{Order, Session, Upload};

/// Table storage of the hosted backend.
/// Rows cross this boundary as JSON; typing happens one layer up.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every row of `table`, ordered by the store
    async fn fetch_all(&self, table: &str, order: &Order) -> Result<Vec<Value>>;

    /// The row whose `id` equals `id`, if any
    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<Value>>;

    /// Inserts one row and returns it as stored
    async fn insert(&self, session: &Session, table: &str, record: Value) -> Result<Value>;

    /// Applies a partial record to the row with `id`
    async fn update(&self, session: &Session, table: &str, id: &str, patch: Value) -> Result<()>;

    async fn delete(&self, session: &Session, table: &str, id: &str) -> Result<()>;

    /// Get the name of the backend
    fn source_name(&self) -> &'static str;
}

/// Object storage for uploaded images
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, session: &Session, bucket: &str, name: &str, file: &Upload) -> Result<()>;

    /// Durable public reference to a stored object
    fn public_url(&self, bucket: &str, name: &str) -> Result<String>;
}

/// Email/password session auth
#[async_trait]
pub trait SessionAuth: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// Resolves a bearer token to its live session, `None` when expired or unknown
    async fn current_session(&self, access_token: &str) -> Result<Option<Session>>;
}

/// Everything the site needs from the hosted backend
pub trait Backend: RemoteStore + ObjectStorage + SessionAuth {}

impl<T: RemoteStore + ObjectStorage + SessionAuth> Backend for T {}
