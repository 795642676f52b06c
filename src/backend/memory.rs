use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::traits::{ObjectStorage, RemoteStore, SessionAuth};
use super::types::{Direction, Order, Session, Upload};

/// In-process stand-in for the hosted backend.
///
/// Serves demo inventory when no backend is configured and backs the tests.
/// Writes require a session issued by [`SessionAuth::sign_in`], the same way
/// row-level policies gate writes on the hosted store.
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    sessions: RwLock<HashSet<String>>,
    admin: Option<(String, String)>,
    next_id: AtomicU64,
    uploads_left: AtomicUsize,
    writes_fail: AtomicBool,
    lookups_fail: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashSet::new()),
            admin: None,
            next_id: AtomicU64::new(1),
            uploads_left: AtomicUsize::new(usize::MAX),
            writes_fail: AtomicBool::new(false),
            lookups_fail: AtomicBool::new(false),
        }
    }

    /// Accept exactly one email/password pair at sign in
    pub fn with_admin(mut self, email: &str, password: &str) -> Self {
        self.admin = Some((email.to_string(), password.to_string()));
        self
    }

    /// Backend pre-filled with sample listings and site copy
    pub fn demo(vehicles_table: &str, content_table: &str) -> Self {
        let backend = Self::new();
        let now = Utc::now();
        let cars = demo_inventory();
        let count = cars.len() as i64;

        let rows = cars
            .into_iter()
            .enumerate()
            .map(|(i, mut car)| {
                let created = now - Duration::hours(count - i as i64);
                if let Value::Object(fields) = &mut car {
                    fields.insert("id".into(), json!(backend.fresh_id()));
                    let stamp = created.to_rfc3339_opts(SecondsFormat::Micros, true);
                    fields.insert("created_at".into(), json!(stamp));
                }
                car
            })
            .collect();

        let content = json!({
            "id": 1,
            "owner_name": "Tajiree Auto",
            "about_text": "Family-run dealership in Mombasa importing and selling quality used vehicles.",
            "about_image": "",
            "contact_phone": "+254 721 590 781",
            "contact_email": "sales@tajiree.example"
        });

        let tables = HashMap::from([
            (vehicles_table.to_string(), rows),
            (content_table.to_string(), vec![content]),
        ]);

        info!("📋 Seeded demo inventory with {} vehicles", count);

        Self {
            tables: RwLock::new(tables),
            ..backend
        }
    }

    /// Let `count` more uploads through, then fail every one after
    pub fn fail_uploads_after(&self, count: usize) {
        self.uploads_left.store(count, AtomicOrdering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.writes_fail.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make session lookups fail as if the auth service were unreachable
    pub fn fail_session_lookups(&self, fail: bool) {
        self.lookups_fail.store(fail, AtomicOrdering::SeqCst);
    }

    /// Rows currently held for `table`, in insertion order
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// Stored object keys as `bucket/name`, sorted
    pub async fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn fresh_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        format!("{:08x}-0000-4000-8000-{:012x}", seq, seq)
    }

    async fn authorize(&self, session: &Session) -> Result<()> {
        if !self.sessions.read().await.contains(&session.access_token) {
            bail!("JWT expired or invalid");
        }
        if self.writes_fail.load(AtomicOrdering::SeqCst) {
            bail!("write rejected by store");
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn id_of(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RemoteStore for MemoryBackend {
    async fn fetch_all(&self, table: &str, order: &Order) -> Result<Vec<Value>> {
        let rows = self.rows(table).await;

        // Ties fall back to insertion order so "newest first" stays newest first
        let mut indexed: Vec<(usize, Value)> = rows.into_iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            let by_column = compare(a.get(&order.column), b.get(&order.column)).then(ia.cmp(ib));
            match order.direction {
                Direction::Ascending => by_column,
                Direction::Descending => by_column.reverse(),
            }
        });

        debug!("Memory read of {} ({} rows)", table, indexed.len());
        Ok(indexed.into_iter().map(|(_, row)| row).collect())
    }

    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .rows(table)
            .await
            .into_iter()
            .find(|row| id_of(row).as_deref() == Some(id)))
    }

    async fn insert(&self, session: &Session, table: &str, record: Value) -> Result<Value> {
        self.authorize(session).await?;

        let Value::Object(mut fields) = record else {
            bail!("insert expects an object");
        };
        if !fields.contains_key("id") {
            fields.insert("id".into(), json!(self.fresh_id()));
        }
        if !fields.contains_key("created_at") {
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            fields.insert("created_at".into(), json!(stamp));
        }

        let row = Value::Object(fields);
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, session: &Session, table: &str, id: &str, patch: Value) -> Result<()> {
        self.authorize(session).await?;

        let Value::Object(patch) = patch else {
            bail!("update expects an object");
        };

        let mut tables = self.tables.write().await;
        // Like a filtered PATCH, matching no row is not an error
        if let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| id_of(row).as_deref() == Some(id)))
        {
            if let Value::Object(fields) = row {
                merge(fields, patch);
            }
        }
        Ok(())
    }

    async fn delete(&self, session: &Session, table: &str, id: &str) -> Result<()> {
        self.authorize(session).await?;

        if let Some(rows) = self.tables.write().await.get_mut(table) {
            rows.retain(|row| id_of(row).as_deref() != Some(id));
        }
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

fn merge(fields: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        fields.insert(key, value);
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(&self, session: &Session, bucket: &str, name: &str, file: &Upload) -> Result<()> {
        if !self.sessions.read().await.contains(&session.access_token) {
            bail!("JWT expired or invalid");
        }

        let allowed = self
            .uploads_left
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if !allowed {
            bail!("storage rejected upload of {name}");
        }

        let key = format!("{bucket}/{name}");
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            bail!("The resource already exists: {key}");
        }
        objects.insert(key, file.bytes.clone());
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> Result<String> {
        Ok(format!("memory://{bucket}/{name}"))
    }
}

#[async_trait]
impl SessionAuth for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let accepted = self
            .admin
            .as_ref()
            .is_some_and(|(e, p)| e == email && p == password);
        if !accepted {
            return Err(anyhow!("Invalid login credentials"));
        }

        let token = format!("demo-{}", self.fresh_id());
        self.sessions.write().await.insert(token.clone());

        Ok(Session {
            access_token: token,
            email: Some(email.to_string()),
            expires_at: None,
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.sessions.write().await.remove(&session.access_token);
        Ok(())
    }

    async fn current_session(&self, access_token: &str) -> Result<Option<Session>> {
        if self.lookups_fail.load(AtomicOrdering::SeqCst) {
            bail!("auth service unavailable");
        }
        if !self.sessions.read().await.contains(access_token) {
            return Ok(None);
        }

        Ok(Some(Session {
            access_token: access_token.to_string(),
            email: self.admin.as_ref().map(|(email, _)| email.clone()),
            expires_at: None,
        }))
    }
}

/// Sample listings based on typical stock
fn demo_inventory() -> Vec<Value> {
    vec![
        json!({
            "make": "Subaru",
            "model": "Forester",
            "year": 2019,
            "price": 2_200_000,
            "status": "sold",
            "main_image": "https://images.tajiree.example/forester-front.jpg",
            "image_gallery": ["https://images.tajiree.example/forester-front.jpg"],
            "is_featured": false,
            "specs": {"Engine": "2000cc", "Transmission": "Automatic"}
        }),
        json!({
            "make": "Mazda",
            "model": "CX-5",
            "year": 2020,
            "price": 2_900_000,
            "status": "reserved",
            "main_image": "https://images.tajiree.example/cx5-front.jpg",
            "image_gallery": [
                "https://images.tajiree.example/cx5-front.jpg",
                "https://images.tajiree.example/cx5-interior.jpg"
            ],
            "is_featured": false,
            "specs": {"Engine": "2200cc Diesel", "Mileage": "48,000 km"}
        }),
        json!({
            "make": "Toyota",
            "model": "Land Cruiser Prado",
            "year": 2018,
            "price": 5_100_000,
            "status": "available",
            "main_image": "https://images.tajiree.example/prado-front.jpg",
            "image_gallery": [
                "https://images.tajiree.example/prado-front.jpg",
                "https://images.tajiree.example/prado-side.jpg",
                "https://images.tajiree.example/prado-rear.jpg"
            ],
            "is_featured": true,
            "specs": {"Engine": "2800cc Diesel", "Seats": "7", "Drive": "4WD"}
        }),
        json!({
            "make": "Toyota",
            "model": "Harrier",
            "year": 2021,
            "price": 3_500_000,
            "status": "available",
            "main_image": "https://images.tajiree.example/harrier-front.jpg",
            "image_gallery": [
                "https://images.tajiree.example/harrier-front.jpg",
                "https://images.tajiree.example/harrier-dash.jpg"
            ],
            "is_featured": true,
            "specs": {"Engine": "2000cc", "Fuel": "Petrol", "Mileage": "21,000 km"}
        }),
    ]
}
