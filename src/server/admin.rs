//! Admin panel handlers. Every handler except the login form takes an
//! [`AdminSession`], so an unauthenticated request never reaches it.

use async_trait::async_trait;
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        FromRequestParts, Multipart, Path, State,
    },
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Redirect},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::state::AppState;
use crate::backend::{Session, Upload};
use crate::editor::{SpecDraft, SpecEdit};
use crate::error::AppError;
use crate::forms::{self, EditForm, FormError, UploadBatch, VehicleFields};
use crate::models::{SiteContent, Status, Vehicle};

pub const SESSION_COOKIE: &str = "tajiree_session";

/// A signed-in administrator
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        match state.shop.session(&token).await {
            Ok(Some(session)) => Ok(AdminSession(session)),
            Ok(None) => Err(AppError::Unauthorized),
            Err(e) => {
                warn!("Session lookup failed, sending admin to sign in: {:#}", e);
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Bearer token first, then the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub signed_in: bool,
}

pub async fn login_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LoginPage>, AppError> {
    let signed_in = match session_token(&headers) {
        Some(token) => state.shop.session(&token).await?.is_some(),
        None => false,
    };
    Ok(Json(LoginPage { signed_in }))
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .shop
        .sign_in(credentials.email.trim(), &credentials.password)
        .await
        .map_err(|e| {
            warn!("Rejected admin sign in for {}: {:#}", credentials.email, e);
            AppError::SignIn(e)
        })?;

    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.access_token
    );
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/admin/dashboard")))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
) -> Result<impl IntoResponse, AppError> {
    state.shop.sign_out(&session).await?;
    info!("Admin signed out");

    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0");
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/admin")))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub email: Option<String>,
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
) -> Result<Json<Dashboard>, AppError> {
    let vehicles = state.shop.vehicles().await?;
    Ok(Json(Dashboard {
        email: session.email,
        count: vehicles.len(),
        vehicles,
    }))
}

pub async fn remove_vehicle(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.shop.delete_vehicle(&session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn malformed(e: MultipartError) -> AppError {
    AppError::MalformedPayload(e.to_string())
}

async fn read_upload(field: Field<'_>, fallback_name: &str) -> Result<Upload, AppError> {
    let file_name = field
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback_name)
        .to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(malformed)?;
    Ok(Upload::new(file_name, content_type, bytes.to_vec()))
}

/// Multipart add form: `make`, `model`, `year`, `price`, `status`, optional
/// `slider` (index into the `images` parts as submitted), repeated `spec_key`/`spec_value` pairs
/// and repeated `images` files.
pub async fn add_vehicle(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let mut text: HashMap<String, String> = HashMap::new();
    let mut spec_keys = Vec::new();
    let mut spec_values = Vec::new();
    let mut images = UploadBatch::new();
    // Batch position of each submitted image part, None for empty parts
    let mut submitted: Vec<Option<usize>> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let upload = read_upload(field, "image").await?;
                if upload.bytes.is_empty() {
                    submitted.push(None);
                } else {
                    submitted.push(Some(images.len()));
                    images.push(upload);
                }
            }
            "spec_key" => spec_keys.push(field.text().await.map_err(malformed)?),
            "spec_value" => spec_values.push(field.text().await.map_err(malformed)?),
            _ => {
                let value = field.text().await.map_err(malformed)?;
                text.insert(name, value);
            }
        }
    }

    if spec_keys.len() != spec_values.len() {
        return Err(AppError::MalformedPayload(format!(
            "{} spec keys but {} spec values",
            spec_keys.len(),
            spec_values.len()
        )));
    }
    let mut specs = SpecDraft::new();
    for (key, value) in spec_keys.iter().zip(&spec_values) {
        specs.add(key, value);
    }

    let raw = |key: &str| text.get(key).map(String::as_str).unwrap_or("");
    if let Some(slider) = text.get("slider").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let index: usize = slider
            .parse()
            .map_err(|_| AppError::MalformedPayload(format!("slider index '{slider}'")))?;
        let position = submitted
            .get(index)
            .copied()
            .flatten()
            .ok_or(FormError::NoSuchImage(index))?;
        images.choose_slider(position)?;
    }

    let fields = VehicleFields::parse(raw("make"), raw("model"), raw("year"), raw("price"), raw("status"))?;
    let vehicle = forms::publish_vehicle(&state.shop, &session, &fields, &images, &specs).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    AdminSession(_): AdminSession,
    Path(id): Path<String>,
) -> Result<Json<EditForm>, AppError> {
    Ok(Json(forms::load_edit_form(&state.shop, &id).await?))
}

/// Edited form state: the typed fields, the spec entries as currently shown
/// and any spec edits made since, applied in order.
#[derive(Debug, Deserialize)]
pub struct EditSubmission {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub status: Status,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub specs: SpecDraft,
    #[serde(default)]
    pub edits: Vec<SpecEdit>,
}

pub async fn save_edit(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<String>,
    Json(submission): Json<EditSubmission>,
) -> Result<Json<EditForm>, AppError> {
    forms::load_edit_form(&state.shop, &id).await?;

    let mut specs = submission.specs;
    for edit in submission.edits {
        specs.apply(edit)?;
    }

    let fields = VehicleFields {
        make: submission.make.trim().to_string(),
        model: submission.model.trim().to_string(),
        year: submission.year,
        price: submission.price,
        status: submission.status,
    };
    forms::save_vehicle(&state.shop, &session, &id, &fields, submission.is_featured, &specs).await?;

    Ok(Json(forms::load_edit_form(&state.shop, &id).await?))
}

pub async fn content_form(
    State(state): State<Arc<AppState>>,
    AdminSession(_): AdminSession,
) -> Result<Json<SiteContent>, AppError> {
    Ok(Json(forms::load_site_content(&state.shop).await?))
}

pub async fn save_content(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Json(content): Json<SiteContent>,
) -> Result<Json<SiteContent>, AppError> {
    forms::save_site_content(&state.shop, &session, &content).await?;
    Ok(Json(content))
}

/// Uploads the `photo` field and hands back the URL for `about_image`.
/// Nothing is persisted until the content form is saved.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("photo") {
            continue;
        }
        let photo = read_upload(field, "photo").await?;
        let url = forms::upload_owner_photo(&state.shop, &session, &photo).await?;
        return Ok(Json(json!({ "about_image": url })));
    }

    Err(AppError::MalformedPayload("missing photo field".into()))
}
