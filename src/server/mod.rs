//! Public catalog and admin panel over HTTP.
//!
//! Public routes need no session. Everything under `/admin/` except the
//! login form itself goes through the [`admin::AdminSession`] extractor,
//! which redirects to `/admin` when no valid session is presented.

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::Config;

pub mod admin;
pub mod routes;
pub mod state;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(routes::home))
        .route("/featured/stream", get(routes::featured_stream))
        .route("/inventory", get(routes::inventory))
        .route("/inventory/:id", get(routes::vehicle_detail))
        .route("/about", get(routes::about))
        .route("/admin", get(admin::login_page).post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/dashboard/:id", delete(admin::remove_vehicle))
        .route("/admin/add", post(admin::add_vehicle))
        .route("/admin/edit/:id", get(admin::edit_form).post(admin::save_edit))
        .route("/admin/content", get(admin::content_form).post(admin::save_content))
        .route("/admin/content/photo", post(admin::upload_photo))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_config(config)?;
    info!("Inventory source: {}", state.shop.source_name());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
