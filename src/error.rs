use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::editor::EditorError;
use crate::forms::FormError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Operation failed: {0:#}")]
    Remote(#[from] anyhow::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Sign in required")]
    Unauthorized,

    #[error("Sign in failed: {0:#}")]
    SignIn(anyhow::Error),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Spec(#[from] EditorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => return Redirect::to("/admin").into_response(),
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SignIn(_) => StatusCode::UNAUTHORIZED,
            AppError::MalformedPayload(_) | AppError::Spec(_) => StatusCode::BAD_REQUEST,
            AppError::Form(FormError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Form(e) if e.is_remote() => StatusCode::BAD_GATEWAY,
            AppError::Form(_) => StatusCode::BAD_REQUEST,
        };

        if status == StatusCode::BAD_GATEWAY {
            warn!("{}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn statuses_by_failure_kind() {
        let status = |e: AppError| e.into_response().status();

        assert_eq!(status(anyhow::anyhow!("timeout").into()), StatusCode::BAD_GATEWAY);
        assert_eq!(status(AppError::NotFound("Vehicle")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(FormError::Missing("make").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(FormError::Write(anyhow::anyhow!("denied")).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(FormError::NotFound("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(EditorError::OutOfRange { index: 1, len: 0 }.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_session_redirects_to_login() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/admin");
    }
}
