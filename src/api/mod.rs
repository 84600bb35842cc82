// HTTP surface
//
// Thin handlers over the orchestrator and stores: parse, authenticate,
// delegate, serialize. No pipeline logic lives here.

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthKeys;
use crate::error::DubError;
use crate::payment::PaymentStore;
use crate::pipeline::JobOrchestrator;

pub mod health;
pub mod payments;
pub mod session;
pub mod videos;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub payments: PaymentStore,
    pub auth: AuthKeys,
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl IntoResponse for DubError {
    fn into_response(self) -> Response {
        let status = match &self {
            DubError::Validation(_) | DubError::Payment(_) => StatusCode::BAD_REQUEST,
            DubError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DubError::Forbidden(_) => StatusCode::FORBIDDEN,
            DubError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal failure detail stays in the logs, not the response
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/token", post(session::issue_token))
        .route("/api/videos/upload", post(videos::upload))
        .route("/api/videos", get(videos::list))
        .route("/api/videos/{id}/status", get(videos::status))
        .route("/api/videos/{id}/download", get(videos::download))
        .route("/api/videos/{id}", delete(videos::remove))
        .route("/api/payments", post(payments::create).get(payments::list))
        .route("/api/payments/{id}", get(payments::status))
        .route("/api/payments/{id}/refund", post(payments::refund))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
