use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::AppState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Existing user id to mint a token for; omitted means a fresh identity.
    pub user_id: Option<Uuid>,
}

/// Mint a bearer token. There is no account database behind this service;
/// identity is whatever id the token carries, and ownership scoping does the
/// rest.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>> {
    let user_id = request.user_id.unwrap_or_else(Uuid::new_v4);
    let token = state.auth.issue_token(user_id)?;
    Ok(Json(json!({
        "userId": user_id,
        "token": token,
    })))
}
