use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::Result;
use crate::payment::{PaymentInstrument, PaymentRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub job_id: Uuid,
    pub plan_name: String,
    pub amount: f64,
    #[serde(flatten)]
    pub instrument: PaymentInstrument,
}

/// Charge for a dubbing job. The job must exist and belong to the caller;
/// raw instrument details never leave this handler unmasked.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePayment>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .store()
        .get_owned(request.job_id, user.user_id)
        .await?;

    let record = state
        .payments
        .charge(
            user.user_id,
            request.job_id,
            &request.plan_name,
            request.amount,
            request.instrument,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>> {
    let records = state.payments.list_for_owner(user.user_id).await;
    Ok(Json(json!({ "payments": records })))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecord>> {
    let record = state.payments.get_owned(id, user.user_id).await?;
    Ok(Json(record))
}

pub async fn refund(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecord>> {
    let record = state.payments.refund(id, user.user_id).await?;
    Ok(Json(record))
}
