//! Online payment API

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use shared::error::{ApiResponse, AppResult};
use shared::models::Order;

use crate::auth::CurrentUser;
use crate::payment::{PaymentIntent, VerifyPaymentRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payment/create-order", post(create_order))
        .route("/api/payment/verify", post(verify))
}

/// POST /api/payment/create-order
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<PaymentIntent>> {
    Ok(ApiResponse::success(state.payments.create_intent(&user).await?))
}

/// POST /api/payment/verify
pub async fn verify(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> AppResult<ApiResponse<Order>> {
    Ok(ApiResponse::success(
        state.payments.verify_and_place(&user, req).await?,
    ))
}
