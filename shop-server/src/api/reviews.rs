//! Review API

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use shared::error::{ApiResponse, AppResult};
use shared::models::{Product, ProductReviews, ReviewInput};

use crate::auth::{AdminUser, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reviews/{product_id}", get(list).post(upsert))
        .route("/api/reviews/{product_id}/{review_id}", delete(remove))
}

/// GET /api/reviews/{product_id}
pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<ApiResponse<ProductReviews>> {
    Ok(ApiResponse::success(state.reviews.list(&product_id).await?))
}

/// POST /api/reviews/{product_id} — 新增或覆盖自己的评论
pub async fn upsert(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<(StatusCode, ApiResponse<Product>)> {
    let product = state.reviews.upsert(&user, &product_id, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(product)))
}

/// DELETE /api/reviews/{product_id}/{review_id} (admin)
pub async fn remove(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((product_id, review_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<Product>> {
    Ok(ApiResponse::success(
        state.reviews.delete(&product_id, &review_id).await?,
    ))
}
