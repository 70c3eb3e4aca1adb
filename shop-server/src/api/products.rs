//! Catalog API
//!
//! 列表 / 详情公开；增删改需要管理员。

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use shared::error::{ApiResponse, AppResult};
use shared::models::{Product, ProductCreate, ProductQuery, ProductUpdate};
use shared::response::Paginated;

use crate::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/{id}", get(get_by_id).put(update).delete(delete))
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<ApiResponse<Paginated<Product>>> {
    let page = state.catalog.list(query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/products/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Product>> {
    Ok(ApiResponse::success(state.catalog.get(&id).await?))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<ProductCreate>,
) -> AppResult<(StatusCode, ApiResponse<Product>)> {
    let product = state.catalog.create(&admin, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(product)))
}

/// PUT /api/products/{id}
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(patch): Json<ProductUpdate>,
) -> AppResult<ApiResponse<Product>> {
    Ok(ApiResponse::success(state.catalog.update(&id, patch).await?))
}

/// DELETE /api/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.catalog.delete(&id).await?;
    Ok(ApiResponse::ok())
}
