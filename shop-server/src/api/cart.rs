//! Cart API (当前用户的购物车)

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use shared::error::{ApiResponse, AppResult};
use shared::models::{AddCartItem, CartView, UpdateCartItem};

use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/cart",
            get(get_cart).post(add_item).put(update_item).delete(clear),
        )
        .route("/api/cart/item/{product_id}", delete(remove_item))
}

/// GET /api/cart
pub async fn get_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<CartView>> {
    Ok(ApiResponse::success(state.carts.view(&user.id).await?))
}

/// POST /api/cart
pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<AddCartItem>,
) -> AppResult<ApiResponse<CartView>> {
    Ok(ApiResponse::success(state.carts.add(&user.id, input).await?))
}

/// PUT /api/cart
pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateCartItem>,
) -> AppResult<ApiResponse<CartView>> {
    Ok(ApiResponse::success(state.carts.update(&user.id, input).await?))
}

/// DELETE /api/cart/item/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> AppResult<ApiResponse<CartView>> {
    Ok(ApiResponse::success(
        state.carts.remove(&user.id, &product_id).await?,
    ))
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<CartView>> {
    Ok(ApiResponse::success(state.carts.clear(&user.id).await?))
}
