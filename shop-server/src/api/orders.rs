//! Order API

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use shared::error::{ApiResponse, AppResult};
use shared::models::{CreateOrderRequest, Order, OrderListQuery, UpdateOrderStatus};
use shared::response::Paginated;

use crate::auth::{AdminUser, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_all).post(create))
        .route("/api/orders/my", get(list_mine))
        .route("/api/orders/{id}", get(get_by_id))
        .route("/api/orders/{id}/status", put(update_status))
}

/// POST /api/orders — 从购物车下单
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, ApiResponse<Order>)> {
    let order = state.orders.place_order(&user, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(order)))
}

/// GET /api/orders/my
pub async fn list_mine(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Order>>> {
    Ok(ApiResponse::success(state.orders.my_orders(&user).await?))
}

/// GET /api/orders/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    Ok(ApiResponse::success(state.orders.get_order(&user, &id).await?))
}

/// GET /api/orders (admin)
pub async fn list_all(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<ApiResponse<Paginated<Order>>> {
    Ok(ApiResponse::success(state.orders.all_orders(query).await?))
}

/// PUT /api/orders/{id}/status (admin)
pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateOrderStatus>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.update_status(&id, body.status).await?;
    tracing::debug!(order_id = %id, admin_id = %admin.id, "Status change applied");
    Ok(ApiResponse::success(order))
}
