// Admin moderation routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::app_state::{lock_state, SharedState};
use crate::auth::AdminUser;
use crate::handlers::{respond, ApiResult};
use crate::models::{AdjustPointsRequest, ItemId, PageQuery, RemoveItemRequest, UserId};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/items/:id/reject", put(reject_item))
        .route("/users", get(list_users))
        .route("/users/:id/points", post(adjust_points))
        .route("/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// PUT /api/admin/items/:id/reject
pub async fn reject_item(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<ItemId>,
    payload: Result<Json<RemoveItemRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (item, notices) = app.market.remove_item(id, &req.reason)?.into_parts();
    app.deliver(notices);
    info!(admin = %admin.id, item = %id, "item rejected by admin");
    Ok(respond("Item removed", item))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<SharedState>,
    _admin: AdminUser,
    query: Result<Query<UserSearchQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let app = lock_state(&state)?;
    let page = app
        .users
        .list(query.search.as_deref(), PageQuery { page: query.page, limit: query.limit });
    Ok(respond("Users loaded", page))
}

/// POST /api/admin/users/:id/points
pub async fn adjust_points(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(user): Path<UserId>,
    payload: Result<Json<AdjustPointsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (change, notices) = app.market.adjust_points(user, req.delta, &req.reason)?.into_parts();
    app.deliver(notices);
    info!(admin = %admin.id, %user, delta = req.delta, "points adjusted");
    Ok(respond("Points adjusted", change))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<SharedState>, _admin: AdminUser) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    Ok(respond(
        "Stats loaded",
        json!({
            "users": app.users.len(),
            "market": app.market.stats(),
        }),
    ))
}
