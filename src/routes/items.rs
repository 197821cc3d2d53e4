// Item listing routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::{lock_state, SharedState};
use crate::auth::{AuthUser, UserProfile};
use crate::handlers::{created, respond, ApiResult};
use crate::items::{BrowseQuery, ItemStatus, ItemUpdate, NewItem};
use crate::models::{ItemId, PageQuery};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(browse_items).post(create_item))
        .route("/my-items", get(my_items))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/like", post(toggle_like))
}

#[derive(Debug, Default, Deserialize)]
pub struct MyItemsQuery {
    pub status: Option<ItemStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /api/items
pub async fn browse_items(
    State(state): State<SharedState>,
    query: Result<Query<BrowseQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let app = lock_state(&state)?;
    let page = app.market.catalog.browse(&query)?;
    Ok(respond("Items loaded", page))
}

/// POST /api/items
pub async fn create_item(
    State(state): State<SharedState>,
    user: AuthUser,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = payload?;
    let mut app = lock_state(&state)?;
    let (item, notices) = app.market.list_item(user.id, new)?.into_parts();
    app.deliver(notices);
    Ok(created("Item listed successfully", item))
}

/// GET /api/items/my-items
pub async fn my_items(
    State(state): State<SharedState>,
    user: AuthUser,
    query: Result<Query<MyItemsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let app = lock_state(&state)?;
    let page = PageQuery { page: query.page, limit: query.limit };
    Ok(respond("Items loaded", app.market.catalog.owned_by(user.id, query.status, page)))
}

/// GET /api/items/:id (counts a view)
pub async fn get_item(State(state): State<SharedState>, Path(id): Path<ItemId>) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let item = app.market.catalog.record_view(id)?.clone();
    let owner = app.users.get(item.owner).ok().map(UserProfile::from);
    let pending_swap = app.market.swaps.claim_holder(id);

    Ok(respond(
        "Item loaded",
        json!({
            "item": item,
            "owner": owner,
            "likeCount": item.like_count(),
            "pendingSwap": pending_swap,
        }),
    ))
}

/// PUT /api/items/:id
pub async fn update_item(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<ItemId>,
    payload: Result<Json<ItemUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(update) = payload?;
    let mut app = lock_state(&state)?;
    let item = app.market.update_item(user.id, user.is_admin, id, update)?;
    Ok(respond("Item updated successfully", item))
}

/// DELETE /api/items/:id
pub async fn delete_item(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<ItemId>,
) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let (item, notices) = app.market.delete_item(user.id, user.is_admin, id)?.into_parts();
    app.deliver(notices);
    Ok(respond("Item deleted successfully", json!({ "id": item.id })))
}

/// POST /api/items/:id/like
pub async fn toggle_like(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<ItemId>,
) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let (liked, notices) = app.market.toggle_like(user.id, id)?.into_parts();
    let likes = app.market.catalog.get(id)?.like_count();
    app.deliver(notices);
    Ok(respond(
        if liked { "Item liked" } else { "Item unliked" },
        json!({ "liked": liked, "likeCount": likes }),
    ))
}
