// Swap routes: proposals, counter-offers, legacy requests and redemption
//
// `:id` is a swap id on the proposal routes and an item id on the legacy
// and redeem routes; both sit at the same path position.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::app_state::{lock_state, AppState, SharedState};
use crate::auth::AuthUser;
use crate::error::ExchangeError;
use crate::handlers::{created, respond, ApiResult};
use crate::items::Item;
use crate::models::{
    CreateSwapRequest, ItemId, LegacyRequestBody, LegacyRespondRequest, PageQuery, RequestId,
    RespondToCounterRequest, RespondToSwapRequest, SwapId,
};
use crate::swaps::{Swap, SwapStatus};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/create", post(create_swap))
        .route("/pending", get(pending_swaps))
        .route("/history", get(swap_history))
        .route("/:id", get(get_swap))
        .route("/:id/respond", put(respond_to_swap))
        .route("/:id/counter-response", put(respond_to_counter))
        .route("/:id/request", post(request_legacy_swap))
        .route("/:id/respond/:request_id", put(respond_to_legacy_swap))
        .route("/:id/redeem", post(redeem_with_points))
}

/// A swap with both items resolved for display
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapView {
    #[serde(flatten)]
    pub swap: Swap,
    pub offered: Option<Item>,
    pub requested: Option<Item>,
}

fn view(app: &AppState, swap: Swap) -> SwapView {
    SwapView {
        offered: app.market.catalog.get(swap.offered_item).ok().cloned(),
        requested: app.market.catalog.get(swap.requested_item).ok().cloned(),
        swap,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<SwapStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// POST /api/swaps/create
pub async fn create_swap(
    State(state): State<SharedState>,
    user: AuthUser,
    payload: Result<Json<CreateSwapRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (swap, notices) = app.market.create_swap(user.id, req)?.into_parts();
    app.deliver(notices);
    Ok(created("Swap request created successfully", view(&app, swap)))
}

/// PUT /api/swaps/:id/respond
pub async fn respond_to_swap(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<SwapId>,
    payload: Result<Json<RespondToSwapRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (swap, notices) = app.market.respond(user.id, id, req.action, req.counter_offer)?.into_parts();
    app.deliver(notices);

    let message = match (swap.status, swap.counter_offer.is_some()) {
        (SwapStatus::Completed, _) => "Swap accepted and completed",
        (SwapStatus::Rejected, _) => "Swap rejected",
        (_, true) => "Counter-offer sent",
        _ => "Swap updated",
    };
    Ok(respond(message, view(&app, swap)))
}

/// PUT /api/swaps/:id/counter-response
pub async fn respond_to_counter(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<SwapId>,
    payload: Result<Json<RespondToCounterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (swap, notices) = app.market.respond_to_counter(user.id, id, req.action)?.into_parts();
    app.deliver(notices);

    let message = if swap.status == SwapStatus::Completed {
        "Counter-offer accepted and swap completed"
    } else {
        "Counter-offer rejected"
    };
    Ok(respond(message, view(&app, swap)))
}

/// GET /api/swaps/pending
pub async fn pending_swaps(State(state): State<SharedState>, user: AuthUser) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    let swaps: Vec<SwapView> = app
        .market
        .swaps
        .pending_for_user(user.id)
        .into_iter()
        .map(|s| view(&app, s))
        .collect();
    Ok(respond("Pending swaps loaded", swaps))
}

/// GET /api/swaps/history?status=&page=&limit=
pub async fn swap_history(
    State(state): State<SharedState>,
    user: AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let app = lock_state(&state)?;
    let page = app
        .market
        .swaps
        .history(user.id, query.status, PageQuery { page: query.page, limit: query.limit });
    Ok(respond("Swap history loaded", page))
}

/// GET /api/swaps/:id (parties only)
pub async fn get_swap(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<SwapId>,
) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    let swap = app.market.swaps.get(id)?.clone();
    if !swap.involves(user.id) && !user.is_admin {
        return Err(ExchangeError::unauthorized("only the swap parties can view this swap").into());
    }
    Ok(respond("Swap loaded", view(&app, swap)))
}

/// POST /api/swaps/:id/request (legacy, `:id` is the item)
pub async fn request_legacy_swap(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(item): Path<ItemId>,
    payload: Result<Json<LegacyRequestBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = payload?;
    let mut app = lock_state(&state)?;
    let (request, notices) = app.market.request_legacy(user.id, item, body.message)?.into_parts();
    app.deliver(notices);
    Ok(created("Swap request sent successfully", request))
}

/// PUT /api/swaps/:id/respond/:request_id (legacy, `:id` is the item)
pub async fn respond_to_legacy_swap(
    State(state): State<SharedState>,
    user: AuthUser,
    Path((item, request_id)): Path<(ItemId, RequestId)>,
    payload: Result<Json<LegacyRespondRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (request, notices) = app.market.respond_legacy(user.id, item, request_id, req.action)?.into_parts();
    app.deliver(notices);
    Ok(respond("Swap request updated", request))
}

/// POST /api/swaps/:id/redeem (`:id` is the item)
pub async fn redeem_with_points(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(item): Path<ItemId>,
) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let (redemption, notices) = app.market.redeem_with_points(user.id, item)?.into_parts();
    app.deliver(notices);
    Ok(respond("Item redeemed successfully", redemption))
}
