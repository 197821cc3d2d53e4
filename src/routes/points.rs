// Points balance and journal for the caller

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde_json::json;

use crate::app_state::{lock_state, SharedState};
use crate::auth::AuthUser;
use crate::error::ExchangeError;
use crate::handlers::{respond, ApiResult};

const RECENT_ENTRIES: usize = 20;

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(my_points))
}

/// GET /api/points
pub async fn my_points(State(state): State<SharedState>, user: AuthUser) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    let account = app
        .market
        .ledger
        .account(user.id)
        .ok_or_else(|| ExchangeError::not_found("account", user.id))?;
    let entries = app.market.ledger.entries_for(user.id, RECENT_ENTRIES);

    Ok(respond(
        "Points loaded",
        json!({
            "balance": account.balance,
            "stats": account.stats,
            "entries": entries,
        }),
    ))
}
