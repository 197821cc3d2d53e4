// Authentication routes
// Register and login hand back a bearer token for the Authorization header

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::info;

use crate::app_state::{lock_state, SharedState};
use crate::auth::{AuthUser, ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest, UserProfile};
use crate::handlers::{created, respond, ApiResult};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/change-password", put(change_password))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (user, token) = app.register_user(req)?;
    let points = app.market.ledger.balance(user.id)?;

    Ok(created(
        "User registered successfully",
        json!({ "token": token, "user": UserProfile::from(&user), "points": points }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    let (user, token) = app.users.login(&req)?;
    info!(user = %user.id, "user logged in");

    Ok(respond("Login successful", json!({ "token": token, "user": UserProfile::from(&user) })))
}

/// GET /api/auth/me
pub async fn me(State(state): State<SharedState>, user: AuthUser) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    let profile = UserProfile::from(app.users.get(user.id)?);
    let account = app.market.ledger.account(user.id);

    Ok(respond(
        "Profile loaded",
        json!({
            "user": profile,
            "points": account.map(|a| a.balance).unwrap_or(0),
            "stats": account.map(|a| a.stats),
        }),
    ))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<SharedState>,
    user: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(update) = payload?;
    let mut app = lock_state(&state)?;
    let profile = app.users.update_profile(user.id, update)?;

    Ok(respond("Profile updated successfully", json!({ "user": profile })))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<SharedState>,
    user: AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let mut app = lock_state(&state)?;
    app.users.change_password(user.id, &req)?;

    Ok(respond("Password changed successfully", json!({})))
}
