// Notification inbox routes; only the recipient can read or change a notification

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::{lock_state, SharedState};
use crate::auth::AuthUser;
use crate::handlers::{respond, ApiResult};
use crate::models::{NotificationId, PageQuery};

const NOTIFICATION_PAGE_SIZE: usize = 20;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/stats", get(notification_stats))
        .route("/mark-all-read", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(delete_notification))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<SharedState>,
    user: AuthUser,
    query: Result<Query<InboxQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let app = lock_state(&state)?;
    let page = PageQuery {
        page: query.page,
        limit: Some(query.limit.unwrap_or(NOTIFICATION_PAGE_SIZE)),
    };
    Ok(respond("Notifications loaded", app.inbox.list(user.id, query.unread_only, page)))
}

/// GET /api/notifications/stats
pub async fn notification_stats(State(state): State<SharedState>, user: AuthUser) -> ApiResult<impl IntoResponse> {
    let app = lock_state(&state)?;
    Ok(respond("Notification stats loaded", app.inbox.stats(user.id)))
}

/// PUT /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<NotificationId>,
) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let notification = app.inbox.mark_read(user.id, id)?;
    Ok(respond("Notification marked as read", notification))
}

/// PUT /api/notifications/mark-all-read
pub async fn mark_all_read(State(state): State<SharedState>, user: AuthUser) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    let marked = app.inbox.mark_all_read(user.id);
    Ok(respond("All notifications marked as read", json!({ "marked": marked })))
}

/// DELETE /api/notifications/:id
pub async fn delete_notification(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<NotificationId>,
) -> ApiResult<impl IntoResponse> {
    let mut app = lock_state(&state)?;
    app.inbox.delete(user.id, id)?;
    Ok(respond("Notification deleted", json!({ "id": id })))
}
