// HTTP plumbing shared by every route: error mapping, response envelope, health

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::app_state::{lock_state, SharedState};
use crate::auth::AuthError;
use crate::error::ExchangeError;
use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Body or query string failed to parse
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Exchange(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Exchange(e) => match e {
                ExchangeError::Validation(_) => StatusCode::BAD_REQUEST,
                ExchangeError::NotFound { .. } => StatusCode::NOT_FOUND,
                ExchangeError::Unauthorized(_) => StatusCode::FORBIDDEN,
                ExchangeError::Conflict(_) => StatusCode::CONFLICT,
                ExchangeError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ExchangeError::Settlement(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Auth(AuthError::AdminOnly) => StatusCode::FORBIDDEN,
            ApiError::Auth(AuthError::Hashing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Exchange(e) => e.kind(),
            ApiError::Auth(AuthError::AdminOnly) => "forbidden",
            ApiError::Auth(AuthError::Hashing(_)) => "internal",
            ApiError::Auth(_) => "unauthenticated",
            ApiError::BadRequest(_) => "validation",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let ApiError::Exchange(ExchangeError::InsufficientFunds { party, required, available, .. }) = &self {
            body["party"] = json!(party);
            body["required"] = json!(required);
            body["available"] = json!(available);
        }

        (status, Json(body)).into_response()
    }
}

/// `{ "success": true, "message": ..., "data": ... }`
pub fn respond<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}

pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, respond(message, data))
}

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let app = lock_state(&state)?;
    Ok(Json(json!({
        "success": true,
        "status": "ok",
        "service": "rewear-exchange",
        "users": app.users.len(),
        "items": app.market.catalog.len(),
        "swaps": app.market.swaps.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Party;
    use crate::models::UserId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ExchangeError::validation("x"), StatusCode::BAD_REQUEST),
            (ExchangeError::not_found("swap", "1"), StatusCode::NOT_FOUND),
            (ExchangeError::unauthorized("x"), StatusCode::FORBIDDEN),
            (ExchangeError::conflict("x"), StatusCode::CONFLICT),
            (ExchangeError::settlement("x"), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(ApiError::from(AuthError::MissingToken).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::AdminOnly).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(AuthError::Hashing("bad cost".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_funds_carries_detail() {
        let err = ApiError::from(ExchangeError::InsufficientFunds {
            party: Party::Initiator,
            user: UserId::new(),
            required: 30,
            available: 10,
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind(), "insufficient_funds");
    }
}
