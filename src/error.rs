// Error taxonomy for the exchange core

use serde::Serialize;
use thiserror::Error;

use crate::models::UserId;

/// Which side of an exchange came up short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// The user who proposed the swap
    Initiator,
    /// The owner of the requested item
    Recipient,
    /// A user buying an item outright with points
    Redeemer,
    /// A ledger operation with no exchange context
    Account,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Initiator => "initiator",
            Party::Recipient => "recipient",
            Party::Redeemer => "redeemer",
            Party::Account => "account",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Party::Initiator => "the swap initiator",
            Party::Recipient => "the item owner",
            Party::Redeemer => "the redeemer",
            Party::Account => "the account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Malformed or missing input, rejected before any state is read
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Wrong actor for the operation
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Item unavailable, duplicate pending swap, or unexpected swap status
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient points: {} needs {required} but has {available}", .party.describe())]
    InsufficientFunds {
        party: Party,
        user: UserId,
        required: u64,
        available: u64,
    },

    /// The final pre-transfer check failed; nothing was applied and the caller may retry
    #[error("settlement did not complete: {0}")]
    Settlement(String),
}

impl ExchangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn settlement(msg: impl Into<String>) -> Self {
        Self::Settlement(msg.into())
    }

    /// Stable machine-readable kind for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Validation(_) => "validation",
            ExchangeError::NotFound { .. } => "not_found",
            ExchangeError::Unauthorized(_) => "unauthorized",
            ExchangeError::Conflict(_) => "conflict",
            ExchangeError::InsufficientFunds { .. } => "insufficient_funds",
            ExchangeError::Settlement(_) => "settlement_failure",
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_names_the_party() {
        let initiator_short = ExchangeError::InsufficientFunds {
            party: Party::Initiator,
            user: UserId::new(),
            required: 30,
            available: 10,
        };
        assert_eq!(
            initiator_short.to_string(),
            "insufficient points: the swap initiator needs 30 but has 10"
        );

        let owner_short = ExchangeError::InsufficientFunds {
            party: Party::Recipient,
            user: UserId::new(),
            required: 5,
            available: 0,
        };
        assert!(owner_short.to_string().contains("the item owner"));
        assert_eq!(owner_short.kind(), "insufficient_funds");
    }
}
