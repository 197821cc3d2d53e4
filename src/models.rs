// Data models shared across the exchange: identifiers, pagination and API payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type Timestamp = DateTime<Utc>;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Registered marketplace user
    UserId
);
id_type!(
    /// Listed garment
    ItemId
);
id_type!(
    /// Item-for-item swap proposal
    SwapId
);
id_type!(
    /// Legacy per-item swap request
    RequestId
);
id_type!(NotificationId);

// ============================================================================
// PAGINATION
// ============================================================================

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Raw `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn resolve(self, default_limit: usize) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// A validated 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE }
    }
}

impl Page {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub current: usize,
    pub pages: usize,
    pub total: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Slice an already ordered result set into one page
pub fn paginate<T>(all: Vec<T>, page: Page) -> Paginated<T> {
    let total = all.len();
    let items = all.into_iter().skip(page.offset()).take(page.limit).collect();
    Paginated {
        items,
        pagination: Pagination {
            current: page.page,
            pages: total.div_ceil(page.limit),
            total,
            limit: page.limit,
        },
    }
}

/// Sort direction used by listing endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

// ============================================================================
// REQUEST PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    pub offered_item_id: ItemId,
    pub requested_item_id: ItemId,
    #[serde(default)]
    pub message: Option<String>,
}

/// Actions a recipient may take on a pending swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapAction {
    Accept,
    Reject,
    Counter,
}

/// Actions an initiator may take on an outstanding counter-offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterAction {
    Accept,
    Reject,
}

/// Actions an owner may take on a legacy request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterOfferInput {
    pub point_difference: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToSwapRequest {
    pub action: SwapAction,
    #[serde(default)]
    pub counter_offer: Option<CounterOfferInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespondToCounterRequest {
    pub action: CounterAction,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyRequestBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRespondRequest {
    pub action: LegacyAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustPointsRequest {
    /// Positive credits a reward, negative revokes points
    pub delta: i64,
    pub reason: String,
}
