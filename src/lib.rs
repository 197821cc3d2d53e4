/// ReWear Exchange - peer-to-peer clothing swap marketplace
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod items;
pub mod ledger;
pub mod legacy;
pub mod marketplace;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod swaps;

pub use app_state::{AppState, SharedState};
pub use config::AppConfig;
pub use error::{ExchangeError, ExchangeResult, Party};
pub use items::{point_value, Category, Condition, Item, ItemCatalog, ItemStatus, NewItem};
pub use ledger::{Account, Ledger, LedgerEntry, LedgerError, TransferReceipt};
pub use legacy::{LegacyBook, LegacyRequest, RequestStatus};
pub use marketplace::{MarketRules, Marketplace, Outcome};
pub use notifications::{dispatch, Inbox, Notice, NotificationKind, NotificationSink};
pub use routes::build_router;
pub use swaps::{point_difference, CounterOffer, Swap, SwapBook, SwapStatus};
