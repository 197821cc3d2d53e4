// ============================================================================
// Swap Proposals - ReWear Exchange
// ============================================================================
//
// A swap is a proposal between an initiator (offering one of their items)
// and a recipient (owner of the requested item), balanced by a signed
// point difference:
//
//   pointDifference = requested.pointValue - offered.pointValue
//     > 0  initiator pays recipient
//     < 0  recipient pays initiator
//     = 0  no points move
//
// State machine:
//
//   pending ──accept──▶ accepted ──settle──▶ completed
//      │ ──reject──▶ rejected
//      │ ──counter──▶ pending (+counterOffer) ──accept/reject──▶ …
//      └──item withdrawn──▶ cancelled
//
// The SwapBook holds every proposal plus a claim index: each item may be
// referenced by at most one pending swap, offered or requested. A second
// claim is refused at insert time.
//
// ============================================================================

pub mod negotiation;
pub mod settlement;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{paginate, ItemId, PageQuery, Paginated, SwapId, Timestamp, UserId, DEFAULT_PAGE_SIZE};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    /// Awaiting a response from the recipient or, if countered, the initiator
    Pending,
    /// Agreed; settlement in progress
    Accepted,
    /// Declined at either negotiation stage
    Rejected,
    /// Settled: items and points exchanged
    Completed,
    /// Withdrawn because one of the items left the market
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Rejected => "rejected",
            SwapStatus::Completed => "completed",
            SwapStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Completed | SwapStatus::Rejected | SwapStatus::Cancelled)
    }
}

/// Signed point gap between two items, from the initiator's side
pub fn point_difference(offered_value: u64, requested_value: u64) -> i64 {
    requested_value as i64 - offered_value as i64
}

// ============================================================================
// SWAP
// ============================================================================

/// Recipient's single allowed revision of the point difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterOffer {
    pub point_difference: i64,
    pub message: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    pub id: SwapId,
    pub initiator: UserId,
    pub recipient: UserId,
    pub offered_item: ItemId,
    pub requested_item: ItemId,
    pub point_difference: i64,
    pub status: SwapStatus,
    pub message: Option<String>,
    pub counter_offer: Option<CounterOffer>,
    pub initiated_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub updated_at: Timestamp,
}

impl Swap {
    pub fn new(
        initiator: UserId,
        recipient: UserId,
        offered_item: ItemId,
        requested_item: ItemId,
        point_difference: i64,
        message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SwapId::new(),
            initiator,
            recipient,
            offered_item,
            requested_item,
            point_difference,
            status: SwapStatus::Pending,
            message,
            counter_offer: None,
            initiated_at: now,
            responded_at: None,
            completed_at: None,
            cancellation_reason: None,
            updated_at: now,
        }
    }

    pub fn items(&self) -> [ItemId; 2] {
        [self.offered_item, self.requested_item]
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.initiator == user || self.recipient == user
    }

    pub fn references(&self, item: ItemId) -> bool {
        self.offered_item == item || self.requested_item == item
    }

    /// The other party from `user`'s point of view
    pub fn counterparty(&self, user: UserId) -> UserId {
        if self.initiator == user {
            self.recipient
        } else {
            self.initiator
        }
    }

    /// Set `respondedAt` on the first response only
    pub(crate) fn mark_responded(&mut self) {
        if self.responded_at.is_none() {
            self.responded_at = Some(Utc::now());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwapStatusCounts {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub completed: usize,
    pub cancelled: usize,
}

// ============================================================================
// SWAP BOOK
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapBook {
    swaps: HashMap<SwapId, Swap>,
    /// item -> the one pending swap that references it
    #[serde(skip)]
    pending_by_item: HashMap<ItemId, SwapId>,
}

impl SwapBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    pub fn get(&self, id: SwapId) -> ExchangeResult<&Swap> {
        self.swaps.get(&id).ok_or_else(|| ExchangeError::not_found("swap", id))
    }

    /// The pending swap currently holding a claim on `item`
    pub fn claim_holder(&self, item: ItemId) -> Option<SwapId> {
        self.pending_by_item.get(&item).copied()
    }

    /// Store a new pending swap, claiming both of its items.
    ///
    /// Fails with `Conflict` if either item is already claimed by another
    /// pending swap; nothing is written in that case.
    pub(crate) fn insert_pending(&mut self, swap: Swap) -> ExchangeResult<SwapId> {
        if swap.status != SwapStatus::Pending {
            return Err(ExchangeError::conflict("only pending swaps can be inserted"));
        }
        for item in swap.items() {
            if let Some(holder) = self.claim_holder(item) {
                return Err(ExchangeError::conflict(format!(
                    "item {} already has a pending swap ({})",
                    item, holder
                )));
            }
        }

        let id = swap.id;
        for item in swap.items() {
            self.pending_by_item.insert(item, id);
        }
        self.swaps.insert(id, swap);
        debug!(swap = %id, "swap stored, items claimed");
        Ok(id)
    }

    /// Mutate a swap in place. Claims are released once it leaves `pending`.
    pub(crate) fn modify<R>(&mut self, id: SwapId, f: impl FnOnce(&mut Swap) -> R) -> ExchangeResult<R> {
        let swap = self.swaps.get_mut(&id).ok_or_else(|| ExchangeError::not_found("swap", id))?;
        let out = f(&mut *swap);
        swap.updated_at = Utc::now();

        if swap.status != SwapStatus::Pending {
            let items = swap.items();
            self.release(id, &items);
        }
        Ok(out)
    }

    /// Put a previously captured swap back, re-claiming its items if pending
    pub(crate) fn restore(&mut self, swap: Swap) {
        let id = swap.id;
        let items = swap.items();
        let pending = swap.status == SwapStatus::Pending;
        self.swaps.insert(id, swap);
        if pending {
            for item in items {
                self.pending_by_item.insert(item, id);
            }
        } else {
            self.release(id, &items);
        }
    }

    fn release(&mut self, id: SwapId, items: &[ItemId]) {
        for item in items {
            if self.pending_by_item.get(item) == Some(&id) {
                self.pending_by_item.remove(item);
            }
        }
    }

    /// Recreate the claim index after loading from a snapshot
    pub(crate) fn rebuild_index(&mut self) {
        self.pending_by_item = self
            .swaps
            .values()
            .filter(|s| s.status == SwapStatus::Pending)
            .flat_map(|s| s.items().into_iter().map(move |item| (item, s.id)))
            .collect();
    }

    /// Pending swaps where `user` is either party, newest first
    pub fn pending_for_user(&self, user: UserId) -> Vec<Swap> {
        let mut pending: Vec<Swap> = self
            .swaps
            .values()
            .filter(|s| s.status == SwapStatus::Pending && s.involves(user))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at));
        pending
    }

    /// Every swap involving `user`, optionally filtered by status, newest first
    pub fn history(&self, user: UserId, status: Option<SwapStatus>, page: PageQuery) -> Paginated<Swap> {
        let mut found: Vec<Swap> = self
            .swaps
            .values()
            .filter(|s| s.involves(user))
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at));
        paginate(found, page.resolve(DEFAULT_PAGE_SIZE))
    }

    pub fn count_by_status(&self) -> SwapStatusCounts {
        self.swaps.values().fold(SwapStatusCounts::default(), |mut acc, swap| {
            match swap.status {
                SwapStatus::Pending => acc.pending += 1,
                SwapStatus::Accepted => acc.accepted += 1,
                SwapStatus::Rejected => acc.rejected += 1,
                SwapStatus::Completed => acc.completed += 1,
                SwapStatus::Cancelled => acc.cancelled += 1,
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_swap(offered: ItemId, requested: ItemId) -> Swap {
        Swap::new(UserId::new(), UserId::new(), offered, requested, 0, None)
    }

    #[test]
    fn test_point_difference_is_antisymmetric() {
        for (a, b) in [(50u64, 80u64), (80, 50), (60, 60), (0, 90)] {
            assert_eq!(point_difference(a, b), -point_difference(b, a));
        }
        assert_eq!(point_difference(50, 80), 30);
    }

    #[test]
    fn test_claims_block_every_overlap() {
        let (x, y, z) = (ItemId::new(), ItemId::new(), ItemId::new());
        let mut book = SwapBook::new();
        book.insert_pending(pending_swap(x, y)).unwrap();

        // offered-as-offered, offered-as-requested, requested-as-offered, requested-as-requested
        for (o, r) in [(x, z), (z, x), (y, z), (z, y)] {
            assert!(matches!(
                book.insert_pending(pending_swap(o, r)),
                Err(ExchangeError::Conflict(_))
            ));
        }
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_leaving_pending_releases_claims() {
        let (x, y) = (ItemId::new(), ItemId::new());
        let mut book = SwapBook::new();
        let id = book.insert_pending(pending_swap(x, y)).unwrap();

        book.modify(id, |s| s.status = SwapStatus::Rejected).unwrap();
        assert_eq!(book.claim_holder(x), None);
        book.insert_pending(pending_swap(y, x)).unwrap();
    }

    #[test]
    fn test_restore_reclaims_items() {
        let (x, y) = (ItemId::new(), ItemId::new());
        let mut book = SwapBook::new();
        let id = book.insert_pending(pending_swap(x, y)).unwrap();
        let saved = book.get(id).unwrap().clone();

        book.modify(id, |s| s.status = SwapStatus::Accepted).unwrap();
        assert_eq!(book.claim_holder(y), None);

        book.restore(saved);
        assert_eq!(book.claim_holder(y), Some(id));
        assert_eq!(book.get(id).unwrap().status, SwapStatus::Pending);
    }

    #[test]
    fn test_rebuild_index_after_snapshot() {
        let (x, y) = (ItemId::new(), ItemId::new());
        let mut book = SwapBook::new();
        let id = book.insert_pending(pending_swap(x, y)).unwrap();

        let json = serde_json::to_string(&book).unwrap();
        let mut loaded: SwapBook = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.claim_holder(x), None);
        loaded.rebuild_index();
        assert_eq!(loaded.claim_holder(x), Some(id));
    }
}
