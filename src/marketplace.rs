// ============================================================================
// Marketplace - the transactional unit of the exchange
// ============================================================================
//
// Owns the ledger, the item catalog, the swap book and the legacy request
// book. Every exchange operation is a method on `Marketplace` taking
// `&mut self`, so a caller holding the state lock runs it as one
// serializable check-then-write.
//
// Operations that touch several records capture a `Savepoint` first and
// roll back to it on any error: either every effect lands or none does.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExchangeError, ExchangeResult, Party};
use crate::items::{Item, ItemCatalog, ItemStatus, ItemStatusCounts, ItemUpdate, NewItem};
use crate::legacy::{LegacyBook, LegacyRequest};
use crate::ledger::{Account, BalanceChange, Ledger};
use crate::models::{ItemId, SwapId, UserId};
use crate::notifications::{Notice, NotificationKind};
use crate::swaps::{Swap, SwapBook, SwapStatus, SwapStatusCounts};

// ============================================================================
// RULES & OUTCOMES
// ============================================================================

/// Point amounts granted outside of settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketRules {
    pub starting_points: u64,
    pub listing_reward: u64,
    /// Credited to both parties when a legacy request is accepted
    pub swap_reward: u64,
}

impl Default for MarketRules {
    fn default() -> Self {
        Self { starting_points: 100, listing_reward: 10, swap_reward: 20 }
    }
}

/// Result of an operation plus the notices it produced
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notices: Vec<Notice>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self { value, notices: Vec::new() }
    }

    pub fn with_notices(value: T, notices: Vec<Notice>) -> Self {
        Self { value, notices }
    }

    pub fn notify(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    pub fn into_parts(self) -> (T, Vec<Notice>) {
        (self.value, self.notices)
    }
}

/// Copies of every record a multi-step operation may touch
#[derive(Debug)]
pub(crate) struct Savepoint {
    accounts: Vec<Account>,
    items: Vec<Item>,
    swaps: Vec<Swap>,
    requests: Vec<LegacyRequest>,
    journal_len: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub items: ItemStatusCounts,
    pub swaps: SwapStatusCounts,
    pub accounts: usize,
    pub points_in_circulation: u64,
}

// ============================================================================
// MARKETPLACE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Marketplace {
    #[serde(skip)]
    pub rules: MarketRules,
    pub ledger: Ledger,
    pub catalog: ItemCatalog,
    pub swaps: SwapBook,
    pub legacy: LegacyBook,
}

impl Marketplace {
    pub fn new(rules: MarketRules) -> Self {
        Self { rules, ..Default::default() }
    }

    /// Restore derived indexes after deserializing a snapshot
    pub fn rebuild_indexes(&mut self) {
        self.swaps.rebuild_index();
        self.legacy.rebuild_index();
    }

    pub fn open_account(&mut self, user: UserId) -> ExchangeResult<BalanceChange> {
        Ok(self.ledger.open_account(user, self.rules.starting_points, "starting balance")?)
    }

    // ===== TRANSACTIONS =====

    pub(crate) fn savepoint(&self, users: &[UserId], items: &[ItemId], swaps: &[SwapId]) -> Savepoint {
        Savepoint {
            accounts: users.iter().filter_map(|u| self.ledger.account(*u).cloned()).collect(),
            items: items.iter().filter_map(|i| self.catalog.get(*i).ok().cloned()).collect(),
            swaps: swaps.iter().filter_map(|s| self.swaps.get(*s).ok().cloned()).collect(),
            requests: items.iter().flat_map(|i| self.legacy.for_item(*i)).cloned().collect(),
            journal_len: self.ledger.journal_len(),
        }
    }

    pub(crate) fn rollback(&mut self, savepoint: Savepoint) {
        self.ledger.restore(savepoint.accounts, savepoint.journal_len);
        for item in savepoint.items {
            self.catalog.restore(item);
        }
        for swap in savepoint.swaps {
            self.swaps.restore(swap);
        }
        for request in savepoint.requests {
            self.legacy.restore(request);
        }
    }

    /// Run `f`; on error put every captured record back
    pub(crate) fn atomically<T>(
        &mut self,
        savepoint: Savepoint,
        f: impl FnOnce(&mut Self) -> ExchangeResult<T>,
    ) -> ExchangeResult<T> {
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.rollback(savepoint);
                Err(e)
            }
        }
    }

    /// Fail unless the paying side of `point_difference` can cover it
    pub(crate) fn check_funds(&self, initiator: UserId, recipient: UserId, point_difference: i64) -> ExchangeResult<()> {
        let (payer, party) = if point_difference > 0 {
            (initiator, Party::Initiator)
        } else if point_difference < 0 {
            (recipient, Party::Recipient)
        } else {
            return Ok(());
        };
        self.ledger
            .require(payer, point_difference.unsigned_abs())
            .map_err(|e| e.for_party(party))
    }

    /// Cancel the pending swap and reject pending legacy requests touching
    /// an item that is leaving the market
    pub(crate) fn withdraw_claims(&mut self, item: ItemId, reason: &str) -> ExchangeResult<Vec<Notice>> {
        let mut notices = Vec::new();

        if let Some(swap_id) = self.swaps.claim_holder(item) {
            let swap = self.swaps.modify(swap_id, |s| {
                s.status = SwapStatus::Cancelled;
                s.counter_offer = None;
                s.cancellation_reason = Some(reason.to_string());
                s.clone()
            })?;
            info!(swap = %swap_id, %item, reason, "pending swap cancelled");
            for user in [swap.initiator, swap.recipient] {
                notices.push(
                    Notice::new(
                        user,
                        NotificationKind::SwapCancelled,
                        "Swap cancelled",
                        format!("A swap you were part of was cancelled: {}", reason),
                    )
                    .about_swap(swap_id)
                    .about_item(item),
                );
            }
        }

        for requester in self.legacy.reject_pending(item, None) {
            notices.push(
                Notice::new(
                    requester,
                    NotificationKind::SwapRejected,
                    "Swap request closed",
                    format!("Your swap request was closed: {}", reason),
                )
                .about_item(item),
            );
        }
        Ok(notices)
    }

    // ===== ITEM LIFECYCLE =====

    /// List a new item and credit the listing reward
    pub fn list_item(&mut self, owner: UserId, new: NewItem) -> ExchangeResult<Outcome<Item>> {
        new.validate()?;
        self.ledger.balance(owner)?;

        let item = new.into_item(owner);
        let id = self.catalog.insert(item);
        self.ledger.record_listing(owner)?;
        let reward = self.rules.listing_reward;
        if reward > 0 {
            self.ledger.reward(owner, reward, "item listed")?;
        }

        let item = self.catalog.get(id)?.clone();
        info!(item = %id, %owner, point_value = item.point_value, "item listed");
        let notice = Notice::new(
            owner,
            NotificationKind::System,
            "Item listed",
            format!("'{}' is live and worth {} points. You earned {} points.", item.title, item.point_value, reward),
        )
        .about_item(id);
        Ok(Outcome::new(item).notify(notice))
    }

    fn ensure_can_edit(&self, actor: UserId, is_admin: bool, item: ItemId) -> ExchangeResult<&Item> {
        let found = self.catalog.get(item)?;
        if !is_admin && !found.is_owned_by(actor) {
            return Err(ExchangeError::unauthorized("only the owner can change this item"));
        }
        if found.status == ItemStatus::Swapped {
            return Err(ExchangeError::conflict("swapped items cannot be changed"));
        }
        Ok(found)
    }

    pub fn update_item(&mut self, actor: UserId, is_admin: bool, id: ItemId, update: ItemUpdate) -> ExchangeResult<Item> {
        self.ensure_can_edit(actor, is_admin, id)?;
        let item = self.catalog.update(id, update)?.clone();
        info!(item = %id, %actor, "item updated");
        Ok(item)
    }

    pub fn delete_item(&mut self, actor: UserId, is_admin: bool, id: ItemId) -> ExchangeResult<Outcome<Item>> {
        self.ensure_can_edit(actor, is_admin, id)?;
        let notices = self.withdraw_claims(id, "the item was deleted")?;
        let item = self.catalog.delete(id)?;
        info!(item = %id, %actor, "item deleted");
        Ok(Outcome::with_notices(item, notices))
    }

    /// Admin takedown. `available|pending -> removed`.
    pub fn remove_item(&mut self, id: ItemId, reason: &str) -> ExchangeResult<Outcome<Item>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ExchangeError::validation("a removal reason is required"));
        }
        self.catalog.mark_removed(id, reason)?;
        let mut notices = self.withdraw_claims(id, "the item was removed by a moderator")?;

        let item = self.catalog.get(id)?.clone();
        notices.push(
            Notice::new(
                item.owner,
                NotificationKind::ItemRemoved,
                "Item removed",
                format!("'{}' was removed: {}", item.title, reason),
            )
            .about_item(id),
        );
        Ok(Outcome::with_notices(item, notices))
    }

    pub fn toggle_like(&mut self, user: UserId, id: ItemId) -> ExchangeResult<Outcome<bool>> {
        let liked = self.catalog.toggle_like(id, user)?;
        let item = self.catalog.get(id)?;
        let mut outcome = Outcome::new(liked);
        if liked && item.owner != user {
            outcome = outcome.notify(
                Notice::new(
                    item.owner,
                    NotificationKind::ItemLiked,
                    "Someone liked your item",
                    format!("'{}' has a new like", item.title),
                )
                .from_user(user)
                .about_item(id),
            );
        }
        Ok(outcome)
    }

    // ===== POINTS =====

    /// Admin credit (positive delta) or reversal (negative delta)
    pub fn adjust_points(&mut self, user: UserId, delta: i64, reason: &str) -> ExchangeResult<Outcome<BalanceChange>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ExchangeError::validation("a reason is required"));
        }
        if delta == 0 {
            return Err(ExchangeError::validation("delta must be non-zero"));
        }

        if delta > 0 {
            let change = self.ledger.reward(user, delta as u64, reason)?;
            let notice = Notice::new(
                user,
                NotificationKind::PointsEarned,
                "Points added",
                format!("You received {} points: {}", delta, reason),
            );
            Ok(Outcome::new(change).notify(notice))
        } else {
            let change = self.ledger.revoke(user, delta.unsigned_abs(), reason)?;
            let notice = Notice::new(
                user,
                NotificationKind::System,
                "Points adjusted",
                format!("{} points were removed: {}", delta.unsigned_abs(), reason),
            );
            Ok(Outcome::new(change).notify(notice))
        }
    }

    pub fn stats(&self) -> MarketStats {
        let ledger = self.ledger.stats();
        MarketStats {
            items: self.catalog.count_by_status(),
            swaps: self.swaps.count_by_status(),
            accounts: ledger.accounts,
            points_in_circulation: ledger.points_in_circulation,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::items::{Category, Condition};

    /// Rules with no listing reward so balances in tests are exactly what they set
    pub(crate) fn quiet_rules() -> MarketRules {
        MarketRules { starting_points: 0, listing_reward: 0, swap_reward: 20 }
    }

    pub(crate) fn user_with(market: &mut Marketplace, points: u64) -> UserId {
        let user = UserId::new();
        market.open_account(user).unwrap();
        if points > 0 {
            market.ledger.reward(user, points, "test funds").unwrap();
        }
        user
    }

    pub(crate) fn listed(market: &mut Marketplace, owner: UserId, condition: Condition, category: Category) -> ItemId {
        let new = crate::items::tests::sample(condition, category);
        market.list_item(owner, new).unwrap().value.id
    }

    #[test]
    fn test_list_item_rewards_owner() {
        let mut market = Marketplace::new(MarketRules::default());
        let owner = UserId::new();
        market.open_account(owner).unwrap();

        let outcome = market
            .list_item(owner, crate::items::tests::sample(Condition::Good, Category::Tops))
            .unwrap();
        assert_eq!(outcome.value.point_value, 55);
        assert_eq!(outcome.notices.len(), 1);

        let account = market.ledger.account(owner).unwrap();
        assert_eq!(account.balance, 110);
        assert_eq!(account.stats.items_listed, 1);
    }

    #[test]
    fn test_list_item_requires_account() {
        let mut market = Marketplace::new(quiet_rules());
        let err = market
            .list_item(UserId::new(), crate::items::tests::sample(Condition::Good, Category::Tops))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound { entity: "account", .. }));
        assert!(market.catalog.is_empty());
    }

    #[test]
    fn test_only_owner_or_admin_edits() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let other = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);

        let update = ItemUpdate { title: Some("Renamed".into()), ..Default::default() };
        assert!(matches!(
            market.update_item(other, false, item, update.clone()),
            Err(ExchangeError::Unauthorized(_))
        ));
        assert_eq!(market.update_item(other, true, item, update).unwrap().title, "Renamed");

        assert!(market.delete_item(other, false, item).is_err());
        market.delete_item(owner, false, item).unwrap();
        assert!(market.catalog.get(item).is_err());
    }

    #[test]
    fn test_removal_requires_reason_and_notifies_owner() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);

        assert!(matches!(market.remove_item(item, "  "), Err(ExchangeError::Validation(_))));
        let outcome = market.remove_item(item, "prohibited").unwrap();
        assert_eq!(outcome.value.status, ItemStatus::Removed);
        assert!(outcome.notices.iter().any(|n| n.kind == NotificationKind::ItemRemoved && n.recipient == owner));
    }

    #[test]
    fn test_like_notifies_owner_once() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let fan = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);

        let outcome = market.toggle_like(fan, item).unwrap();
        assert!(outcome.value);
        assert_eq!(outcome.notices.len(), 1);

        let outcome = market.toggle_like(fan, item).unwrap();
        assert!(!outcome.value);
        assert!(outcome.notices.is_empty());

        assert!(market.toggle_like(owner, item).unwrap().notices.is_empty());
    }

    #[test]
    fn test_adjust_points() {
        let mut market = Marketplace::new(quiet_rules());
        let user = user_with(&mut market, 15);

        assert_eq!(market.adjust_points(user, 5, "bonus").unwrap().value.after, 20);
        let err = market.adjust_points(user, -25, "reversal").unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { required: 25, available: 20, .. }));
        assert_eq!(market.adjust_points(user, -20, "reversal").unwrap().value.after, 0);
        assert!(market.adjust_points(user, 0, "noop").is_err());
    }

    #[test]
    fn test_adjust_points_cannot_overflow_balance() {
        let mut market = Marketplace::new(quiet_rules());
        let user = user_with(&mut market, 0);

        market.adjust_points(user, i64::MAX, "grant").unwrap();
        market.adjust_points(user, i64::MAX, "grant").unwrap();
        let err = market.adjust_points(user, i64::MAX, "grant").unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert_eq!(market.ledger.balance(user).unwrap(), u64::MAX - 1);
        assert_eq!(market.stats().points_in_circulation, u64::MAX - 1);
    }
}
