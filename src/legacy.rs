// Legacy per-item swap requests
//
// The older protocol: a user asks for an item without offering anything in
// return, and the owner accepts one request or rejects it. No points change
// hands beyond the fixed swap reward, and there are no counter-offers.
//
// Requests live in their own book keyed by (item, requester). A user can
// ask for a given item once, whatever became of that request.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{ExchangeError, ExchangeResult};
use crate::items::ItemStatus;
use crate::marketplace::{Marketplace, Outcome};
use crate::models::{ItemId, LegacyAction, RequestId, Timestamp, UserId};
use crate::notifications::{Notice, NotificationKind};

pub const MAX_REQUEST_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRequest {
    pub id: RequestId,
    pub item: ItemId,
    pub requester: UserId,
    pub message: String,
    pub status: RequestStatus,
    pub requested_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyBook {
    requests: HashMap<RequestId, LegacyRequest>,
    #[serde(skip)]
    by_key: HashMap<(ItemId, UserId), RequestId>,
}

impl LegacyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RequestId) -> Option<&LegacyRequest> {
        self.requests.get(&id)
    }

    pub fn for_item(&self, item: ItemId) -> impl Iterator<Item = &LegacyRequest> {
        self.requests.values().filter(move |r| r.item == item)
    }

    fn insert(&mut self, request: LegacyRequest) -> ExchangeResult<RequestId> {
        let key = (request.item, request.requester);
        if self.by_key.contains_key(&key) {
            return Err(ExchangeError::conflict("you have already requested a swap for this item"));
        }
        let id = request.id;
        self.by_key.insert(key, id);
        self.requests.insert(id, request);
        Ok(id)
    }

    fn set_status(&mut self, id: RequestId, status: RequestStatus) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.status = status;
            request.responded_at = Some(Utc::now());
        }
    }

    /// Reject every pending request on `item` except `keep`; returns the requesters
    pub(crate) fn reject_pending(&mut self, item: ItemId, keep: Option<RequestId>) -> Vec<UserId> {
        let now = Utc::now();
        self.requests
            .values_mut()
            .filter(|r| r.item == item && r.status == RequestStatus::Pending && Some(r.id) != keep)
            .map(|r| {
                r.status = RequestStatus::Rejected;
                r.responded_at = Some(now);
                r.requester
            })
            .collect()
    }

    pub(crate) fn restore(&mut self, request: LegacyRequest) {
        self.by_key.insert((request.item, request.requester), request.id);
        self.requests.insert(request.id, request);
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.by_key = self
            .requests
            .values()
            .map(|r| ((r.item, r.requester), r.id))
            .collect();
    }
}

impl Marketplace {
    /// Attach a pending request to someone else's available item
    pub fn request_legacy(
        &mut self,
        requester: UserId,
        item_id: ItemId,
        message: Option<String>,
    ) -> ExchangeResult<Outcome<LegacyRequest>> {
        let message = message.unwrap_or_default();
        if message.chars().count() > MAX_REQUEST_MESSAGE_LEN {
            return Err(ExchangeError::validation(format!(
                "message cannot exceed {} characters",
                MAX_REQUEST_MESSAGE_LEN
            )));
        }

        let item = self.catalog.get(item_id)?;
        if item.status != ItemStatus::Available {
            return Err(ExchangeError::conflict("item is not available for swap"));
        }
        if item.is_owned_by(requester) {
            return Err(ExchangeError::validation("you cannot request a swap for your own item"));
        }
        let (owner, title) = (item.owner, item.title.clone());

        let request = LegacyRequest {
            id: RequestId::new(),
            item: item_id,
            requester,
            message,
            status: RequestStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
        };
        self.legacy.insert(request.clone())?;
        info!(request = %request.id, item = %item_id, %requester, "legacy swap requested");

        let notice = Notice::new(
            owner,
            NotificationKind::SwapRequest,
            "New swap request",
            format!("Someone wants to swap for your item \"{}\"", title),
        )
        .from_user(requester)
        .about_item(item_id);
        Ok(Outcome::new(request).notify(notice))
    }

    /// Owner accepts or rejects one request on their item.
    ///
    /// Accepting marks the item swapped, rewards both users, rejects every
    /// other pending request and cancels any pending swap on the item.
    pub fn respond_legacy(
        &mut self,
        owner: UserId,
        item_id: ItemId,
        request_id: RequestId,
        action: LegacyAction,
    ) -> ExchangeResult<Outcome<LegacyRequest>> {
        let item = self.catalog.get(item_id)?;
        if !item.is_owned_by(owner) {
            return Err(ExchangeError::unauthorized("only the item owner can respond to swap requests"));
        }
        let title = item.title.clone();
        let item_status = item.status;

        let request = self
            .legacy
            .get(request_id)
            .filter(|r| r.item == item_id)
            .ok_or_else(|| ExchangeError::not_found("swap request", request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(ExchangeError::conflict("swap request has already been responded to"));
        }
        let requester = request.requester;

        match action {
            LegacyAction::Reject => {
                self.legacy.set_status(request_id, RequestStatus::Rejected);
                info!(request = %request_id, item = %item_id, "legacy swap request rejected");
                let notice = Notice::new(
                    requester,
                    NotificationKind::SwapRejected,
                    "Swap request declined",
                    format!("Your swap request for \"{}\" was declined", title),
                )
                .from_user(owner)
                .about_item(item_id);
                Ok(Outcome::new(self.request_snapshot(request_id)?).notify(notice))
            }
            LegacyAction::Accept => {
                if item_status != ItemStatus::Available {
                    return Err(ExchangeError::conflict("item is no longer available"));
                }
                let swap_ids: Vec<_> = self.swaps.claim_holder(item_id).into_iter().collect();
                let savepoint = self.savepoint(&[owner, requester], &[item_id], &swap_ids);
                let reward = self.rules.swap_reward;

                let mut notices = self.atomically(savepoint, |market| {
                    market.legacy.set_status(request_id, RequestStatus::Accepted);
                    market.catalog.mark_swapped(&[item_id])?;
                    market.ledger.record_swap(&[owner, requester])?;
                    if reward > 0 {
                        market.ledger.reward(owner, reward, "swap completed")?;
                        market.ledger.reward(requester, reward, "swap completed")?;
                    }
                    market.withdraw_claims(item_id, "the item was swapped through a direct request")
                })?;
                info!(request = %request_id, item = %item_id, %owner, %requester, "legacy swap accepted");

                notices.push(
                    Notice::new(
                        requester,
                        NotificationKind::SwapAccepted,
                        "Swap request accepted!",
                        format!("Your swap request for \"{}\" was accepted", title),
                    )
                    .from_user(owner)
                    .about_item(item_id),
                );
                Ok(Outcome::with_notices(self.request_snapshot(request_id)?, notices))
            }
        }
    }

    fn request_snapshot(&self, id: RequestId) -> ExchangeResult<LegacyRequest> {
        self.legacy
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::not_found("swap request", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Category, Condition};
    use crate::marketplace::tests::{listed, quiet_rules, user_with};
    use crate::models::CreateSwapRequest;
    use crate::swaps::SwapStatus;

    #[test]
    fn test_request_once_per_item() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let fan = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);

        let outcome = market.request_legacy(fan, item, Some("please".into())).unwrap();
        assert_eq!(outcome.notices[0].recipient, owner);
        assert!(matches!(market.request_legacy(fan, item, None), Err(ExchangeError::Conflict(_))));
        assert!(matches!(market.request_legacy(owner, item, None), Err(ExchangeError::Validation(_))));
    }

    #[test]
    fn test_accept_rejects_others_and_rewards_both() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let first = user_with(&mut market, 0);
        let second = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);

        let chosen = market.request_legacy(first, item, None).unwrap().value.id;
        let other = market.request_legacy(second, item, None).unwrap().value.id;

        let outcome = market.respond_legacy(owner, item, chosen, LegacyAction::Accept).unwrap();
        assert_eq!(outcome.value.status, RequestStatus::Accepted);
        assert_eq!(market.legacy.get(other).unwrap().status, RequestStatus::Rejected);

        let sold = market.catalog.get(item).unwrap();
        assert_eq!(sold.status, ItemStatus::Swapped);
        assert_eq!(sold.owner, owner);

        for user in [owner, first] {
            let account = market.ledger.account(user).unwrap();
            assert_eq!(account.balance, 20);
            assert_eq!(account.stats.items_swapped, 1);
        }
        assert_eq!(market.ledger.balance(second).unwrap(), 0);
    }

    #[test]
    fn test_accept_cancels_pending_proposal_on_item() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let proposer = user_with(&mut market, 100);
        let asker = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);
        let offered = listed(&mut market, proposer, Condition::Good, Category::Tops);

        let swap = market
            .create_swap(
                proposer,
                CreateSwapRequest { offered_item_id: offered, requested_item_id: item, message: None },
            )
            .unwrap()
            .value
            .id;
        let request = market.request_legacy(asker, item, None).unwrap().value.id;
        market.respond_legacy(owner, item, request, LegacyAction::Accept).unwrap();

        let swap = market.swaps.get(swap).unwrap();
        assert_eq!(swap.status, SwapStatus::Cancelled);
        assert!(swap.cancellation_reason.is_some());
        assert_eq!(market.swaps.claim_holder(offered), None);
    }

    #[test]
    fn test_respond_checks_actor_and_status() {
        let mut market = Marketplace::new(quiet_rules());
        let owner = user_with(&mut market, 0);
        let fan = user_with(&mut market, 0);
        let item = listed(&mut market, owner, Condition::Good, Category::Tops);
        let request = market.request_legacy(fan, item, None).unwrap().value.id;

        assert!(matches!(
            market.respond_legacy(fan, item, request, LegacyAction::Accept),
            Err(ExchangeError::Unauthorized(_))
        ));
        assert!(matches!(
            market.respond_legacy(owner, item, RequestId::new(), LegacyAction::Accept),
            Err(ExchangeError::NotFound { .. })
        ));

        market.respond_legacy(owner, item, request, LegacyAction::Reject).unwrap();
        assert!(matches!(
            market.respond_legacy(owner, item, request, LegacyAction::Accept),
            Err(ExchangeError::Conflict(_))
        ));
        assert_eq!(market.catalog.get(item).unwrap().status, ItemStatus::Available);
    }
}
