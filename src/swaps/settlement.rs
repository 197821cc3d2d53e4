// ============================================================================
// Settlement Executor
// ============================================================================
//
// Applies an agreed swap as one unit:
//
//   1. move |finalPointDifference| points toward the side that is owed
//   2. swap the two items' owners
//   3. mark both items swapped
//   4. bump both users' itemsSwapped
//   5. mark the swap completed
//
// Preconditions are re-read here, immediately before the transfer. Any
// failure after the first write rolls every touched record back.
//
// ============================================================================

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::{Swap, SwapStatus};
use crate::error::{ExchangeError, ExchangeResult, Party};
use crate::items::{Item, ItemStatus};
use crate::ledger::TransferReceipt;
use crate::marketplace::{Marketplace, Outcome};
use crate::models::{ItemId, SwapId, UserId};
use crate::notifications::{Notice, NotificationKind};

/// Result of buying an item outright with points
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub item: Item,
    pub previous_owner: UserId,
    pub receipt: TransferReceipt,
}

impl Marketplace {
    /// Settle a pending swap with `final_point_difference`.
    ///
    /// On success the swap is `completed`. On failure nothing has changed
    /// and the swap is still `pending`.
    pub(crate) fn execute_settlement(&mut self, swap_id: SwapId, final_point_difference: i64) -> ExchangeResult<Swap> {
        let swap = self.swaps.get(swap_id)?.clone();
        if swap.status != SwapStatus::Pending {
            return Err(ExchangeError::conflict(format!("swap is already {}", swap.status.as_str())));
        }

        self.catalog.reserve(&swap.items())?;
        let offered_owner = self.catalog.get(swap.offered_item)?.owner;
        let requested_owner = self.catalog.get(swap.requested_item)?.owner;
        if offered_owner != swap.initiator || requested_owner != swap.recipient {
            return Err(ExchangeError::conflict("item ownership changed since the swap was proposed"));
        }

        let (payer, payee) = if final_point_difference >= 0 {
            (swap.initiator, swap.recipient)
        } else {
            (swap.recipient, swap.initiator)
        };
        let amount = final_point_difference.unsigned_abs();
        let available = self.ledger.balance(payer)?;
        if available < amount {
            warn!(swap = %swap_id, %payer, amount, available, "settlement aborted on final balance check");
            return Err(ExchangeError::settlement(format!(
                "{} no longer has the {} points needed; nothing was applied",
                if payer == swap.initiator { Party::Initiator.as_str() } else { Party::Recipient.as_str() },
                amount
            )));
        }

        let savepoint = self.savepoint(&[swap.initiator, swap.recipient], &swap.items(), &[swap_id]);
        let completed = self.atomically(savepoint, |market| {
            market.swaps.modify(swap_id, |s| s.status = SwapStatus::Accepted)?;
            market.ledger.transfer(payer, payee, amount, &format!("swap {}", swap_id))?;
            market.catalog.reassign(swap.offered_item, swap.recipient)?;
            market.catalog.reassign(swap.requested_item, swap.initiator)?;
            market.catalog.mark_swapped(&swap.items())?;
            market.ledger.record_swap(&[swap.initiator, swap.recipient])?;
            market.swaps.modify(swap_id, |s| {
                s.status = SwapStatus::Completed;
                s.completed_at = Some(Utc::now());
                s.mark_responded();
                s.clone()
            })
        })?;

        info!(
            swap = %swap_id,
            %payer,
            %payee,
            amount,
            "swap settled"
        );
        Ok(completed)
    }

    /// Buy an available item outright at its point value
    pub fn redeem_with_points(&mut self, redeemer: UserId, item_id: ItemId) -> ExchangeResult<Outcome<Redemption>> {
        let item = self.catalog.get(item_id)?;
        if item.status != ItemStatus::Available {
            return Err(ExchangeError::conflict("item is not available for redemption"));
        }
        if item.is_owned_by(redeemer) {
            return Err(ExchangeError::validation("you cannot redeem your own item"));
        }
        if let Some(holder) = self.swaps.claim_holder(item_id) {
            return Err(ExchangeError::conflict(format!(
                "item is part of pending swap {} and cannot be redeemed",
                holder
            )));
        }
        let (owner, price, title) = (item.owner, item.point_value, item.title.clone());
        self.ledger
            .require(redeemer, price)
            .map_err(|e| e.for_party(Party::Redeemer))?;

        let savepoint = self.savepoint(&[redeemer, owner], &[item_id], &[]);
        let receipt = self.atomically(savepoint, |market| {
            let receipt = market
                .ledger
                .transfer(redeemer, owner, price, &format!("redeemed item {}", item_id))
                .map_err(|e| e.for_party(Party::Redeemer))?;
            market.catalog.reassign(item_id, redeemer)?;
            market.catalog.mark_swapped(&[item_id])?;
            Ok(receipt)
        })?;
        let notices = self.withdraw_claims(item_id, "the item was redeemed with points")?;

        let item = self.catalog.get(item_id)?.clone();
        info!(item = %item_id, %redeemer, %owner, price, "item redeemed with points");

        let outcome = Outcome::with_notices(Redemption { item, previous_owner: owner, receipt }, notices)
            .notify(
                Notice::new(
                    owner,
                    NotificationKind::PointsEarned,
                    "Item redeemed",
                    format!("\"{}\" was redeemed. You earned {} points.", title, price),
                )
                .from_user(redeemer)
                .about_item(item_id),
            )
            .notify(
                Notice::new(
                    redeemer,
                    NotificationKind::SwapAccepted,
                    "Redemption complete",
                    format!("You redeemed \"{}\" for {} points", title, price),
                )
                .about_item(item_id),
            );
        Ok(outcome)
    }
}
