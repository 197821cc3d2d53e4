// ============================================================================
// Swap Negotiation
// ============================================================================
//
// create  (initiator)  -> pending
// respond (recipient)  accept | reject | counter
// respond_to_counter (initiator) accept | reject
//
// Balances are checked at every acceptance point against the difference
// being accepted. The binding check is the one inside settlement.
//
// ============================================================================

use chrono::Utc;
use tracing::info;

use super::{point_difference, CounterOffer, Swap, SwapStatus};
use crate::error::{ExchangeError, ExchangeResult};
use crate::marketplace::{Marketplace, Outcome};
use crate::models::{CounterAction, CounterOfferInput, CreateSwapRequest, SwapAction, SwapId, UserId};
use crate::notifications::{Notice, NotificationKind};

pub const MAX_SWAP_MESSAGE_LEN: usize = 500;

fn check_message(message: Option<&str>) -> ExchangeResult<()> {
    match message {
        Some(m) if m.chars().count() > MAX_SWAP_MESSAGE_LEN => Err(ExchangeError::validation(format!(
            "message cannot exceed {} characters",
            MAX_SWAP_MESSAGE_LEN
        ))),
        _ => Ok(()),
    }
}

impl Marketplace {
    /// Propose trading one of the initiator's items for someone else's
    pub fn create_swap(&mut self, initiator: UserId, req: CreateSwapRequest) -> ExchangeResult<Outcome<Swap>> {
        let CreateSwapRequest { offered_item_id, requested_item_id, message } = req;

        if offered_item_id == requested_item_id {
            return Err(ExchangeError::validation("an item cannot be swapped for itself"));
        }
        check_message(message.as_deref())?;

        let offered = self.catalog.get(offered_item_id)?;
        let requested = self.catalog.get(requested_item_id)?;
        self.catalog.reserve(&[offered_item_id, requested_item_id])?;

        if !offered.is_owned_by(initiator) {
            return Err(ExchangeError::unauthorized("you can only offer your own items"));
        }
        if requested.is_owned_by(initiator) {
            return Err(ExchangeError::validation("you cannot request your own item"));
        }

        for item in [offered_item_id, requested_item_id] {
            if let Some(holder) = self.swaps.claim_holder(item) {
                return Err(ExchangeError::conflict(format!(
                    "item {} is already part of pending swap {}",
                    item, holder
                )));
            }
        }

        let recipient = requested.owner;
        let requested_title = requested.title.clone();
        let diff = point_difference(offered.point_value, requested.point_value);
        self.check_funds(initiator, recipient, diff)?;

        let swap = Swap::new(initiator, recipient, offered_item_id, requested_item_id, diff, message);
        let id = self.swaps.insert_pending(swap)?;
        let swap = self.swaps.get(id)?.clone();
        info!(swap = %id, %initiator, %recipient, point_difference = diff, "swap proposed");

        let notice = Notice::new(
            recipient,
            NotificationKind::SwapRequest,
            "New swap proposal",
            format!("You have a new swap proposal for \"{}\"", requested_title),
        )
        .from_user(initiator)
        .about_swap(id)
        .about_item(requested_item_id);
        Ok(Outcome::new(swap).notify(notice))
    }

    /// Recipient's answer to a pending swap
    pub fn respond(
        &mut self,
        actor: UserId,
        swap_id: SwapId,
        action: SwapAction,
        counter: Option<CounterOfferInput>,
    ) -> ExchangeResult<Outcome<Swap>> {
        let swap = self.swaps.get(swap_id)?;
        if swap.recipient != actor {
            return Err(ExchangeError::unauthorized("only the recipient can respond to this swap"));
        }
        if swap.status != SwapStatus::Pending {
            return Err(ExchangeError::conflict(format!("swap is already {}", swap.status.as_str())));
        }
        if swap.counter_offer.is_some() {
            return Err(ExchangeError::conflict("a counter-offer is already awaiting the initiator"));
        }
        let (initiator, recipient, original) = (swap.initiator, swap.recipient, swap.point_difference);

        match action {
            SwapAction::Accept => {
                self.check_funds(initiator, recipient, original)?;
                let swap = self.execute_settlement(swap_id, original)?;
                info!(swap = %swap_id, point_difference = original, "swap accepted");
                Ok(Outcome::new(swap.clone()).notify(accepted_notice(&swap, recipient, initiator)))
            }
            SwapAction::Reject => {
                let swap = self.swaps.modify(swap_id, |s| {
                    s.status = SwapStatus::Rejected;
                    s.mark_responded();
                    s.clone()
                })?;
                info!(swap = %swap_id, "swap rejected");
                Ok(Outcome::new(swap.clone()).notify(rejected_notice(&swap, recipient, initiator)))
            }
            SwapAction::Counter => {
                let input = counter
                    .ok_or_else(|| ExchangeError::validation("a counter-offer needs a pointDifference"))?;
                check_message(input.message.as_deref())?;
                if input.point_difference < 0 {
                    self.ledger
                        .require(recipient, input.point_difference.unsigned_abs())
                        .map_err(|e| e.for_party(crate::error::Party::Recipient))?;
                }

                let offer = CounterOffer {
                    point_difference: input.point_difference,
                    message: input.message,
                    created_at: Utc::now(),
                };
                let swap = self.swaps.modify(swap_id, |s| {
                    s.counter_offer = Some(offer);
                    s.mark_responded();
                    s.clone()
                })?;
                info!(swap = %swap_id, counter = input.point_difference, "swap countered");

                let notice = Notice::new(
                    initiator,
                    NotificationKind::SwapCounter,
                    "Counter-offer received",
                    format!(
                        "Your swap proposal was countered with a point difference of {}",
                        input.point_difference
                    ),
                )
                .from_user(recipient)
                .about_swap(swap_id);
                Ok(Outcome::new(swap).notify(notice))
            }
        }
    }

    /// Initiator's answer to an outstanding counter-offer
    pub fn respond_to_counter(
        &mut self,
        actor: UserId,
        swap_id: SwapId,
        action: CounterAction,
    ) -> ExchangeResult<Outcome<Swap>> {
        let swap = self.swaps.get(swap_id)?;
        if swap.initiator != actor {
            return Err(ExchangeError::unauthorized("only the initiator can respond to a counter-offer"));
        }
        if swap.status != SwapStatus::Pending {
            return Err(ExchangeError::conflict(format!("swap is already {}", swap.status.as_str())));
        }
        let counter = swap
            .counter_offer
            .as_ref()
            .map(|c| c.point_difference)
            .ok_or_else(|| ExchangeError::conflict("there is no counter-offer to respond to"))?;
        let (initiator, recipient) = (swap.initiator, swap.recipient);

        match action {
            CounterAction::Accept => {
                self.check_funds(initiator, recipient, counter)?;
                self.execute_settlement(swap_id, counter)?;
                let swap = self.swaps.modify(swap_id, |s| {
                    s.point_difference = counter;
                    s.counter_offer = None;
                    s.clone()
                })?;
                info!(swap = %swap_id, point_difference = counter, "counter-offer accepted");
                Ok(Outcome::new(swap.clone()).notify(accepted_notice(&swap, initiator, recipient)))
            }
            CounterAction::Reject => {
                let swap = self.swaps.modify(swap_id, |s| {
                    s.counter_offer = None;
                    s.status = SwapStatus::Rejected;
                    s.clone()
                })?;
                info!(swap = %swap_id, "counter-offer rejected");
                Ok(Outcome::new(swap.clone()).notify(rejected_notice(&swap, initiator, recipient)))
            }
        }
    }
}

fn accepted_notice(swap: &Swap, from: UserId, to: UserId) -> Notice {
    Notice::new(
        to,
        NotificationKind::SwapAccepted,
        "Swap completed!",
        format!("Your swap was accepted and settled with a point difference of {}", swap.point_difference),
    )
    .from_user(from)
    .about_swap(swap.id)
}

fn rejected_notice(swap: &Swap, from: UserId, to: UserId) -> Notice {
    Notice::new(to, NotificationKind::SwapRejected, "Swap declined", "Your swap was declined")
        .from_user(from)
        .about_swap(swap.id)
}
