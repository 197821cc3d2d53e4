// ============================================================================
// Availability Gate
// ============================================================================
//
// Status transitions for listings:
//
//   available ──settle/redeem/legacy──▶ swapped
//   available | pending ──remove──▶ removed
//
// Reservation is a check, not a lock. Exclusivity between pending proposals
// is enforced by the swap book's per-item claim index.
//
// ============================================================================

use chrono::Utc;
use tracing::{debug, info};

use super::{ItemCatalog, ItemStatus};
use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{ItemId, UserId};

impl ItemCatalog {
    pub fn is_available(&self, id: ItemId) -> ExchangeResult<bool> {
        Ok(self.get(id)?.status == ItemStatus::Available)
    }

    /// Confirm every item exists and is available. Nothing is mutated.
    pub fn reserve(&self, ids: &[ItemId]) -> ExchangeResult<()> {
        for &id in ids {
            let item = self.get(id)?;
            if item.status != ItemStatus::Available {
                return Err(ExchangeError::conflict(format!(
                    "item '{}' is {}, not available",
                    item.title,
                    item.status.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Move items to `swapped`. Items already swapped are left alone.
    pub(crate) fn mark_swapped(&mut self, ids: &[ItemId]) -> ExchangeResult<()> {
        for &id in ids {
            if self.get(id)?.status == ItemStatus::Removed {
                return Err(ExchangeError::conflict(format!("item {} has been removed", id)));
            }
        }

        let now = Utc::now();
        for &id in ids {
            let item = self.get_mut(id)?;
            if item.status != ItemStatus::Swapped {
                item.status = ItemStatus::Swapped;
                item.updated_at = now;
                debug!(item = %id, "item marked swapped");
            }
        }
        Ok(())
    }

    /// Take a listing down; returns the status it left
    pub(crate) fn mark_removed(&mut self, id: ItemId, reason: &str) -> ExchangeResult<ItemStatus> {
        let item = self.get_mut(id)?;
        let previous = item.status;
        match previous {
            ItemStatus::Available | ItemStatus::Pending => {
                item.status = ItemStatus::Removed;
                item.removal_reason = Some(reason.to_string());
                item.updated_at = Utc::now();
                info!(item = %id, reason, "item removed");
                Ok(previous)
            }
            ItemStatus::Swapped | ItemStatus::Removed => Err(ExchangeError::conflict(format!(
                "item is already {}",
                previous.as_str()
            ))),
        }
    }

    pub(crate) fn reassign(&mut self, id: ItemId, new_owner: UserId) -> ExchangeResult<()> {
        let item = self.get_mut(id)?;
        item.owner = new_owner;
        item.updated_at = Utc::now();
        Ok(())
    }
}
