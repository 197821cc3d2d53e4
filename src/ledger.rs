//! Points Ledger for the ReWear exchange
//!
//! Single source of truth for every user's point balance and lifetime
//! earn/spend counters. Every mutation is an explicit ledger operation that
//! returns the before/after balances and appends to the journal, so callers
//! can audit or roll back a unit of work.
//!
//! Balances are non-negative integers. Anything that would take a balance
//! below zero is rejected as `InsufficientFunds`, never clamped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ExchangeError, Party};
use crate::models::{Timestamp, UserId};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Lifetime activity counters for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub items_listed: u64,
    pub items_swapped: u64,
    pub points_earned: u64,
    pub points_spent: u64,
}

/// A user's points account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: u64,
    pub stats: AccountStats,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Kind of journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Starting balance granted when the account opens
    Opening,
    /// Counter-value moved between two users
    Transfer,
    /// One-directional incentive credit
    Reward,
    /// Reversal of a previous reward
    Revoke,
}

/// One balance change on one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub user: UserId,
    pub counterparty: Option<UserId>,
    /// Signed change applied to `user` (credit > 0)
    pub delta: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub reason: String,
    pub at: Timestamp,
}

/// Before/after view of a single-account operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub user: UserId,
    pub amount: u64,
    pub before: u64,
    pub after: u64,
}

/// Result of a two-party transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub payer: BalanceChange,
    pub payee: BalanceChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("no points account for user {0}")]
    AccountNotFound(UserId),

    #[error("points account already open for user {0}")]
    AccountExists(UserId),

    #[error("user {user} needs {required} points but has {available}")]
    InsufficientFunds { user: UserId, required: u64, available: u64 },

    #[error("cannot transfer points from user {0} to themselves")]
    SelfTransfer(UserId),

    #[error("balance for user {0} would exceed the maximum")]
    Overflow(UserId),
}

impl LedgerError {
    /// Attach exchange context to a ledger failure
    pub fn for_party(self, party: Party) -> ExchangeError {
        match self {
            LedgerError::InsufficientFunds { user, required, available } => {
                ExchangeError::InsufficientFunds { party, user, required, available }
            }
            LedgerError::AccountNotFound(user) => ExchangeError::not_found("account", user),
            other => ExchangeError::validation(other.to_string()),
        }
    }
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        err.for_party(Party::Account)
    }
}

/// Aggregate ledger figures for admin dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub accounts: usize,
    pub points_in_circulation: u64,
    pub journal_entries: usize,
}

// ============================================================================
// LEDGER
// ============================================================================

/// Journal delta for an unsigned amount, pinned at `i64::MAX`
fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<UserId, Account>,
    journal: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account with a starting balance
    pub fn open_account(
        &mut self,
        user: UserId,
        initial: u64,
        reason: &str,
    ) -> Result<BalanceChange, LedgerError> {
        if self.accounts.contains_key(&user) {
            return Err(LedgerError::AccountExists(user));
        }

        let now = Utc::now();
        self.accounts.insert(
            user,
            Account {
                user_id: user,
                balance: initial,
                stats: AccountStats::default(),
                opened_at: now,
                updated_at: now,
            },
        );
        self.push_entry(EntryKind::Opening, user, None, signed(initial), 0, initial, reason);

        info!(%user, initial, "points account opened");
        Ok(BalanceChange { user, amount: initial, before: 0, after: initial })
    }

    pub fn account(&self, user: UserId) -> Option<&Account> {
        self.accounts.get(&user)
    }

    pub fn balance(&self, user: UserId) -> Result<u64, LedgerError> {
        self.accounts
            .get(&user)
            .map(|a| a.balance)
            .ok_or(LedgerError::AccountNotFound(user))
    }

    pub fn sufficient_for(&self, user: UserId, amount: u64) -> Result<bool, LedgerError> {
        Ok(self.balance(user)? >= amount)
    }

    /// Fail with `InsufficientFunds` unless `user` can cover `amount`
    pub fn require(&self, user: UserId, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance(user)?;
        if available < amount {
            return Err(LedgerError::InsufficientFunds { user, required: amount, available });
        }
        Ok(())
    }

    /// Move `amount` from payer to payee, updating spent/earned counters.
    ///
    /// Sufficiency is checked here, at execution time, regardless of any
    /// earlier check. A zero amount is a valid no-op.
    pub fn transfer(
        &mut self,
        payer: UserId,
        payee: UserId,
        amount: u64,
        reason: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        if payer == payee {
            return Err(LedgerError::SelfTransfer(payer));
        }
        let payer_before = self.balance(payer)?;
        let payee_before = self.balance(payee)?;

        if amount == 0 {
            return Ok(TransferReceipt {
                payer: BalanceChange { user: payer, amount, before: payer_before, after: payer_before },
                payee: BalanceChange { user: payee, amount, before: payee_before, after: payee_before },
            });
        }
        if payer_before < amount {
            return Err(LedgerError::InsufficientFunds {
                user: payer,
                required: amount,
                available: payer_before,
            });
        }

        let now = Utc::now();
        let payer_after = payer_before - amount;
        let payee_after = payee_before.checked_add(amount).ok_or(LedgerError::Overflow(payee))?;

        if let Some(account) = self.accounts.get_mut(&payer) {
            account.balance = payer_after;
            account.stats.points_spent = account.stats.points_spent.saturating_add(amount);
            account.updated_at = now;
        }
        if let Some(account) = self.accounts.get_mut(&payee) {
            account.balance = payee_after;
            account.stats.points_earned = account.stats.points_earned.saturating_add(amount);
            account.updated_at = now;
        }

        self.push_entry(EntryKind::Transfer, payer, Some(payee), -signed(amount), payer_before, payer_after, reason);
        self.push_entry(EntryKind::Transfer, payee, Some(payer), signed(amount), payee_before, payee_after, reason);

        info!(%payer, %payee, amount, reason, "points transferred");
        Ok(TransferReceipt {
            payer: BalanceChange { user: payer, amount, before: payer_before, after: payer_after },
            payee: BalanceChange { user: payee, amount, before: payee_before, after: payee_after },
        })
    }

    /// Credit an incentive bonus (listing an item, completing a legacy swap)
    pub fn reward(&mut self, user: UserId, amount: u64, reason: &str) -> Result<BalanceChange, LedgerError> {
        let account = self.accounts.get_mut(&user).ok_or(LedgerError::AccountNotFound(user))?;
        let before = account.balance;
        let after = before.checked_add(amount).ok_or(LedgerError::Overflow(user))?;
        account.balance = after;
        account.stats.points_earned = account.stats.points_earned.saturating_add(amount);
        account.updated_at = Utc::now();

        self.push_entry(EntryKind::Reward, user, None, signed(amount), before, after, reason);
        debug!(%user, amount, reason, "reward credited");
        Ok(BalanceChange { user, amount, before, after })
    }

    /// Take back previously credited points
    pub fn revoke(&mut self, user: UserId, amount: u64, reason: &str) -> Result<BalanceChange, LedgerError> {
        let account = self.accounts.get_mut(&user).ok_or(LedgerError::AccountNotFound(user))?;
        let before = account.balance;
        if before < amount {
            return Err(LedgerError::InsufficientFunds { user, required: amount, available: before });
        }
        account.balance -= amount;
        account.stats.points_earned = account.stats.points_earned.saturating_sub(amount);
        account.updated_at = Utc::now();
        let after = account.balance;

        self.push_entry(EntryKind::Revoke, user, None, -signed(amount), before, after, reason);
        info!(%user, amount, reason, "points revoked");
        Ok(BalanceChange { user, amount, before, after })
    }

    pub fn record_listing(&mut self, user: UserId) -> Result<(), LedgerError> {
        let account = self.accounts.get_mut(&user).ok_or(LedgerError::AccountNotFound(user))?;
        account.stats.items_listed += 1;
        Ok(())
    }

    /// Bump `itemsSwapped` for every listed user, or for none of them
    pub fn record_swap(&mut self, users: &[UserId]) -> Result<(), LedgerError> {
        if let Some(missing) = users.iter().find(|u| !self.accounts.contains_key(*u)) {
            return Err(LedgerError::AccountNotFound(*missing));
        }
        for user in users {
            if let Some(account) = self.accounts.get_mut(user) {
                account.stats.items_swapped += 1;
            }
        }
        Ok(())
    }

    /// Most recent journal entries for one user, newest first
    pub fn entries_for(&self, user: UserId, limit: usize) -> Vec<&LedgerEntry> {
        self.journal
            .iter()
            .rev()
            .filter(|e| e.user == user)
            .take(limit)
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            accounts: self.accounts.len(),
            points_in_circulation: self.accounts.values().fold(0u64, |sum, a| sum.saturating_add(a.balance)),
            journal_entries: self.journal.len(),
        }
    }

    // ===== SAVEPOINT SUPPORT =====

    pub(crate) fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Put captured accounts back and drop journal entries written after `journal_len`
    pub(crate) fn restore(&mut self, accounts: Vec<Account>, journal_len: usize) {
        for account in accounts {
            self.accounts.insert(account.user_id, account);
        }
        self.journal.truncate(journal_len);
    }

    #[allow(clippy::too_many_arguments)]
    fn push_entry(
        &mut self,
        kind: EntryKind,
        user: UserId,
        counterparty: Option<UserId>,
        delta: i64,
        balance_before: u64,
        balance_after: u64,
        reason: &str,
    ) {
        self.journal.push(LedgerEntry {
            id: Uuid::new_v4(),
            kind,
            user,
            counterparty,
            delta,
            balance_before,
            balance_after,
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }
}
