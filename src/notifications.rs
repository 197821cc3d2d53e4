// User notifications
//
// Exchange operations never write notifications directly. They return
// `Notice`s describing what happened, and the HTTP layer hands them to a
// `NotificationSink` after the state change has committed. Delivery is
// fire-and-forget: a failed notice is logged and dropped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{paginate, ItemId, NotificationId, PageQuery, Pagination, SwapId, Timestamp, UserId, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SwapRequest,
    SwapAccepted,
    SwapRejected,
    SwapCounter,
    SwapCancelled,
    ItemLiked,
    ItemRemoved,
    PointsEarned,
    System,
    Welcome,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SwapRequest => "swap_request",
            NotificationKind::SwapAccepted => "swap_accepted",
            NotificationKind::SwapRejected => "swap_rejected",
            NotificationKind::SwapCounter => "swap_counter",
            NotificationKind::SwapCancelled => "swap_cancelled",
            NotificationKind::ItemLiked => "item_liked",
            NotificationKind::ItemRemoved => "item_removed",
            NotificationKind::PointsEarned => "points_earned",
            NotificationKind::System => "system",
            NotificationKind::Welcome => "welcome",
        }
    }
}

/// An event worth telling a user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_item: Option<ItemId>,
    pub related_swap: Option<SwapId>,
}

impl Notice {
    pub fn new(recipient: UserId, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient,
            sender: None,
            kind,
            title: title.into(),
            message: message.into(),
            related_item: None,
            related_swap: None,
        }
    }

    pub fn from_user(mut self, sender: UserId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn about_item(mut self, item: ItemId) -> Self {
        self.related_item = Some(item);
        self
    }

    pub fn about_swap(mut self, swap: SwapId) -> Self {
        self.related_swap = Some(swap);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub sender: Option<UserId>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_item: Option<ItemId>,
    pub related_swap: Option<SwapId>,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("no inbox for user {0}")]
    UnknownRecipient(UserId),
}

/// Anything that can accept notices for delivery
pub trait NotificationSink {
    fn deliver(&mut self, notice: Notice) -> Result<NotificationId, NotifyError>;
}

/// Deliver every notice, logging failures. Returns how many were delivered.
pub fn dispatch<S: NotificationSink + ?Sized>(sink: &mut S, notices: Vec<Notice>) -> usize {
    let mut delivered = 0;
    for notice in notices {
        let kind = notice.kind;
        let recipient = notice.recipient;
        match sink.deliver(notice) {
            Ok(id) => {
                delivered += 1;
                debug!(notification = %id, %recipient, kind = kind.as_str(), "notification delivered");
            }
            Err(e) => warn!(%recipient, kind = kind.as_str(), error = %e, "notification dropped"),
        }
    }
    delivered
}

// ============================================================================
// INBOX
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    pub by_type: HashMap<NotificationKind, usize>,
}

/// In-memory notification store, one inbox per registered user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inbox {
    recipients: HashSet<UserId>,
    notifications: HashMap<NotificationId, Notification>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, user: UserId) {
        self.recipients.insert(user);
    }

    fn for_user(&self, user: UserId) -> impl Iterator<Item = &Notification> {
        self.notifications.values().filter(move |n| n.recipient == user)
    }

    pub fn list(&self, user: UserId, unread_only: bool, page: PageQuery) -> NotificationPage {
        let mut mine: Vec<Notification> = self
            .for_user(user)
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let unread_count = self.for_user(user).filter(|n| !n.is_read).count();
        let page = paginate(mine, page.resolve(DEFAULT_PAGE_SIZE));
        NotificationPage { notifications: page.items, pagination: page.pagination, unread_count }
    }

    pub fn stats(&self, user: UserId) -> NotificationStats {
        let mut by_type = HashMap::new();
        let mut total = 0;
        let mut unread = 0;
        for n in self.for_user(user) {
            total += 1;
            if !n.is_read {
                unread += 1;
            }
            *by_type.entry(n.kind).or_insert(0) += 1;
        }
        NotificationStats { total, unread, by_type }
    }

    fn owned_mut(&mut self, user: UserId, id: NotificationId) -> ExchangeResult<&mut Notification> {
        let n = self
            .notifications
            .get_mut(&id)
            .ok_or_else(|| ExchangeError::not_found("notification", id))?;
        if n.recipient != user {
            return Err(ExchangeError::unauthorized("notification belongs to another user"));
        }
        Ok(n)
    }

    pub fn mark_read(&mut self, user: UserId, id: NotificationId) -> ExchangeResult<Notification> {
        let n = self.owned_mut(user, id)?;
        if !n.is_read {
            n.is_read = true;
            n.read_at = Some(Utc::now());
        }
        Ok(n.clone())
    }

    /// Returns how many were newly marked
    pub fn mark_all_read(&mut self, user: UserId) -> usize {
        let now = Utc::now();
        let mut marked = 0;
        for n in self.notifications.values_mut().filter(|n| n.recipient == user && !n.is_read) {
            n.is_read = true;
            n.read_at = Some(now);
            marked += 1;
        }
        marked
    }

    pub fn delete(&mut self, user: UserId, id: NotificationId) -> ExchangeResult<()> {
        self.owned_mut(user, id)?;
        self.notifications.remove(&id);
        Ok(())
    }
}

impl NotificationSink for Inbox {
    fn deliver(&mut self, notice: Notice) -> Result<NotificationId, NotifyError> {
        if !self.recipients.contains(&notice.recipient) {
            return Err(NotifyError::UnknownRecipient(notice.recipient));
        }
        let id = NotificationId::new();
        self.notifications.insert(
            id,
            Notification {
                id,
                recipient: notice.recipient,
                sender: notice.sender,
                kind: notice.kind,
                title: notice.title,
                message: notice.message,
                related_item: notice.related_item,
                related_swap: notice.related_swap,
                is_read: false,
                read_at: None,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}
