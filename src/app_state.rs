// Application state management

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{RegisterRequest, User, UserRegistry};
use crate::config::AppConfig;
use crate::handlers::{ApiError, ApiResult};
use crate::marketplace::Marketplace;
use crate::models::Timestamp;
use crate::notifications::{dispatch, Inbox, Notice, NotificationKind};

pub type SharedState = Arc<Mutex<AppState>>;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

pub struct AppState {
    pub config: AppConfig,
    pub users: UserRegistry,
    pub market: Marketplace,
    pub inbox: Inbox,
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    version: u32,
    saved_at: Timestamp,
    users: &'a UserRegistry,
    market: &'a Marketplace,
    inbox: &'a Inbox,
}

#[derive(Deserialize)]
struct PersistedState {
    version: u32,
    users: UserRegistry,
    market: Marketplace,
    inbox: Inbox,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let market = Marketplace::new(config.rules);
        let users = UserRegistry::with_password_cost(config.password_cost);
        Self { config, users, market, inbox: Inbox::new() }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Create a user with a points account, an inbox and a welcome note.
    /// Returns the user and a fresh session token.
    pub fn register_user(&mut self, req: RegisterRequest) -> ApiResult<(User, String)> {
        let is_admin = self.config.is_admin_email(&req.email);
        let user = self.users.register(req, is_admin)?;
        let opening = self.market.open_account(user.id)?;
        self.inbox.register(user.id);
        self.deliver(vec![Notice::new(
            user.id,
            NotificationKind::Welcome,
            "Welcome to ReWear!",
            format!("Start listing items to earn points. You begin with {} points.", opening.after),
        )]);
        let token = self.users.issue_session(user.id);
        Ok((user, token))
    }

    /// Hand notices to the inbox; failures are logged, never returned
    pub fn deliver(&mut self, notices: Vec<Notice>) {
        if !notices.is_empty() {
            dispatch(&mut self.inbox, notices);
        }
    }

    /// Serialize the whole state. Runs under the lock; the write does not.
    pub fn snapshot(&self) -> Result<Snapshot, PersistError> {
        let persisted = PersistedStateRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            users: &self.users,
            market: &self.market,
            inbox: &self.inbox,
        };
        Ok(Snapshot {
            path: self.config.state_path.clone(),
            json: serde_json::to_string_pretty(&persisted)?,
            users: self.users.len(),
        })
    }

    pub fn save_to_disk(&self) -> Result<(), PersistError> {
        self.snapshot()?.write()
    }

    /// Load the snapshot at `config.state_path`, or start empty if there is none
    pub fn load_or_new(config: AppConfig) -> Result<Self, PersistError> {
        if !Path::new(&config.state_path).exists() {
            info!(path = %config.state_path.display(), "no persisted state found, starting fresh");
            return Ok(Self::new(config));
        }

        let raw = fs::read_to_string(&config.state_path)?;
        let persisted: PersistedState = serde_json::from_str(&raw)?;
        if persisted.version != SNAPSHOT_VERSION {
            return Err(PersistError::Version(persisted.version));
        }

        let mut state = Self {
            users: persisted.users,
            market: persisted.market,
            inbox: persisted.inbox,
            config,
        };
        state.market.rules = state.config.rules;
        state.users.set_password_cost(state.config.password_cost);
        state.market.rebuild_indexes();
        state.users.rebuild_index();
        info!(
            users = state.users.len(),
            items = state.market.catalog.len(),
            swaps = state.market.swaps.len(),
            "loaded persisted state"
        );
        Ok(state)
    }
}

/// Serialized state waiting to be written
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    json: String,
    users: usize,
}

impl Snapshot {
    /// Write to a temp file beside the target, then rename over it
    pub fn write(self) -> Result<(), PersistError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, self.json)?;
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), users = self.users, "state saved");
        Ok(())
    }
}

/// Lock the shared state, turning a poisoned lock into an internal error
pub fn lock_state(state: &SharedState) -> Result<MutexGuard<'_, AppState>, ApiError> {
    state.lock().map_err(|_| {
        warn!("state lock poisoned");
        ApiError::Internal("state lock poisoned".into())
    })
}
