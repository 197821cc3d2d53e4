// Users, password hashing and bearer sessions
//
// Passwords are stored as bcrypt hashes (salt and cost embedded). Sessions
// are opaque 32-byte hex tokens held in memory only; a restart logs
// everyone out.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app_state::{lock_state, SharedState};

/// bcrypt's accepted cost range (mirrors the crate's private `MIN_COST`/`MAX_COST`).
pub(crate) const BCRYPT_MIN_COST: u32 = 4;
pub(crate) const BCRYPT_MAX_COST: u32 = 31;
use crate::config::DEFAULT_PASSWORD_COST;
use crate::error::{ExchangeError, ExchangeResult};
use crate::handlers::{ApiError, ApiResult};
use crate::models::{paginate, PageQuery, Paginated, Timestamp, UserId, DEFAULT_PAGE_SIZE};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 500;
pub const MAX_LOCATION_LEN: usize = 100;

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(email))
}

// ===== ERRORS =====

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,

    #[error("session is invalid or has expired")]
    InvalidToken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("admin access required")]
    AdminOnly,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

// ===== USERS =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub is_admin: bool,
    pub created_at: Timestamp,
}

/// What other users and the account owner get to see
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub is_admin: bool,
    pub created_at: Timestamp,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `PUT /api/auth/profile`; absent fields are left alone, an empty bio or
/// location clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn validate_name(name: &str) -> ExchangeResult<()> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ExchangeError::validation(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> ExchangeResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ExchangeError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Trimmed optional text; empty means "clear"
fn optional_text(field: &str, value: String, max: usize) -> ExchangeResult<Option<String>> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(ExchangeError::validation(format!("{} cannot exceed {} characters", field, max)));
    }
    Ok(if value.is_empty() { None } else { Some(value.to_string()) })
}

fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

fn password_matches(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        warn!(error = %e, "stored password hash is unreadable");
        false
    })
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn default_password_cost() -> u32 {
    DEFAULT_PASSWORD_COST
}

/// In-memory user registry with session tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct UserRegistry {
    users: HashMap<UserId, User>,
    #[serde(skip)]
    by_email: HashMap<String, UserId>,
    #[serde(skip)]
    sessions: HashMap<String, UserId>,
    #[serde(skip, default = "default_password_cost")]
    password_cost: u32,
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            by_email: HashMap::new(),
            sessions: HashMap::new(),
            password_cost: DEFAULT_PASSWORD_COST,
        }
    }
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password_cost(cost: u32) -> Self {
        let mut users = Self::default();
        users.set_password_cost(cost);
        users
    }

    /// bcrypt work factor for newly hashed passwords, clamped to what bcrypt accepts
    pub fn set_password_cost(&mut self, cost: u32) {
        self.password_cost = cost.clamp(BCRYPT_MIN_COST, BCRYPT_MAX_COST);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn rebuild_index(&mut self) {
        self.by_email = self.users.values().map(|u| (u.email.clone(), u.id)).collect();
    }

    pub fn register(&mut self, req: RegisterRequest, is_admin: bool) -> ApiResult<User> {
        let name = req.name.trim();
        validate_name(name)?;
        let email = req.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ExchangeError::validation("please enter a valid email").into());
        }
        validate_password(&req.password)?;
        if self.by_email.contains_key(&email) {
            return Err(ExchangeError::conflict("user already exists with this email").into());
        }

        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            password_hash: hash_password(&req.password, self.password_cost)?,
            bio: None,
            location: None,
            email: email.clone(),
            is_admin,
            created_at: Utc::now(),
        };
        self.by_email.insert(email, user.id);
        self.users.insert(user.id, user.clone());
        info!(user = %user.id, is_admin, "user registered");
        Ok(user)
    }

    /// Check credentials and open a session
    pub fn login(&mut self, req: &LoginRequest) -> Result<(User, String), AuthError> {
        let email = req.email.trim().to_lowercase();
        let user = self
            .by_email
            .get(&email)
            .and_then(|id| self.users.get(id))
            .ok_or(AuthError::InvalidCredentials)?;
        if !password_matches(&req.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        let user = user.clone();
        let token = self.issue_session(user.id);
        Ok((user, token))
    }

    pub fn issue_session(&mut self, user: UserId) -> String {
        let token = random_hex(32);
        self.sessions.insert(token.clone(), user);
        debug!(%user, "session issued");
        token
    }

    pub fn authenticate(&self, token: &str) -> Result<&User, AuthError> {
        self.sessions
            .get(token)
            .and_then(|id| self.users.get(id))
            .ok_or(AuthError::InvalidToken)
    }

    pub fn get(&self, id: UserId) -> ExchangeResult<&User> {
        self.users.get(&id).ok_or_else(|| ExchangeError::not_found("user", id))
    }

    pub fn update_profile(&mut self, id: UserId, update: ProfileUpdate) -> ExchangeResult<UserProfile> {
        let name = match update.name {
            Some(name) => {
                let name = name.trim().to_string();
                validate_name(&name)?;
                Some(name)
            }
            None => None,
        };
        let bio = update.bio.map(|b| optional_text("bio", b, MAX_BIO_LEN)).transpose()?;
        let location = update
            .location
            .map(|l| optional_text("location", l, MAX_LOCATION_LEN))
            .transpose()?;

        let user = self.users.get_mut(&id).ok_or_else(|| ExchangeError::not_found("user", id))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(bio) = bio {
            user.bio = bio;
        }
        if let Some(location) = location {
            user.location = location;
        }
        info!(user = %id, "profile updated");
        Ok(UserProfile::from(&*user))
    }

    /// Replace the password after checking the current one
    pub fn change_password(&mut self, id: UserId, req: &ChangePasswordRequest) -> ApiResult<()> {
        let cost = self.password_cost;
        let user = self.users.get_mut(&id).ok_or_else(|| ExchangeError::not_found("user", id))?;
        if !password_matches(&req.current_password, &user.password_hash) {
            return Err(ExchangeError::validation("current password is incorrect").into());
        }
        validate_password(&req.new_password)?;
        user.password_hash = hash_password(&req.new_password, cost)?;
        info!(user = %id, "password changed");
        Ok(())
    }

    /// Admin listing with optional name/email substring search
    pub fn list(&self, search: Option<&str>, page: PageQuery) -> Paginated<UserProfile> {
        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut found: Vec<UserProfile> = self
            .users
            .values()
            .filter(|u| {
                needle
                    .as_ref()
                    .map_or(true, |n| u.name.to_lowercase().contains(n) || u.email.contains(n))
            })
            .map(UserProfile::from)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        paginate(found, page.resolve(DEFAULT_PAGE_SIZE))
    }
}

// ===== EXTRACTORS =====

/// The caller identified by `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub name: String,
    pub is_admin: bool,
}

/// An authenticated caller with admin rights
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let app = lock_state(state)?;
        let user = app.users.authenticate(token)?;
        Ok(AuthUser { id: user.id, name: user.name.clone(), is_admin: user.is_admin })
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AuthError::AdminOnly.into());
        }
        Ok(AdminUser(user))
    }
}
