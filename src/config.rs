// Runtime configuration, read from the environment (and `.env` via dotenv)

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::marketplace::MarketRules;

pub const DEFAULT_PASSWORD_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub state_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub rules: MarketRules,
    /// Lowercased emails that register as admins
    pub admin_emails: HashSet<String>,
    /// Periodic snapshot interval; 0 disables autosave
    pub autosave_secs: u64,
    /// bcrypt work factor for stored passwords
    pub password_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            state_path: PathBuf::from("data/state.json"),
            uploads_dir: PathBuf::from("uploads"),
            rules: MarketRules::default(),
            admin_emails: HashSet::new(),
            autosave_secs: 0,
            password_cost: DEFAULT_PASSWORD_COST,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("REWEAR_LISTEN") {
            config.listen_addr = parse("REWEAR_LISTEN", &v)?;
        }
        if let Some(v) = lookup("REWEAR_STATE_PATH") {
            config.state_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("REWEAR_UPLOADS_DIR") {
            config.uploads_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("REWEAR_STARTING_POINTS") {
            config.rules.starting_points = parse("REWEAR_STARTING_POINTS", &v)?;
        }
        if let Some(v) = lookup("REWEAR_LISTING_REWARD") {
            config.rules.listing_reward = parse("REWEAR_LISTING_REWARD", &v)?;
        }
        if let Some(v) = lookup("REWEAR_SWAP_REWARD") {
            config.rules.swap_reward = parse("REWEAR_SWAP_REWARD", &v)?;
        }
        if let Some(v) = lookup("REWEAR_ADMIN_EMAILS") {
            config.admin_emails = v
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(v) = lookup("REWEAR_AUTOSAVE_SECS") {
            config.autosave_secs = parse("REWEAR_AUTOSAVE_SECS", &v)?;
        }
        if let Some(v) = lookup("REWEAR_PASSWORD_COST") {
            let cost: u32 = parse("REWEAR_PASSWORD_COST", &v)?;
            if !(crate::auth::BCRYPT_MIN_COST..=crate::auth::BCRYPT_MAX_COST).contains(&cost) {
                return Err(ConfigError::Invalid {
                    var: "REWEAR_PASSWORD_COST",
                    value: v,
                    reason: format!("must be between {} and {}", crate::auth::BCRYPT_MIN_COST, crate::auth::BCRYPT_MAX_COST),
                });
            }
            config.password_cost = cost;
        }

        Ok(config)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.trim().to_lowercase())
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen_addr.port(), 5000);
        assert_eq!(config.rules, MarketRules::default());
        assert_eq!(config.autosave_secs, 0);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REWEAR_LISTEN", "127.0.0.1:8080"),
            ("REWEAR_STARTING_POINTS", "250"),
            ("REWEAR_ADMIN_EMAILS", " Admin@ReWear.io , ,ops@rewear.io"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.rules.starting_points, 250);
        assert!(config.is_admin_email("admin@rewear.io"));
        assert!(config.is_admin_email("OPS@rewear.io"));
        assert_eq!(config.admin_emails.len(), 2);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("REWEAR_SWAP_REWARD", "lots")])).unwrap_err();
        assert!(err.to_string().contains("REWEAR_SWAP_REWARD"));
    }

    #[test]
    fn test_password_cost_bounds() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])).unwrap().password_cost, 10);
        let config = AppConfig::from_lookup(lookup(&[("REWEAR_PASSWORD_COST", "4")])).unwrap();
        assert_eq!(config.password_cost, 4);
        assert!(AppConfig::from_lookup(lookup(&[("REWEAR_PASSWORD_COST", "3")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("REWEAR_PASSWORD_COST", "32")])).is_err());
    }
}
