//! Server configuration, read from `.env` and the process environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 30;
const DEFAULT_PASSWORD_RESET_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// How long a bearer token stays valid after login.
    pub token_lifetime: Duration,
    /// How long a password reset token stays valid after it is requested.
    pub password_reset_lifetime: Duration,
    pub bcrypt_cost: u32,
    /// The CORS origin to allow. Any origin is allowed when unset.
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    database_url: String,
    bind_address: Option<String>,
    token_lifetime_days: Option<i64>,
    password_reset_lifetime_hours: Option<i64>,
    bcrypt_cost: Option<u32>,
    allowed_origin: Option<String>,
}

impl Config {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            token_lifetime: Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS),
            password_reset_lifetime: Duration::hours(DEFAULT_PASSWORD_RESET_LIFETIME_HOURS),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allowed_origin: None,
        }
    }

    /// Loads `.env` (if present) and then the environment. Environment
    /// variables win over the `.env` file.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let raw: RawConfig = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration from the environment")?
            .try_deserialize()
            .context("`DATABASE_URL` must be set")?;

        let mut config = Self::new(raw.database_url);
        if let Some(bind_address) = raw.bind_address {
            config.bind_address = bind_address;
        }
        if let Some(days) = raw.token_lifetime_days {
            config = config.with_token_lifetime(Duration::days(days));
        }
        if let Some(hours) = raw.password_reset_lifetime_hours {
            config.password_reset_lifetime = Duration::hours(hours);
        }
        if let Some(cost) = raw.bcrypt_cost {
            config = config.with_bcrypt_cost(cost);
        }
        config.allowed_origin = raw.allowed_origin;

        Ok(config)
    }

    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }
}
