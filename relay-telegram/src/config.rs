//! Relay bot configuration, loaded from environment variables (after `dotenvy::dotenv()`).
//!
//! `BOT_TOKEN` and `OWNER_ID` are required; everything else has a default.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Duration;
use relay_core::{RelayConfig, UserId, DEFAULT_BINDING_CAPACITY, DEFAULT_DEBOUNCE_MS};

use crate::transport::ForwardMode;

pub const DEFAULT_DATABASE_URL: &str = "./relay_bot.db";
pub const DEFAULT_LOG_FILE: &str = "logs/relay-bot.log";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RelayBotConfig {
    pub bot_token: String,
    /// The operator's Telegram user id.
    pub operator_id: i64,
    /// Bot API base URL override (`TELEGRAM_API_URL` or `TELOXIDE_API_URL`), e.g. a mock server.
    pub telegram_api_url: Option<String>,
    pub database_url: String,
    pub log_file: String,
    /// Liveness endpoint port.
    pub port: u16,
    pub debounce_ms: i64,
    pub binding_capacity: usize,
    pub forward_mode: ForwardMode,
    /// `RELAY_SENDER_HEADER`: announce the sender before each relayed message.
    pub sender_header: bool,
    pub snapshot_interval_secs: u64,
}

impl RelayBotConfig {
    /// Loads from the environment. `token` overrides `BOT_TOKEN` when given.
    pub fn from_env(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow!("BOT_TOKEN not set"))?,
        };
        let operator_id = env::var("OWNER_ID")
            .map_err(|_| anyhow!("OWNER_ID not set"))?
            .trim()
            .parse::<i64>()
            .context("OWNER_ID must be a numeric Telegram user id")?;
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

        let config = Self {
            bot_token,
            operator_id,
            telegram_api_url,
            database_url,
            log_file,
            port: parse_var("PORT", DEFAULT_PORT)?,
            debounce_ms: parse_var("RELAY_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
            binding_capacity: parse_var("RELAY_BINDING_CAPACITY", DEFAULT_BINDING_CAPACITY)?,
            forward_mode: parse_var("RELAY_FORWARD_MODE", ForwardMode::Forward)?,
            sender_header: parse_var("RELAY_SENDER_HEADER", true)?,
            snapshot_interval_secs: parse_var(
                "SNAPSHOT_INTERVAL_SECS",
                DEFAULT_SNAPSHOT_INTERVAL_SECS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            bail!("BOT_TOKEN is empty");
        }
        if self.operator_id <= 0 {
            bail!("OWNER_ID must be a positive user id, got {}", self.operator_id);
        }
        if self.debounce_ms < 0 {
            bail!("RELAY_DEBOUNCE_MS must not be negative");
        }
        if self.snapshot_interval_secs == 0 {
            bail!("SNAPSHOT_INTERVAL_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new(UserId(self.operator_id))
            .with_debounce(Duration::milliseconds(self.debounce_ms))
            .with_binding_capacity(self.binding_capacity)
            .with_sender_header(self.sender_header)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", name, raw, e)),
        _ => Ok(default),
    }
}
