//! # relay-telegram
//!
//! Telegram side of the relay: [`TelegramTransport`] (teloxide implementation of
//! [`relay_core::Transport`]), adapters from teloxide types, env config, the dispatcher runner
//! and the liveness endpoint. No relay logic lives here.

mod adapters;
mod config;
mod health;
mod runner;
mod transport;

pub use adapters::{callback_to_event, TelegramMessageWrapper, TelegramUserWrapper};
pub use config::{
    RelayBotConfig, DEFAULT_DATABASE_URL, DEFAULT_LOG_FILE, DEFAULT_PORT,
    DEFAULT_SNAPSHOT_INTERVAL_SECS,
};
pub use health::{liveness_router, serve_liveness, LIVENESS_BODY};
pub use runner::run_dispatcher;
pub use transport::{menu_keyboard, ForwardMode, TelegramTransport};

use anyhow::{Context, Result};

/// Creates the teloxide Bot, pointing it at `telegram_api_url` when configured.
pub fn build_bot(config: &RelayBotConfig) -> Result<teloxide::Bot> {
    let bot = teloxide::Bot::new(config.bot_token.clone());
    match &config.telegram_api_url {
        Some(url) => {
            let url = reqwest::Url::parse(url)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", url))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}
