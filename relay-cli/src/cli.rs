//! CLI parser and config loading.

use anyhow::Result;
use clap::{Parser, Subcommand};
use relay_telegram::RelayBotConfig;

#[derive(Parser, Debug)]
#[command(name = "relay-bot")]
#[command(about = "Single-operator Telegram relay bot", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the relay (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Print persisted totals from the database without contacting Telegram.
    Stats {
        /// Defaults to DATABASE_URL, then ./relay_bot.db.
        #[arg(short, long)]
        database_url: Option<String>,
    },
}

/// Load RelayBotConfig from environment. If `token` is provided it overrides BOT_TOKEN.
pub fn load_config(token: Option<String>) -> Result<RelayBotConfig> {
    RelayBotConfig::from_env(token)
}
