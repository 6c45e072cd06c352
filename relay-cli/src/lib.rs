//! relay-bot CLI: `run` serves the relay, `stats` reads persisted totals.

pub mod app;
pub mod cli;

pub use app::{print_stats, run_relay, save_snapshot, spawn_snapshot_loop};
pub use cli::{load_config, Cli, Commands};
