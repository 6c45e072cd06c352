//! Row models for the snapshot tables.

mod binding_row;
mod persisted_stats;
mod user_row;

pub use binding_row::BindingRow;
pub use persisted_stats::PersistedStats;
pub use user_row::UserRow;
