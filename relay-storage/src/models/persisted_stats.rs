//! Totals read straight from the database, without building relay state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedStats {
    pub users: i64,
    pub banned: i64,
    pub silenced: i64,
    pub messages: i64,
    pub bindings: i64,
}
