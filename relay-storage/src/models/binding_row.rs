//! Reply binding row; `seq` preserves insertion order so eviction survives a restart.

use relay_core::{MessageRef, UserId};

use crate::error::StorageError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BindingRow {
    pub seq: i64,
    pub outbound_id: i64,
    pub user_id: i64,
}

impl BindingRow {
    /// Fails with [`StorageError::Corrupt`] when `outbound_id` does not fit a message id.
    pub fn into_binding(self) -> Result<(MessageRef, UserId), StorageError> {
        let outbound = i32::try_from(self.outbound_id).map_err(|_| {
            StorageError::Corrupt(format!(
                "binding {}: outbound id {} out of range",
                self.seq, self.outbound_id
            ))
        })?;
        Ok((MessageRef(outbound), UserId(self.user_id)))
    }
}
