//! User row model. Maps to the `relay_users` table.

use chrono::{DateTime, Utc};
use relay_core::{ModerationFlag, UserId, UserRecord};

use crate::error::StorageError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub handle: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: i64,
    pub flag: String,
}

impl From<&UserRecord> for UserRow {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.0,
            display_name: user.display_name.clone(),
            handle: user.handle.clone(),
            first_seen: user.first_seen,
            last_seen: user.last_seen,
            message_count: i64::try_from(user.message_count).unwrap_or(i64::MAX),
            flag: user.flag.as_str().to_string(),
        }
    }
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let flag: ModerationFlag = row
            .flag
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("user {}: {}", row.id, e)))?;
        Ok(UserRecord {
            id: UserId(row.id),
            display_name: row.display_name,
            handle: row.handle,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            message_count: u64::try_from(row.message_count).unwrap_or(0),
            flag,
        })
    }
}
