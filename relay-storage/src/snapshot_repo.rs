//! Snapshot repository: the load/save hooks for relay state.
//!
//! A save replaces the stored state in one transaction; a load rebuilds a
//! [`RelaySnapshot`]. The relay core never touches the database itself.

use relay_core::{RelaySnapshot, UserRecord};
use tracing::{info, instrument};

use crate::error::StorageError;
use crate::models::{BindingRow, PersistedStats, UserRow};
use crate::sqlite_pool::SqlitePoolManager;

const ADMIN_ONLINE_KEY: &str = "admin_online";

#[derive(Clone)]
pub struct SnapshotRepository {
    pub(crate) pool_manager: SqlitePoolManager,
}

impl SnapshotRepository {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    pub(crate) async fn init(&self) -> Result<(), StorageError> {
        info!("Creating relay tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_users (
                id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                handle TEXT,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                flag TEXT NOT NULL DEFAULT 'none'
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reply_bindings (
                seq INTEGER PRIMARY KEY,
                outbound_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_relay_users_flag ON relay_users(flag)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Replaces everything stored with `snapshot`.
    #[instrument(skip(self, snapshot), fields(users = snapshot.users.len(), bindings = snapshot.bindings.len()))]
    pub async fn save(&self, snapshot: &RelaySnapshot) -> Result<(), StorageError> {
        let mut tx = self.pool_manager.pool().begin().await?;

        sqlx::query("DELETE FROM relay_users")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reply_bindings")
            .execute(&mut *tx)
            .await?;

        for user in &snapshot.users {
            let row = UserRow::from(user);
            sqlx::query(
                r#"
                INSERT INTO relay_users (id, display_name, handle, first_seen, last_seen, message_count, flag)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.id)
            .bind(&row.display_name)
            .bind(&row.handle)
            .bind(row.first_seen)
            .bind(row.last_seen)
            .bind(row.message_count)
            .bind(&row.flag)
            .execute(&mut *tx)
            .await?;
        }

        for (seq, (outbound, user)) in snapshot.bindings.iter().enumerate() {
            sqlx::query("INSERT INTO reply_bindings (seq, outbound_id, user_id) VALUES (?, ?, ?)")
                .bind(seq as i64)
                .bind(i64::from(outbound.0))
                .bind(user.0)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT OR REPLACE INTO relay_settings (key, value) VALUES (?, ?)")
            .bind(ADMIN_ONLINE_KEY)
            .bind(snapshot.admin_online.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Snapshot saved");
        Ok(())
    }

    /// Loads the stored state. An empty database yields the default snapshot.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<RelaySnapshot, StorageError> {
        let pool = self.pool_manager.pool();

        let users = sqlx::query_as::<_, UserRow>("SELECT * FROM relay_users ORDER BY id")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(UserRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let bindings = sqlx::query_as::<_, BindingRow>(
            "SELECT seq, outbound_id, user_id FROM reply_bindings ORDER BY seq",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(BindingRow::into_binding)
        .collect::<Result<Vec<_>, _>>()?;

        let admin_online: Option<(String,)> =
            sqlx::query_as("SELECT value FROM relay_settings WHERE key = ?")
                .bind(ADMIN_ONLINE_KEY)
                .fetch_optional(pool)
                .await?;
        let admin_online = match admin_online {
            Some((value,)) => value.parse::<bool>().map_err(|_| {
                StorageError::Corrupt(format!("{} = {}", ADMIN_ONLINE_KEY, value))
            })?,
            None => true,
        };

        info!(
            users = users.len(),
            bindings = bindings.len(),
            admin_online,
            "Snapshot loaded"
        );

        Ok(RelaySnapshot {
            users,
            bindings,
            admin_online,
        })
    }

    pub async fn stats(&self) -> Result<PersistedStats, StorageError> {
        let pool = self.pool_manager.pool();

        let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM relay_users")
            .fetch_one(pool)
            .await?;

        let banned: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM relay_users WHERE flag = 'banned'")
                .fetch_one(pool)
                .await?;

        let silenced: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM relay_users WHERE flag = 'silenced'")
                .fetch_one(pool)
                .await?;

        let messages: (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(message_count), 0) FROM relay_users")
                .fetch_one(pool)
                .await?;

        let bindings: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reply_bindings")
            .fetch_one(pool)
            .await?;

        Ok(PersistedStats {
            users: users.0,
            banned: banned.0,
            silenced: silenced.0,
            messages: messages.0,
            bindings: bindings.0,
        })
    }
}
