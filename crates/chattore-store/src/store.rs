//! The [`PlayerStore`] façade.
//!
//! One handle owns the SQLite connection and the username cache. The
//! per-relation operations live in sibling modules as further `impl
//! PlayerStore` blocks; each public operation is one unit of work on the
//! connection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::StoreSection;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::schema;
use crate::username_cache::{UsernameCache, UsernameSnapshot};

/// Persistent per-identity player state.
#[derive(Clone)]
pub struct PlayerStore {
    pub(crate) db: Database,
    pub(crate) usernames: UsernameCache,
}

/// Row counts per relation, for operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub schema_version: u32,
    pub profiles: u64,
    pub nicknames: u64,
    pub usernames: u64,
    pub settings: u64,
    pub mail: u64,
    pub unread_mail: u64,
}

impl PlayerStore {
    /// Open the configured store file, migrate it, and prime the username
    /// cache unless the config turns that off.
    pub async fn open(config: &StoreSection) -> StoreResult<Self> {
        let path = config.database_path.clone();
        let busy_timeout_ms = config.busy_timeout_ms;
        let db = tokio::task::spawn_blocking(move || Database::open(&path, busy_timeout_ms))
            .await??;
        Self::with_database(db, config.prime_username_cache).await
    }

    /// A migrated, empty in-memory store.
    pub async fn open_in_memory() -> StoreResult<Self> {
        Self::with_database(Database::open_in_memory()?, true).await
    }

    /// Wrap an already open database, running pending migrations first.
    pub async fn with_database(db: Database, prime_username_cache: bool) -> StoreResult<Self> {
        db.run_migrations().await?;
        let store = Self {
            db,
            usernames: UsernameCache::new(),
        };
        if prime_username_cache {
            let snapshot = store.refresh_username_cache().await?;
            info!(entries = snapshot.len(), "username cache primed");
        }
        Ok(store)
    }

    /// The underlying connection handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Schema version and row counts.
    #[instrument(skip(self))]
    pub async fn status(&self) -> StoreResult<StoreStatus> {
        self.db
            .execute(|conn| {
                let count = |sql: &str| -> StoreResult<u64> {
                    Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))?.max(0) as u64)
                };
                Ok(StoreStatus {
                    schema_version: schema::current_version(conn)?,
                    profiles: count("SELECT COUNT(*) FROM about")?,
                    nicknames: count("SELECT COUNT(*) FROM nick")?,
                    usernames: count("SELECT COUNT(*) FROM username_cache")?,
                    settings: count("SELECT COUNT(*) FROM setting")?,
                    mail: count("SELECT COUNT(*) FROM mail")?,
                    unread_mail: count("SELECT COUNT(*) FROM mail WHERE mail_read = 0")?,
                })
            })
            .await
    }

    /// The latest username snapshot, for several lookups against one
    /// consistent generation.
    pub fn username_snapshot(&self) -> Arc<UsernameSnapshot> {
        self.usernames.snapshot()
    }
}

/// Parse an identity column back into a [`Uuid`].
pub(crate) fn parse_identity(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| StoreError::InvalidIdentity {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_store_reports_empty_status() {
        let store = PlayerStore::open_in_memory().await.unwrap();
        let status = store.status().await.unwrap();
        assert_eq!(status.schema_version, schema::latest_version());
        assert_eq!(
            status,
            StoreStatus {
                schema_version: status.schema_version,
                ..StoreStatus::default()
            }
        );
    }

    #[test]
    fn parse_identity_rejects_garbage() {
        assert!(parse_identity("2b7bbe0c-5f5a-4b8e-9d55-2c8f0a8e3f11").is_ok());
        assert!(matches!(
            parse_identity("Notch"),
            Err(StoreError::InvalidIdentity { value }) if value == "Notch"
        ));
    }
}
