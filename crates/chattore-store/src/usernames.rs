//! Last-known usernames and the in-memory index built from them.

use std::sync::Arc;

use rusqlite::Connection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::{PlayerStore, parse_identity};
use crate::username_cache::UsernameSnapshot;

/// A nickname containing this marker is rendered with the player's current
/// username, so it survives renames.
pub const USERNAME_PLACEHOLDER: &str = "<username>";

/// What [`PlayerStore::record_login`] observed and changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Username stored for the identity before this login, if any.
    pub previous_username: Option<String>,
    /// Whether the nickname was removed because of a rename.
    pub nickname_cleared: bool,
    /// Unread mail waiting for the identity.
    pub unread: u64,
}

impl LoginOutcome {
    /// Whether the identity logged in under a different name than last time.
    pub fn renamed(&self, username: &str) -> bool {
        self.previous_username
            .as_deref()
            .is_some_and(|previous| previous != username)
    }
}

/// Every `(identity, username)` row, oldest write first so that a later
/// row takes over a shared username.
fn scan_usernames(conn: &Connection) -> StoreResult<Vec<(Uuid, String)>> {
    let mut stmt =
        conn.prepare("SELECT cache_user, cache_username FROM username_cache ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(identity, username)| Ok((parse_identity(&identity)?, username)))
        .collect()
}

/// Upsert the identity's username and return the full relation afterwards.
fn store_username(conn: &Connection, identity: &Uuid, username: &str) -> StoreResult<Vec<(Uuid, String)>> {
    // DELETE + INSERT moves the row to the end of the rowid order,
    // which is what makes the newest login win a shared name.
    conn.execute(
        "DELETE FROM username_cache WHERE cache_user = ?1",
        rusqlite::params![identity.to_string()],
    )?;
    conn.execute(
        "INSERT INTO username_cache (cache_user, cache_username) VALUES (?1, ?2)",
        rusqlite::params![identity.to_string(), username],
    )?;
    scan_usernames(conn)
}

fn stored_username(conn: &Connection, identity: &Uuid) -> StoreResult<Option<String>> {
    let result = conn.query_row(
        "SELECT cache_username FROM username_cache WHERE cache_user = ?1",
        rusqlite::params![identity.to_string()],
        |row| row.get(0),
    );
    match result {
        Ok(username) => Ok(Some(username)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl PlayerStore {
    /// Record `username` as the identity's latest name and rebuild the
    /// in-memory index from the whole relation.
    ///
    /// The upsert and the scan share one transaction, and the new snapshot
    /// is published before the connection is released, so lookups made
    /// after this returns see the write.
    #[instrument(skip(self))]
    pub async fn ensure_cached_username(
        &self,
        identity: Uuid,
        username: &str,
    ) -> StoreResult<Arc<UsernameSnapshot>> {
        let username = username.to_string();
        let cache = self.usernames.clone();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let rows = store_username(&tx, &identity, &username)?;
                tx.commit()?;
                debug!(%identity, %username, "username cached");
                Ok(cache.publish(rows))
            })
            .await
    }

    /// Handle a player joining under `username`.
    ///
    /// Caches the username like [`ensure_cached_username`](Self::ensure_cached_username)
    /// and counts unread mail. When `clear_nickname_on_change` is set and
    /// the stored username differs from `username`, the nickname is removed
    /// unless it contains [`USERNAME_PLACEHOLDER`]. A first login is never a
    /// rename. Everything runs in one transaction.
    #[instrument(skip(self))]
    pub async fn record_login(
        &self,
        identity: Uuid,
        username: &str,
        clear_nickname_on_change: bool,
    ) -> StoreResult<LoginOutcome> {
        let username = username.to_string();
        let cache = self.usernames.clone();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let previous_username = stored_username(&tx, &identity)?;
                let renamed = previous_username
                    .as_deref()
                    .is_some_and(|previous| previous != username);

                let nickname_cleared = if clear_nickname_on_change && renamed {
                    let deleted = tx.execute(
                        "DELETE FROM nick WHERE nick_uuid = ?1 AND instr(nick_nick, ?2) = 0",
                        rusqlite::params![identity.to_string(), USERNAME_PLACEHOLDER],
                    )?;
                    deleted > 0
                } else {
                    false
                };

                let rows = store_username(&tx, &identity, &username)?;
                let unread: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM mail WHERE mail_recipient = ?1 AND mail_read = 0",
                    rusqlite::params![identity.to_string()],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                cache.publish(rows);

                if renamed {
                    info!(
                        %identity,
                        previous = previous_username.as_deref().unwrap_or_default(),
                        %username,
                        nickname_cleared,
                        "player renamed"
                    );
                }
                Ok(LoginOutcome {
                    previous_username,
                    nickname_cleared,
                    unread: unread.max(0) as u64,
                })
            })
            .await
    }

    /// Rebuild the in-memory index from disk without writing anything.
    #[instrument(skip(self))]
    pub async fn refresh_username_cache(&self) -> StoreResult<Arc<UsernameSnapshot>> {
        let cache = self.usernames.clone();
        self.db
            .execute(move |conn| {
                let rows = scan_usernames(conn)?;
                Ok(cache.publish(rows))
            })
            .await
    }

    /// The identity's last-known username, from memory.
    pub fn lookup_username(&self, identity: &Uuid) -> Option<String> {
        self.usernames.lookup_username(identity)
    }

    /// The identity that last logged in as `username`, from memory.
    pub fn lookup_identity(&self, username: &str) -> Option<Uuid> {
        self.usernames.lookup_identity(username)
    }
}
