//! Profile ("about") text and display nicknames.
//!
//! Both relations hold at most one row per identity and are written with
//! upserts, so the last write wins and no history is kept.

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::PlayerStore;

impl PlayerStore {
    /// Replace the identity's profile text.
    #[instrument(skip(self, text))]
    pub async fn set_profile(&self, identity: Uuid, text: &str) -> StoreResult<()> {
        let text = text.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO about (about_uuid, about_about) VALUES (?1, ?2) \
                     ON CONFLICT(about_uuid) DO UPDATE SET about_about = excluded.about_about",
                    rusqlite::params![identity.to_string(), text],
                )?;
                debug!(%identity, "profile updated");
                Ok(())
            })
            .await
    }

    /// The identity's profile text, if one was ever set.
    #[instrument(skip(self))]
    pub async fn get_profile(&self, identity: Uuid) -> StoreResult<Option<String>> {
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT about_about FROM about WHERE about_uuid = ?1",
                    rusqlite::params![identity.to_string()],
                    |row| row.get(0),
                );
                match result {
                    Ok(text) => Ok(Some(text)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Set the identity's nickname.
    #[instrument(skip(self, nickname))]
    pub async fn set_nickname(&self, identity: Uuid, nickname: &str) -> StoreResult<()> {
        let nickname = nickname.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO nick (nick_uuid, nick_nick) VALUES (?1, ?2) \
                     ON CONFLICT(nick_uuid) DO UPDATE SET nick_nick = excluded.nick_nick",
                    rusqlite::params![identity.to_string(), nickname],
                )?;
                debug!(%identity, "nickname set");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_nickname(&self, identity: Uuid) -> StoreResult<Option<String>> {
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT nick_nick FROM nick WHERE nick_uuid = ?1",
                    rusqlite::params![identity.to_string()],
                    |row| row.get(0),
                );
                match result {
                    Ok(nickname) => Ok(Some(nickname)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Clear the identity's nickname, returning whether one was set.
    /// Removing a nickname that does not exist is not an error.
    #[instrument(skip(self))]
    pub async fn remove_nickname(&self, identity: Uuid) -> StoreResult<bool> {
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM nick WHERE nick_uuid = ?1",
                    rusqlite::params![identity.to_string()],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> PlayerStore {
        PlayerStore::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        let store = setup().await;
        assert!(store.get_profile(Uuid::from_u128(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_last_write_wins() {
        let store = setup().await;
        let u = Uuid::from_u128(1);

        store.set_profile(u, "x").await.unwrap();
        assert_eq!(store.get_profile(u).await.unwrap().as_deref(), Some("x"));

        store.set_profile(u, "y").await.unwrap();
        assert_eq!(store.get_profile(u).await.unwrap().as_deref(), Some("y"));

        let rows: i64 = store
            .database()
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM about", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn profiles_are_per_identity() {
        let store = setup().await;
        store.set_profile(Uuid::from_u128(1), "first").await.unwrap();
        store.set_profile(Uuid::from_u128(2), "second").await.unwrap();

        assert_eq!(
            store.get_profile(Uuid::from_u128(1)).await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn profile_text_is_stored_verbatim() {
        let store = setup().await;
        let u = Uuid::from_u128(1);
        let long = "é".repeat(600);
        store.set_profile(u, &long).await.unwrap();
        assert_eq!(store.get_profile(u).await.unwrap(), Some(long));
    }

    #[tokio::test]
    async fn nickname_set_get_overwrite() {
        let store = setup().await;
        let u = Uuid::from_u128(7);

        store.set_nickname(u, "<red>Seven").await.unwrap();
        store.set_nickname(u, "<blue>Seven").await.unwrap();
        assert_eq!(
            store.get_nickname(u).await.unwrap().as_deref(),
            Some("<blue>Seven")
        );
    }

    #[tokio::test]
    async fn remove_nickname_is_idempotent() {
        let store = setup().await;
        let u = Uuid::from_u128(7);

        assert!(!store.remove_nickname(u).await.unwrap());
        assert!(store.get_nickname(u).await.unwrap().is_none());

        store.set_nickname(u, "Seven").await.unwrap();
        assert!(store.remove_nickname(u).await.unwrap());
        assert!(store.get_nickname(u).await.unwrap().is_none());
        assert!(!store.remove_nickname(u).await.unwrap());
    }
}
