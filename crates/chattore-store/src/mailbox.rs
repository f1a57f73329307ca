//! Offline mail between identities.
//!
//! A [`MailItem`] starts [`MailState::Unread`] and becomes
//! [`MailState::Read`] the first time its recipient opens it by id. Items
//! are never deleted and never go back to unread.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::{PlayerStore, parse_identity};

/// Read state of a mail item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailState {
    Unread,
    Read,
}

/// A stored mail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    /// Row id, assigned in increasing order on send.
    pub id: i64,
    /// Unix timestamp (seconds) at which the item was sent.
    pub timestamp: i64,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub read: bool,
    pub message: String,
}

impl MailItem {
    pub fn state(&self) -> MailState {
        if self.read { MailState::Read } else { MailState::Unread }
    }
}

impl PlayerStore {
    /// Deliver `message` to `recipient`'s mailbox as unread. Returns the
    /// new item's id.
    #[instrument(skip(self, message))]
    pub async fn send_message(
        &self,
        sender: Uuid,
        recipient: Uuid,
        message: &str,
    ) -> StoreResult<i64> {
        let message = message.to_string();
        let now = Utc::now().timestamp();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO mail (mail_timestamp, mail_sender, mail_recipient, mail_message) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![now, sender.to_string(), recipient.to_string(), message],
                )?;
                let id = conn.last_insert_rowid();
                debug!(id, %sender, %recipient, "mail sent");
                Ok(id)
            })
            .await
    }

    /// Every item addressed to `recipient`, newest first. Items sent in
    /// the same second are ordered by id. Does not change read state.
    #[instrument(skip(self))]
    pub async fn list_messages(&self, recipient: Uuid) -> StoreResult<Vec<MailItem>> {
        let rows: Vec<(i64, i64, String, bool, String)> = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT mail_id, mail_timestamp, mail_sender, mail_read, mail_message \
                     FROM mail WHERE mail_recipient = ?1 \
                     ORDER BY mail_timestamp DESC, mail_id DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![recipient.to_string()], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, timestamp, sender, read, message)| {
                Ok(MailItem {
                    id,
                    timestamp,
                    sender: parse_identity(&sender)?,
                    recipient,
                    read,
                    message,
                })
            })
            .collect()
    }

    /// Open item `id` from `recipient`'s mailbox, marking it read.
    ///
    /// Returns `(sender, message)`, or `None` when no item with that id is
    /// addressed to `recipient`; the two cases are indistinguishable so
    /// ids do not leak other mailboxes. Lookup and mark happen in one
    /// transaction.
    #[instrument(skip(self))]
    pub async fn read_message(&self, recipient: Uuid, id: i64) -> StoreResult<Option<(Uuid, String)>> {
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let found = tx.query_row(
                    "SELECT mail_sender, mail_message FROM mail \
                     WHERE mail_id = ?1 AND mail_recipient = ?2",
                    rusqlite::params![id, recipient.to_string()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                );
                let (sender, message) = match found {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let sender = parse_identity(&sender)?;

                tx.execute(
                    "UPDATE mail SET mail_read = 1 WHERE mail_id = ?1",
                    rusqlite::params![id],
                )?;
                tx.commit()?;
                debug!(id, %recipient, "mail read");
                Ok(Some((sender, message)))
            })
            .await
    }

    /// Number of unread items addressed to `recipient`.
    #[instrument(skip(self))]
    pub async fn unread_count(&self, recipient: Uuid) -> StoreResult<u64> {
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM mail WHERE mail_recipient = ?1 AND mail_read = 0",
                    rusqlite::params![recipient.to_string()],
                    |row| row.get(0),
                )?;
                Ok(count.max(0) as u64)
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

    async fn insert_at(store: &PlayerStore, timestamp: i64, sender: Uuid, recipient: Uuid, text: &str) -> i64 {
        let text = text.to_string();
        store
            .database()
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO mail (mail_timestamp, mail_sender, mail_recipient, mail_message) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![timestamp, sender.to_string(), recipient.to_string(), text],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn send_creates_unread_item() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));

        let before = Utc::now().timestamp();
        let id = store.send_message(a, b, "hi").await.unwrap();
        let items = store.list_messages(b).await.unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, id);
        assert_eq!(item.sender, a);
        assert_eq!(item.recipient, b);
        assert_eq!(item.message, "hi");
        assert_eq!(item.state(), MailState::Unread);
        assert!(item.timestamp >= before);
    }

    #[tokio::test]
    async fn ids_strictly_increase() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let first = store.send_message(a, b, "one").await.unwrap();
        let second = store.send_message(b, a, "two").await.unwrap();
        let third = store.send_message(a, b, "three").await.unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        // Inserted out of order to make sure ordering comes from timestamps.
        insert_at(&store, 200, a, b, "t2").await;
        insert_at(&store, 100, a, b, "t1").await;
        insert_at(&store, 300, a, b, "t3").await;

        let texts: Vec<String> = store
            .list_messages(b)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, ["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn same_second_sends_list_newest_first() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        for text in ["one", "two", "three"] {
            insert_at(&store, 500, a, b, text).await;
        }
        let items = store.list_messages(b).await.unwrap();
        assert_eq!(items[0].message, "three");
        assert_eq!(items[2].message, "one");
    }

    #[tokio::test]
    async fn read_marks_item_and_is_repeatable() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let id = store.send_message(a, b, "hi").await.unwrap();
        assert_eq!(store.unread_count(b).await.unwrap(), 1);

        let opened = store.read_message(b, id).await.unwrap();
        assert_eq!(opened, Some((a, "hi".to_string())));
        assert!(store.list_messages(b).await.unwrap()[0].read);

        let again = store.read_message(b, id).await.unwrap();
        assert_eq!(again, Some((a, "hi".to_string())));
        assert_eq!(store.list_messages(b).await.unwrap()[0].state(), MailState::Read);
        assert_eq!(store.unread_count(b).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn other_recipient_cannot_read() {
        let store = setup().await;
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        let id = store.send_message(a, b, "for b only").await.unwrap();

        assert!(store.read_message(c, id).await.unwrap().is_none());
        assert!(!store.list_messages(b).await.unwrap()[0].read);
        assert!(store.read_message(b, id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_does_not_mark_read() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        store.send_message(a, b, "one").await.unwrap();
        store.list_messages(b).await.unwrap();
        store.list_messages(b).await.unwrap();
        assert_eq!(store.unread_count(b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unread_count_matches_filtered_listing() {
        let store = setup().await;
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let first = store.send_message(a, b, "one").await.unwrap();
        store.send_message(a, b, "two").await.unwrap();
        store.send_message(a, b, "three").await.unwrap();
        store.send_message(b, a, "reply").await.unwrap();
        store.read_message(b, first).await.unwrap();

        let filtered = store
            .list_messages(b)
            .await
            .unwrap()
            .iter()
            .filter(|m| !m.read)
            .count() as u64;
        assert_eq!(store.unread_count(b).await.unwrap(), filtered);
        assert_eq!(filtered, 2);
    }

    #[tokio::test]
    async fn empty_mailbox_lists_nothing() {
        let store = setup().await;
        assert!(store.list_messages(Uuid::from_u128(5)).await.unwrap().is_empty());
        assert_eq!(store.unread_count(Uuid::from_u128(5)).await.unwrap(), 0);
    }
}
