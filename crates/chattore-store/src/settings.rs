//! Typed per-identity settings.
//!
//! The store routes opaque bytes keyed by `(identity, key)`; the
//! [`codec`](crate::codec) module owns what the bytes mean. Rows whose
//! payload no longer decodes are reported, never deleted.

use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::codec::{self, RawSetting, Setting, SpySetting};
use crate::error::StoreResult;
use crate::store::PlayerStore;

const UPSERT_SETTING: &str = "INSERT INTO setting (setting_uuid, setting_key, setting_value) \
     VALUES (?1, ?2, ?3) \
     ON CONFLICT(setting_uuid, setting_key) DO UPDATE SET setting_value = excluded.setting_value";

fn raw_value(conn: &Connection, identity: &Uuid, key: &str) -> StoreResult<Option<Vec<u8>>> {
    let result = conn.query_row(
        "SELECT setting_value FROM setting WHERE setting_uuid = ?1 AND setting_key = ?2",
        rusqlite::params![identity.to_string(), key],
        |row| row.get(0),
    );
    match result {
        Ok(bytes) => Ok(Some(bytes)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl PlayerStore {
    /// Store `value` under its kind's key, replacing any previous value.
    #[instrument(skip(self, value), fields(key = codec::key_for::<T>()))]
    pub async fn set_setting<T: Setting>(&self, identity: Uuid, value: &T) -> StoreResult<()> {
        let key = codec::key_for::<T>();
        let bytes = codec::encode(value)?;
        self.db
            .execute(move |conn| {
                conn.execute(UPSERT_SETTING, rusqlite::params![identity.to_string(), key, bytes])?;
                debug!(%identity, key, "setting stored");
                Ok(())
            })
            .await
    }

    /// The identity's value of setting `T`, or `None` if it was never set.
    ///
    /// Fails with [`StoreError::Decode`](crate::StoreError::Decode) when the
    /// stored bytes do not fit `T`.
    #[instrument(skip(self), fields(key = codec::key_for::<T>()))]
    pub async fn get_setting<T: Setting>(&self, identity: Uuid) -> StoreResult<Option<T>> {
        let key = codec::key_for::<T>();
        let bytes = self
            .db
            .execute(move |conn| raw_value(conn, &identity, key))
            .await?;
        bytes.map(|b| codec::decode::<T>(key, &b)).transpose()
    }

    /// The untouched stored bytes for `key`.
    #[instrument(skip(self))]
    pub async fn get_raw_setting(&self, identity: Uuid, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| raw_value(conn, &identity, &key))
            .await
    }

    /// Every setting stored for the identity, keyed by setting key.
    ///
    /// Values are generic JSON so keys this build does not know about are
    /// still listed; decode each with [`RawSetting::decode`]. A row whose
    /// bytes are not JSON shows up as its own `Decode` error and does not
    /// hide the others.
    #[instrument(skip(self))]
    pub async fn get_all_settings(
        &self,
        identity: Uuid,
    ) -> StoreResult<BTreeMap<String, StoreResult<RawSetting>>> {
        let rows: Vec<(String, Vec<u8>)> = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT setting_key, setting_value FROM setting WHERE setting_uuid = ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![identity.to_string()], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(key, bytes)| {
                let raw = RawSetting::from_bytes(key.clone(), &bytes);
                if let Err(e) = &raw {
                    warn!(%identity, %key, error = %e, "stored setting is not valid JSON");
                }
                (key, raw)
            })
            .collect())
    }

    /// Delete the setting stored under `key`, returning whether it existed.
    #[instrument(skip(self))]
    pub async fn unset_setting(&self, identity: Uuid, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM setting WHERE setting_uuid = ?1 AND setting_key = ?2",
                    rusqlite::params![identity.to_string(), key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Flip the identity's command-spy flag and return the new state.
    ///
    /// An unset flag counts as off. The read and the write share one
    /// transaction.
    #[instrument(skip(self))]
    pub async fn toggle_spy(&self, identity: Uuid) -> StoreResult<bool> {
        let key = codec::key_for::<SpySetting>();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let current = raw_value(&tx, &identity, key)?
                    .map(|b| codec::decode::<SpySetting>(key, &b))
                    .transpose()?
                    .unwrap_or_default();
                let next = SpySetting {
                    enabled: !current.enabled,
                };
                tx.execute(
                    UPSERT_SETTING,
                    rusqlite::params![identity.to_string(), key, codec::encode(&next)?],
                )?;
                tx.commit()?;
                debug!(%identity, enabled = next.enabled, "spy toggled");
                Ok(next.enabled)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
