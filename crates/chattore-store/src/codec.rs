//! Typed setting codec.
//!
//! Settings are stored as `(identity, key, blob)` rows so new kinds never
//! need a schema change. Each kind is registered twice, both resolved at
//! compile time:
//!
//! - a variant of the closed [`SettingKind`] enum, which owns the stable
//!   on-disk key string;
//! - a type implementing [`Setting`], which names its variant through an
//!   associated constant and carries the serde shape.
//!
//! Payloads are JSON. Unknown fields are ignored on decode, so adding a
//! field to a setting struct does not invalidate rows written before it.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

// ── registration table ───────────────────────────────────────────────

/// Every setting kind this build understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    /// Command spy: see other players' commands as they run them.
    Spy,
}

impl SettingKind {
    /// All registered kinds, in declaration order.
    pub const ALL: &'static [SettingKind] = &[SettingKind::Spy];

    /// Stable short key stored in the `setting_key` column.
    pub fn key(self) -> &'static str {
        match self {
            Self::Spy => SpySetting::KEY,
        }
    }

    /// Resolve a stored key back to its kind.
    pub fn from_key(key: &str) -> StoreResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| StoreError::UnsupportedKind {
                key: key.to_string(),
            })
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A typed, persistable player setting.
pub trait Setting: Serialize + DeserializeOwned + Send + 'static {
    /// The registered kind this type encodes.
    const KIND: SettingKind;
}

/// Key under which values of `T` are stored.
pub fn key_for<T: Setting>() -> &'static str {
    T::KIND.key()
}

// ── registered kinds ─────────────────────────────────────────────────

/// Whether a player sees other players' commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpySetting {
    pub enabled: bool,
}

impl SpySetting {
    pub const KEY: &'static str = "spy";
}

impl Setting for SpySetting {
    const KIND: SettingKind = SettingKind::Spy;
}

/// Any registered setting, as a tagged variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AnySetting {
    Spy(SpySetting),
}

impl AnySetting {
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::Spy(_) => SettingKind::Spy,
        }
    }

    /// Decode a generic value by dispatching on its key.
    ///
    /// Fails with [`StoreError::UnsupportedKind`] when the key is not
    /// registered in this build.
    pub fn from_raw(raw: &RawSetting) -> StoreResult<Self> {
        match SettingKind::from_key(&raw.key)? {
            SettingKind::Spy => raw.decode::<SpySetting>().map(Self::Spy),
        }
    }
}

impl fmt::Display for AnySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spy(s) => write!(f, "spy: {}", if s.enabled { "on" } else { "off" }),
        }
    }
}

// ── encode / decode ──────────────────────────────────────────────────

/// Serialize a setting to its stored byte payload.
pub fn encode<T: Setting>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a stored payload as `T`.
///
/// `key` is the key the row was stored under; a payload written for a
/// different kind is rejected even if its JSON happens to fit `T`.
pub fn decode<T: Setting>(key: &str, bytes: &[u8]) -> StoreResult<T> {
    check_key::<T>(key)?;
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn check_key<T: Setting>(key: &str) -> StoreResult<()> {
    if key != key_for::<T>() {
        return Err(StoreError::Decode {
            key: key.to_string(),
            message: format!("payload was stored as `{key}`, not `{}`", key_for::<T>()),
        });
    }
    Ok(())
}

/// A stored setting whose concrete kind has not been chosen yet.
///
/// Returned by listing operations so rows can be inspected without every
/// kind being known up front; [`RawSetting::decode`] commits to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSetting {
    pub key: String,
    pub value: serde_json::Value,
}

impl RawSetting {
    /// Parse stored bytes as generic JSON.
    pub fn from_bytes(key: impl Into<String>, bytes: &[u8]) -> StoreResult<Self> {
        let key = key.into();
        let value = serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
            key: key.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { key, value })
    }

    /// Whether this key is registered in this build.
    pub fn is_known(&self) -> bool {
        SettingKind::from_key(&self.key).is_ok()
    }

    pub fn decode<T: Setting>(&self) -> StoreResult<T> {
        check_key::<T>(&self.key)?;
        T::deserialize(&self.value).map_err(|e| StoreError::Decode {
            key: self.key.clone(),
            message: e.to_string(),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
