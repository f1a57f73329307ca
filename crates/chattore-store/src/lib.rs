//! # chattore-store
//!
//! Per-identity player state for the chattore chat proxy: profile text,
//! nicknames, typed settings, a username ⇄ identity index and an offline
//! mailbox, persisted in one SQLite file.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  PlayerStore (profile, settings, usernames,  │
//! │               mailbox operations)            │
//! ├──────────────────────┬──────────────────────┤
//! │  UsernameCache       │  codec (typed        │
//! │  (Arc snapshot swap) │  settings ⇄ JSON)    │
//! ├──────────────────────┴──────────────────────┤
//! │  Database (rusqlite, WAL, one connection)    │
//! │  schema (versioned, transactional)           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use chattore_store::{PlayerStore, SpySetting, StoreConfig};
//!
//! let config = StoreConfig::load("config/default.toml")?;
//! let store = PlayerStore::open(&config.store).await?;
//! store.ensure_cached_username(player, "Alice").await?;
//! store.set_setting(player, &SpySetting { enabled: true }).await?;
//! let unread = store.unread_count(player).await?;
//! ```

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod mailbox;
pub mod profile;
pub mod schema;
pub mod settings;
pub mod store;
pub mod username_cache;
pub mod usernames;

// ── re-exports ───────────────────────────────────────────────────────

pub use codec::{AnySetting, RawSetting, Setting, SettingKind, SpySetting};
pub use config::{LoggingSection, StoreConfig, StoreSection};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use mailbox::{MailItem, MailState};
pub use store::{PlayerStore, StoreStatus};
pub use username_cache::{UsernameCache, UsernameSnapshot};
pub use usernames::{LoginOutcome, USERNAME_PLACEHOLDER};
