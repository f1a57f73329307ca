//! Error types for the chattore-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! A missing row is never an error: lookups return `Option::None`.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the player-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed or a unit of work could not commit.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A setting value could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The setting key is not registered with the codec.
    #[error("unsupported setting kind: {key}")]
    UnsupportedKind { key: String },

    /// Stored setting bytes do not decode as the requested kind.
    #[error("cannot decode setting `{key}`: {message}")]
    Decode { key: String, message: String },

    /// An identity column holds something that is not a UUID.
    #[error("invalid identity in store: {value}")]
    InvalidIdentity { value: String },

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A blocking task was cancelled or panicked, or the connection mutex
    /// was poisoned.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether this error means the backing store could not complete the
    /// unit of work (as opposed to a problem with the data itself).
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::TaskJoin(_) | Self::Migration { .. }
        )
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_classified() {
        let err = StoreError::TaskJoin("mutex poisoned".into());
        assert!(err.is_storage_unavailable());

        let err = StoreError::Decode {
            key: "spy".into(),
            message: "expected bool".into(),
        };
        assert!(!err.is_storage_unavailable());
        assert_eq!(err.to_string(), "cannot decode setting `spy`: expected bool");
    }
}
