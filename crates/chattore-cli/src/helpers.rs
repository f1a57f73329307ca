//! Shared helper functions used across CLI subcommands.

use anyhow::{Result, bail};
use chattore_store::PlayerStore;
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Resolve a player argument: a UUID, or a username known to the cache.
pub fn resolve_player(store: &PlayerStore, arg: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(arg) {
        return Ok(uuid);
    }
    match store.lookup_identity(arg) {
        Some(uuid) => Ok(uuid),
        None => bail!("`{arg}` is neither a UUID nor a cached username"),
    }
}

/// A player for display: cached username when known, UUID otherwise.
pub fn display_player(store: &PlayerStore, uuid: &Uuid) -> String {
    store
        .lookup_username(uuid)
        .unwrap_or_else(|| uuid.to_string())
}

/// Format a Unix timestamp for mailbox listings.
pub fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_uuid_and_cached_name() {
        let store = PlayerStore::open_in_memory().await.unwrap();
        let u = Uuid::from_u128(42);
        store.ensure_cached_username(u, "Answer").await.unwrap();

        assert_eq!(resolve_player(&store, &u.to_string()).unwrap(), u);
        assert_eq!(resolve_player(&store, "Answer").unwrap(), u);
        assert!(resolve_player(&store, "Nobody").is_err());
        assert_eq!(display_player(&store, &u), "Answer");
        assert_eq!(
            display_player(&store, &Uuid::from_u128(1)),
            Uuid::from_u128(1).to_string()
        );
    }

    #[test]
    fn timestamps_format_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13");
    }
}
