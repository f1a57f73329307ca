//! In-memory identity ⇄ username index.
//!
//! The index is derived state: every publication is a full rebuild from
//! the `username_cache` relation, packed into an immutable
//! [`UsernameSnapshot`] and swapped in behind a single `Arc`. A reader
//! holding a snapshot always sees both directions from the same scan.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use uuid::Uuid;

/// One consistent generation of the username index.
#[derive(Debug, Default)]
pub struct UsernameSnapshot {
    generation: u64,
    by_identity: HashMap<Uuid, String>,
    by_username: HashMap<String, Uuid>,
}

impl UsernameSnapshot {
    /// Build both directions from `(identity, username)` rows.
    ///
    /// If several identities share a username, the last row wins the
    /// reverse mapping.
    pub fn from_rows(generation: u64, rows: impl IntoIterator<Item = (Uuid, String)>) -> Self {
        let mut by_identity = HashMap::new();
        let mut by_username = HashMap::new();
        for (identity, username) in rows {
            by_username.insert(username.clone(), identity);
            by_identity.insert(identity, username);
        }
        Self {
            generation,
            by_identity,
            by_username,
        }
    }

    pub fn username(&self, identity: &Uuid) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    pub fn identity(&self, username: &str) -> Option<Uuid> {
        self.by_username.get(username).copied()
    }

    /// Number of rebuilds published before this one; 0 is the empty
    /// snapshot a fresh cache starts with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}

/// Shared handle to the latest [`UsernameSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct UsernameCache {
    current: Arc<RwLock<Arc<UsernameSnapshot>>>,
}

impl UsernameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<UsernameSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            // A writer can only panic between taking the lock and storing
            // an already-built Arc, so the value is intact.
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Replace the index with one built from `rows`.
    pub fn publish(&self, rows: impl IntoIterator<Item = (Uuid, String)>) -> Arc<UsernameSnapshot> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(UsernameSnapshot::from_rows(guard.generation + 1, rows));
        *guard = Arc::clone(&next);
        debug!(
            generation = next.generation,
            entries = next.len(),
            "username cache rebuilt"
        );
        next
    }

    pub fn lookup_username(&self, identity: &Uuid) -> Option<String> {
        self.snapshot().username(identity).map(str::to_owned)
    }

    pub fn lookup_identity(&self, username: &str) -> Option<Uuid> {
        self.snapshot().identity(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn empty_until_published() {
        let cache = UsernameCache::new();
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.snapshot().generation(), 0);
        assert!(cache.lookup_username(&id(1)).is_none());
    }

    #[test]
    fn publish_builds_both_directions() {
        let cache = UsernameCache::new();
        cache.publish([(id(1), "Alice".to_string()), (id(2), "Bob".to_string())]);

        assert_eq!(cache.lookup_username(&id(1)).as_deref(), Some("Alice"));
        assert_eq!(cache.lookup_identity("Bob"), Some(id(2)));
        assert_eq!(cache.snapshot().generation(), 1);
    }

    #[test]
    fn publish_replaces_previous_generation() {
        let cache = UsernameCache::new();
        cache.publish([(id(1), "Alice".to_string())]);
        let old = cache.snapshot();

        cache.publish([(id(1), "Alicia".to_string())]);

        assert!(cache.lookup_identity("Alice").is_none());
        assert_eq!(cache.lookup_identity("Alicia"), Some(id(1)));
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(old.identity("Alice"), Some(id(1)));
        assert_eq!(old.username(&id(1)), Some("Alice"));
    }

    #[test]
    fn shared_username_resolves_to_last_row() {
        let snapshot = UsernameSnapshot::from_rows(
            1,
            [(id(1), "Steve".to_string()), (id(2), "Steve".to_string())],
        );
        assert_eq!(snapshot.identity("Steve"), Some(id(2)));
        assert_eq!(snapshot.username(&id(1)), Some("Steve"));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn readers_never_see_half_a_rebuild() {
        let cache = UsernameCache::new();
        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for n in 0..500u128 {
                    cache.publish([(id(1), format!("name{n}"))]);
                }
            })
        };

        for _ in 0..500 {
            let snapshot = cache.snapshot();
            if let Some(name) = snapshot.username(&id(1)) {
                assert_eq!(snapshot.identity(name), Some(id(1)));
            }
        }
        writer.join().unwrap();
    }
}
