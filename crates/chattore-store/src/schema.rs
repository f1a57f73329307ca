//! Persisted relations and the migration system that creates them.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are recorded in a `_migrations` table so each runs once.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

// ── column limits ────────────────────────────────────────────────────
//
// SQLite does not enforce VARCHAR widths and neither does the store;
// callers truncate before writing.

/// Longest profile text, in characters.
pub const MAX_ABOUT_LEN: usize = 512;
/// Longest nickname (including formatting markup), in characters.
pub const MAX_NICKNAME_LEN: usize = 2048;
/// Longest cached username.
pub const MAX_USERNAME_LEN: usize = 16;
/// Longest mail body, in characters.
pub const MAX_MAIL_LEN: usize = 512;
/// Longest setting key.
pub const MAX_SETTING_KEY_LEN: usize = 16;

/// Player-state relations, in creation order.
pub const TABLES: &[&str] = &["about", "mail", "nick", "username_cache", "setting"];

struct Migration {
    version: u32,
    description: &'static str,
    /// May contain several `;`-separated statements.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
///
/// Column names match the files written by the previous deployment of the
/// chat proxy, and `IF NOT EXISTS` lets an existing file be adopted.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "player state: about, mail, nick, username_cache, setting",
    sql: r#"
        CREATE TABLE IF NOT EXISTS about (
            about_uuid  VARCHAR(36) PRIMARY KEY,
            about_about VARCHAR(512) NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mail (
            mail_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            mail_timestamp INT NOT NULL,
            mail_sender    VARCHAR(36) NOT NULL,
            mail_recipient VARCHAR(36) NOT NULL,
            mail_read      BOOLEAN NOT NULL DEFAULT 0,
            mail_message   VARCHAR(512) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS mail_mail_sender ON mail(mail_sender);
        CREATE INDEX IF NOT EXISTS mail_mail_recipient ON mail(mail_recipient);

        CREATE TABLE IF NOT EXISTS nick (
            nick_uuid VARCHAR(36) PRIMARY KEY,
            nick_nick VARCHAR(2048) NOT NULL
        );

        CREATE TABLE IF NOT EXISTS username_cache (
            cache_user     VARCHAR(36) PRIMARY KEY,
            cache_username VARCHAR(16) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS username_cache_cache_username
            ON username_cache(cache_username);

        CREATE TABLE IF NOT EXISTS setting (
            setting_uuid  VARCHAR(36) NOT NULL,
            setting_key   VARCHAR(16) NOT NULL,
            setting_value BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS setting_setting_uuid ON setting(setting_uuid);
        CREATE UNIQUE INDEX IF NOT EXISTS setting_setting_uuid_setting_key
            ON setting(setting_uuid, setting_key);
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Version the schema reaches once every migration has run.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Run all pending migrations against `conn`.
///
/// Synchronous; call it from `spawn_blocking`.
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(new_version = latest_version(), "all migrations applied");
    Ok(())
}

/// Latest applied migration version, or 0 on a fresh file.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_error(0, "failed to read current version", e))
}

// ── internals ────────────────────────────────────────────────────────

fn migration_error(version: u32, what: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Migration {
        version,
        message: format!("{what}: {err}"),
    }
}

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_error(0, "failed to create _migrations table", e))
}

/// Apply one migration inside an immediate transaction. Dropping the
/// transaction on any error path rolls it back.
fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    let version = migration.version;
    info!(version, description = migration.description, "applying migration");

    let tx = conn
        .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .map_err(|e| migration_error(version, "failed to begin transaction", e))?;

    let result = tx
        .execute_batch(migration.sql)
        .map_err(|e| migration_error(version, "SQL execution failed", e))
        .and_then(|()| {
            tx.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![version, migration.description, chrono::Utc::now().timestamp()],
            )
            .map_err(|e| migration_error(version, "failed to record migration", e))
        });

    match result {
        Ok(_) => {
            tx.commit()
                .map_err(|e| migration_error(version, "failed to commit", e))?;
            info!(version, "migration applied");
            Ok(())
        }
        Err(err) => {
            warn!(version, %err, "migration failed, rolling back");
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' \
                 AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[1].version > window[0].version);
        }
    }

    #[test]
    fn run_all_creates_every_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
        let tables = table_names(&conn);
        for table in TABLES {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn run_all_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();
        run_all(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn adopts_existing_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE about (about_uuid VARCHAR(36) PRIMARY KEY, about_about VARCHAR(512) NOT NULL);
             INSERT INTO about VALUES ('00000000-0000-0000-0000-000000000001', 'hello');",
        )
        .unwrap();

        run_all(&mut conn).unwrap();

        let about: String = conn
            .query_row("SELECT about_about FROM about", [], |row| row.get(0))
            .unwrap();
        assert_eq!(about, "hello");
    }

    #[test]
    fn setting_pair_is_unique() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO setting VALUES ('u', 'spy', x'7b7d')",
            [],
        )
        .unwrap();
        let dup = conn.execute("INSERT INTO setting VALUES ('u', 'spy', x'7b7d')", []);
        assert!(dup.is_err());
        conn.execute("INSERT INTO setting VALUES ('u', 'other', x'7b7d')", [])
            .unwrap();
    }

    #[test]
    fn mail_read_defaults_to_false() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO mail (mail_timestamp, mail_sender, mail_recipient, mail_message) \
             VALUES (1, 'a', 'b', 'hi')",
            [],
        )
        .unwrap();
        let read: bool = conn
            .query_row("SELECT mail_read FROM mail", [], |row| row.get(0))
            .unwrap();
        assert!(!read);
    }
}
