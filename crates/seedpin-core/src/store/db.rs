//! SQLite-backed seed database implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Row CRUD lives in
//! `seeds`, `objects` and `entries`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed seed database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/seedpin/seeds.db`.
#[derive(Clone)]
pub struct SeedStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl SeedStore {
    /// Open (or create) the default seed database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("seedpin")?;
        let state_dir = xdg_dirs.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Self::open_at(state_dir.join("seeds.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = SeedStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seeds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dag_cid TEXT NOT NULL UNIQUE,
                date_added INTEGER NOT NULL,
                hidden INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // - `downloaded_to` is UNIQUE: two objects can never claim the same file.
        // - `ignored` backs the `ignore` flag (IGNORE is an SQL keyword).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seed_objects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                seed_id INTEGER NOT NULL REFERENCES seeds(id) ON DELETE CASCADE,
                obj_index INTEGER NOT NULL,
                pin INTEGER NOT NULL DEFAULT 1,
                pinned INTEGER NOT NULL DEFAULT 0,
                pinned_date INTEGER,
                pinned_nodes_cur INTEGER NOT NULL DEFAULT 0,
                pinned_nodes_final INTEGER NOT NULL DEFAULT 0,
                pin_status INTEGER NOT NULL DEFAULT 0,
                download INTEGER NOT NULL DEFAULT 0,
                downloaded INTEGER NOT NULL DEFAULT 0,
                downloaded_date INTEGER,
                downloaded_to TEXT UNIQUE,
                download_status INTEGER NOT NULL DEFAULT 0,
                download_chunk_size INTEGER NOT NULL DEFAULT 524288,
                status INTEGER NOT NULL DEFAULT 0,
                ignored INTEGER NOT NULL DEFAULT 0,
                pubsub_notify INTEGER NOT NULL DEFAULT 0,
                UNIQUE (seed_id, obj_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seed_entries (
                seed_id INTEGER NOT NULL REFERENCES seeds(id) ON DELETE CASCADE,
                obj_index INTEGER NOT NULL,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER,
                date_created INTEGER NOT NULL,
                PRIMARY KEY (seed_id, obj_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<SeedStore> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = SeedStore { pool };
    store.migrate().await?;
    Ok(store)
}
