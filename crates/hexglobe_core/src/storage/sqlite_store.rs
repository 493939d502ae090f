//! SQLite tile store: one row per record, keyed by the logical storage path.

use super::{StorageError, StorageResult, StoragePath, TileStore};
use crate::db::{open_db, open_db_in_memory};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Single-connection store; the mutex makes it shareable across threads.
pub struct SqliteTileStore {
    conn: Mutex<Connection>,
}

impl SqliteTileStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned("sqlite_tile_store"))
    }
}

impl TileStore for SqliteTileStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn read(&self, path: &StoragePath) -> StorageResult<Option<String>> {
        let conn = self.conn()?;
        let body = conn
            .query_row(
                "SELECT body FROM tile_records WHERE path = ?1;",
                [path.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(body)
    }

    fn write(&self, path: &StoragePath, body: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tile_records (path, body, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(path) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at;",
            params![path.as_str(), body],
        )?;
        debug!(
            "event=store_write module=storage status=ok backend=sqlite path={}",
            path
        );
        Ok(())
    }

    fn delete(&self, path: &StoragePath) -> StorageResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM tile_records WHERE path = ?1;",
            [path.as_str()],
        )?;
        if changed > 0 {
            debug!(
                "event=store_delete module=storage status=ok backend=sqlite path={}",
                path
            );
        }
        Ok(changed > 0)
    }

    fn count_under(&self, prefix: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let trimmed = prefix.trim_end_matches('/');
        let count = conn.query_row(
            "SELECT COUNT(*) FROM tile_records
             WHERE ?1 = '' OR substr(path, 1, length(?1) + 1) = ?1 || '/';",
            [trimmed],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteTileStore;
    use crate::model::cell::CellId;
    use crate::model::namespace::Namespace;
    use crate::storage::{StoragePathResolver, TileStore};

    #[test]
    fn upsert_read_and_delete() {
        let store = SqliteTileStore::open_in_memory().unwrap();
        let resolver = StoragePathResolver::new("8");
        let namespace = Namespace::parse("default").unwrap();
        let path = resolver.dynamic_path(
            &namespace,
            &CellId::from_canonical("8a194da9a74ffff"),
            10,
        );

        assert_eq!(store.read(&path).unwrap(), None);
        store.write(&path, "first").unwrap();
        store.write(&path, "second").unwrap();
        assert_eq!(store.read(&path).unwrap().as_deref(), Some("second"));
        assert_eq!(store.count_under("dynamic/default").unwrap(), 1);
        assert_eq!(store.count_under("dynamic/def").unwrap(), 0);
        assert_eq!(store.count_under("").unwrap(), 1);

        assert!(store.delete(&path).unwrap());
        assert!(!store.exists(&path).unwrap());
        assert!(!store.delete(&path).unwrap());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("tiles.sqlite3");
        let path = StoragePathResolver::new("")
            .static_path(&CellId::from_canonical("abcd"), 2);

        {
            let store = SqliteTileStore::open(&db_path).unwrap();
            store.write(&path, "persisted").unwrap();
        }
        let reopened = SqliteTileStore::open(&db_path).unwrap();
        assert_eq!(reopened.read(&path).unwrap().as_deref(), Some("persisted"));
    }
}
