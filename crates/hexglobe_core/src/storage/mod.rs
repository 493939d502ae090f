//! Storage boundary for tile records.
//!
//! # Responsibility
//! - Define the record store contract used by the tile repository.
//! - Provide filesystem and SQLite backends keyed by `StoragePath`.
//!
//! # Invariants
//! - A missing record is `Ok(None)`, never an error.
//! - I/O and database failures are reported as `StorageError`, distinct from
//!   absence.
//! - Stores hold opaque UTF-8 bodies; encoding is the repository's concern.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fs_store;
pub mod path;
pub mod sqlite_store;

pub use fs_store::FsTileStore;
pub use path::{RecordKind, StoragePath, StoragePathResolver};
pub use sqlite_store::SqliteTileStore;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures reaching the backing store.
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem access failed (missing directory, permissions, ...).
    Io {
        path: String,
        source: std::io::Error,
    },
    Db(DbError),
    /// A previous holder of the store lock panicked.
    LockPoisoned(&'static str),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "storage unavailable at `{path}`: {source}"),
            Self::Db(err) => write!(f, "storage unavailable: {err}"),
            Self::LockPoisoned(name) => write!(f, "storage lock `{name}` is poisoned"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::LockPoisoned(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key/value record store addressed by storage paths.
pub trait TileStore: Send + Sync {
    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;
    fn read(&self, path: &StoragePath) -> StorageResult<Option<String>>;
    /// Creates or replaces the record at `path`.
    fn write(&self, path: &StoragePath, body: &str) -> StorageResult<()>;
    /// Removes the record; returns whether one existed.
    fn delete(&self, path: &StoragePath) -> StorageResult<bool>;
    /// Counts records whose path starts with `prefix` (a `/`-separated
    /// directory-like prefix such as `dynamic/default`).
    fn count_under(&self, prefix: &str) -> StorageResult<u64>;

    fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        Ok(self.read(path)?.is_some())
    }
}

impl<T: TileStore + ?Sized> TileStore for Box<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn read(&self, path: &StoragePath) -> StorageResult<Option<String>> {
        (**self).read(path)
    }

    fn write(&self, path: &StoragePath, body: &str) -> StorageResult<()> {
        (**self).write(path, body)
    }

    fn delete(&self, path: &StoragePath) -> StorageResult<bool> {
        (**self).delete(path)
    }

    fn count_under(&self, prefix: &str) -> StorageResult<u64> {
        (**self).count_under(prefix)
    }

    fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        (**self).exists(path)
    }
}
