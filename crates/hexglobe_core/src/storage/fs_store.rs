//! Filesystem tile store: one JSON file per record under a root directory.
//!
//! # Invariants
//! - Writes are atomic per record (temp file in the same directory, then
//!   rename), so readers never observe a half-written body.
//! - Deleting a record prunes directories left empty, back up to the root.
//! - Pruning holds the directory lock exclusively and writers hold it
//!   shared, so a writer never loses the directory it just created.

use super::{StorageError, StorageResult, StoragePath, TileStore};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

const RECORD_EXTENSION: &str = "json";

/// Tile store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FsTileStore {
    root: PathBuf,
    dir_lock: Arc<RwLock<()>>,
}

impl FsTileStore {
    /// Uses `root` as the data directory; it is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Absolute file backing `path`.
    pub fn file_path(&self, path: &StoragePath) -> PathBuf {
        let mut segments: Vec<&str> = path.segments().collect();
        let leaf = segments.pop().unwrap_or_default();
        let mut file = self.root.clone();
        for segment in segments {
            file.push(segment);
        }
        file.push(format!("{leaf}.{RECORD_EXTENSION}"));
        file
    }

    fn shared_dirs(&self) -> RwLockReadGuard<'_, ()> {
        self.dir_lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive_dirs(&self) -> RwLockWriteGuard<'_, ()> {
        self.dir_lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune_empty_dirs(&self, start: Option<&Path>) {
        let mut current = start;
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn count_records(dir: &Path) -> StorageResult<u64> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(io_error(dir, err)),
    };

    let mut total = 0;
    for entry in entries {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|err| io_error(&path, err))?;
        if file_type.is_dir() {
            total += count_records(&path)?;
        } else if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
            total += 1;
        }
    }
    Ok(total)
}

impl TileStore for FsTileStore {
    fn backend_name(&self) -> &'static str {
        "files"
    }

    fn read(&self, path: &StoragePath) -> StorageResult<Option<String>> {
        let file = self.file_path(path);
        match fs::read_to_string(&file) {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&file, err)),
        }
    }

    fn write(&self, path: &StoragePath, body: &str) -> StorageResult<()> {
        let file = self.file_path(path);
        let parent = file.parent().unwrap_or(self.root.as_path());
        let _dirs = self.shared_dirs();
        fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;

        let temp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp, body).map_err(|err| io_error(&temp, err))?;
        if let Err(err) = fs::rename(&temp, &file) {
            let _ = fs::remove_file(&temp);
            return Err(io_error(&file, err));
        }

        debug!(
            "event=store_write module=storage status=ok backend=files path={}",
            path
        );
        Ok(())
    }

    fn delete(&self, path: &StoragePath) -> StorageResult<bool> {
        let file = self.file_path(path);
        let _dirs = self.exclusive_dirs();
        match fs::remove_file(&file) {
            Ok(()) => {
                self.prune_empty_dirs(file.parent());
                debug!(
                    "event=store_delete module=storage status=ok backend=files path={}",
                    path
                );
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(&file, err)),
        }
    }

    fn count_under(&self, prefix: &str) -> StorageResult<u64> {
        let mut dir = self.root.clone();
        for segment in prefix.split('/').filter(|segment| !segment.is_empty()) {
            dir.push(segment);
        }
        count_records(&dir)
    }
}

#[cfg(test)]
mod tests {
    use super::FsTileStore;
    use crate::model::cell::CellId;
    use crate::model::namespace::Namespace;
    use crate::storage::{StoragePathResolver, TileStore};

    #[test]
    fn write_read_delete_cycle_prunes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTileStore::new(dir.path());
        let resolver = StoragePathResolver::new("8");
        let namespace = Namespace::parse("default").unwrap();
        let path = resolver.dynamic_path(
            &namespace,
            &CellId::from_canonical("8a194da9a74ffff"),
            10,
        );

        assert_eq!(store.read(&path).unwrap(), None);
        store.write(&path, "{\"content\":\"x\"}").unwrap();
        assert!(store.file_path(&path).is_file());
        assert_eq!(store.read(&path).unwrap().as_deref(), Some("{\"content\":\"x\"}"));
        assert_eq!(store.count_under("dynamic/default").unwrap(), 1);

        assert!(store.delete(&path).unwrap());
        assert!(!store.delete(&path).unwrap());
        assert!(!dir.path().join("dynamic").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn overwrite_replaces_body_without_leaving_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTileStore::new(dir.path());
        let path = StoragePathResolver::new("").static_path(&CellId::from_canonical("abcd"), 1);

        store.write(&path, "one").unwrap();
        store.write(&path, "two").unwrap();
        assert_eq!(store.read(&path).unwrap().as_deref(), Some("two"));

        let parent = store.file_path(&path).parent().unwrap().to_path_buf();
        let leftovers = std::fs::read_dir(parent)
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn pruning_never_races_writers_on_sibling_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTileStore::new(dir.path());
        let resolver = StoragePathResolver::new("8");
        let namespace = Namespace::parse("default").unwrap();
        // Both share every directory down to `a1/94/da/9a/`.
        let first = resolver.dynamic_path(
            &namespace,
            &CellId::from_canonical("8a194da9a74ffff"),
            10,
        );
        let second = resolver.dynamic_path(
            &namespace,
            &CellId::from_canonical("8a194da9a75ffff"),
            10,
        );

        std::thread::scope(|scope| {
            for path in [&first, &second] {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..500 {
                        store.write(path, "{\"content\":\"x\"}").unwrap_or_else(|err| {
                            panic!("write {round} failed: {err}");
                        });
                        store.delete(path).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.count_under("").unwrap(), 0);
        assert!(!dir.path().join("dynamic").exists());
    }

    #[test]
    fn unreadable_root_is_reported_not_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = FsTileStore::new(&blocker);
        let path = StoragePathResolver::new("").static_path(&CellId::from_canonical("abcd"), 1);

        assert!(store.write(&path, "body").is_err());
        assert!(store.read(&path).is_err());
    }
}
