//! Tile repository: merged tile reads and overlay writes over a `TileStore`.
//!
//! # Responsibility
//! - Compose immutable topology with per-namespace mutable content.
//! - Own every persisted record; callers never touch the store directly.
//!
//! # Invariants
//! - Topology is computed at most once per cell per process and then served
//!   from the in-memory cache.
//! - An all-default overlay is never persisted; writes that restore
//!   defaults delete the backing record.
//! - Read-modify-write sequences on the same `(namespace, cell)` are
//!   serialized by a striped lock.

use crate::grid::{GridError, GridLibrary};
use crate::model::cell::CellId;
use crate::model::namespace::{Namespace, NamespaceError};
use crate::model::tile::{
    ImmutableTopology, MutableContent, Tile, VisualProperties, VisualValidationError,
};
use crate::storage::{RecordKind, StorageError, StoragePath, StoragePathResolver, TileStore};
use crate::topology::compute_topology;
use log::{debug, error, info, warn};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const WRITE_STRIPES: usize = 64;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for tile reads and overlay writes.
#[derive(Debug)]
pub enum RepoError {
    Grid(GridError),
    StorageUnavailable(StorageError),
    InvalidNamespace(NamespaceError),
    InvalidVisualProperty(VisualValidationError),
    SourceHasNoContent(CellId),
    /// A persisted overlay could not be decoded.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grid(err) => write!(f, "{err}"),
            Self::StorageUnavailable(err) => write!(f, "{err}"),
            Self::InvalidNamespace(err) => write!(f, "{err}"),
            Self::InvalidVisualProperty(err) => write!(f, "invalid visual property: {err}"),
            Self::SourceHasNoContent(id) => write!(f, "source tile {id} has no content to move"),
            Self::InvalidData(message) => write!(f, "invalid persisted tile data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Grid(err) => Some(err),
            Self::StorageUnavailable(err) => Some(err),
            Self::InvalidNamespace(err) => Some(err),
            Self::InvalidVisualProperty(err) => Some(err),
            Self::SourceHasNoContent(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<GridError> for RepoError {
    fn from(value: GridError) -> Self {
        Self::Grid(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<NamespaceError> for RepoError {
    fn from(value: NamespaceError) -> Self {
        Self::InvalidNamespace(value)
    }
}

impl From<VisualValidationError> for RepoError {
    fn from(value: VisualValidationError) -> Self {
        Self::InvalidVisualProperty(value)
    }
}

/// Tile repository over a grid library and a record store.
pub struct TileRepository<G: GridLibrary, S: TileStore> {
    grid: G,
    store: S,
    resolver: StoragePathResolver,
    topology_cache: Mutex<HashMap<CellId, Arc<ImmutableTopology>>>,
    write_stripes: Vec<Mutex<()>>,
}

impl<G: GridLibrary, S: TileStore> TileRepository<G, S> {
    pub fn new(grid: G, store: S) -> Self {
        let resolver = StoragePathResolver::new(grid.scheme_prefix());
        Self {
            grid,
            store,
            resolver,
            topology_cache: Mutex::new(HashMap::new()),
            write_stripes: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merged tile view; a missing overlay reads as all defaults.
    pub fn get(&self, id: &CellId, namespace: &Namespace) -> RepoResult<Tile> {
        let topology = self.topology(id)?;
        let overlay = self
            .read_overlay(&self.resolver.resolve(
                RecordKind::Dynamic(namespace),
                id,
                topology.resolution,
            ))?
            .unwrap_or_default();
        Ok(Tile::compose(&topology, &overlay))
    }

    /// Immutable topology from cache, static store or fresh computation.
    pub fn topology(&self, id: &CellId) -> RepoResult<Arc<ImmutableTopology>> {
        if let Some(cached) = self.cache().get(id) {
            return Ok(Arc::clone(cached));
        }

        let path = self.record_path(RecordKind::Static, id)?;
        let topology = match self.load_static(id, &path) {
            Some(loaded) => loaded,
            None => {
                let (computed, _diagnostics) = compute_topology(&self.grid, id)?;
                self.persist_static(&path, &computed);
                computed
            }
        };

        let topology = Arc::new(topology);
        let mut cache = self.cache();
        let entry = cache
            .entry(id.clone())
            .or_insert_with(|| Arc::clone(&topology));
        Ok(Arc::clone(entry))
    }

    pub fn is_pentagon(&self, id: &CellId) -> RepoResult<bool> {
        Ok(self.topology(id)?.is_pentagon)
    }

    /// Raw overlay record; `None` when nothing is persisted.
    pub fn content_record(
        &self,
        id: &CellId,
        namespace: &Namespace,
    ) -> RepoResult<Option<MutableContent>> {
        self.read_overlay(&self.record_path(RecordKind::Dynamic(namespace), id)?)
    }

    /// Storage location of the record `kind` holds for `id`, at the id's own
    /// resolution.
    pub fn record_path(&self, kind: RecordKind<'_>, id: &CellId) -> RepoResult<StoragePath> {
        let resolution = self.grid.resolution_of(id)?;
        Ok(self.resolver.resolve(kind, id, resolution))
    }

    /// Replaces (or with `None`, clears) the content string.
    pub fn set_content(
        &self,
        id: &CellId,
        namespace: &Namespace,
        content: Option<String>,
    ) -> RepoResult<()> {
        self.update_overlay(id, namespace, "set_content", |record| {
            record.content = content;
        })
    }

    /// Applies the provided visual overrides; unspecified fields keep their
    /// current value.
    pub fn set_visual(
        &self,
        id: &CellId,
        namespace: &Namespace,
        patch: &VisualProperties,
    ) -> RepoResult<()> {
        patch.validate()?;
        self.update_overlay(id, namespace, "set_visual", |record| {
            record.visual_properties.merge(patch);
            record.visual_properties = std::mem::take(&mut record.visual_properties).normalized();
        })
    }

    /// Drops every visual override of the tile.
    pub fn clear_visual(&self, id: &CellId, namespace: &Namespace) -> RepoResult<()> {
        self.update_overlay(id, namespace, "clear_visual", |record| {
            record.visual_properties = VisualProperties::default();
        })
    }

    /// Moves the content string from `from` to `to` within one namespace.
    ///
    /// The target's previous content is overwritten; visual properties of
    /// both tiles are untouched. When clearing the source fails, the
    /// target is restored before the error is returned.
    pub fn move_content(
        &self,
        from: &CellId,
        to: &CellId,
        namespace: &Namespace,
    ) -> RepoResult<()> {
        let from_path = self.record_path(RecordKind::Dynamic(namespace), from)?;
        let to_path = self.record_path(RecordKind::Dynamic(namespace), to)?;
        let _guards = self.lock_pair(namespace, from, to);

        let mut source = self.read_overlay(&from_path)?.unwrap_or_default();
        let Some(content) = source.content.take() else {
            return Err(RepoError::SourceHasNoContent(from.clone()));
        };
        if from == to {
            return Ok(());
        }

        let prior_target = self.read_overlay(&to_path)?;
        let mut target = prior_target.clone().unwrap_or_default();
        target.content = Some(content);
        self.persist_overlay(&to_path, &target)?;

        if let Err(err) = self.persist_overlay(&from_path, &source) {
            error!(
                "event=tile_move module=repo status=error namespace={} from={} to={} error={}",
                namespace, from, to, err
            );
            let restored = self.persist_overlay(&to_path, &prior_target.unwrap_or_default());
            if let Err(restore_err) = restored {
                error!(
                    "event=tile_move_rollback module=repo status=error namespace={} cell={} error={}",
                    namespace, to, restore_err
                );
            }
            return Err(err);
        }

        info!(
            "event=tile_move module=repo status=ok namespace={} from={} to={}",
            namespace, from, to
        );
        Ok(())
    }

    /// Number of overlay records persisted for `namespace`.
    pub fn overlay_count(&self, namespace: &Namespace) -> RepoResult<u64> {
        Ok(self
            .store
            .count_under(&StoragePathResolver::namespace_root(namespace))?)
    }

    /// Number of topology records persisted in the static tree.
    pub fn topology_count(&self) -> RepoResult<u64> {
        Ok(self.store.count_under(StoragePathResolver::static_root())?)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<CellId, Arc<ImmutableTopology>>> {
        self.topology_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn load_static(&self, id: &CellId, path: &StoragePath) -> Option<ImmutableTopology> {
        let body = match self.store.read(path) {
            Ok(body) => body?,
            Err(err) => {
                warn!(
                    "event=topology_load module=repo status=error cell={} error={}",
                    id, err
                );
                return None;
            }
        };
        match serde_json::from_str::<ImmutableTopology>(&body) {
            Ok(topology) if topology.id == *id && topology.neighbor_positions.is_complete() => {
                Some(topology)
            }
            Ok(_) => {
                warn!(
                    "event=topology_load module=repo status=error cell={} error_code=mismatched_record",
                    id
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=topology_load module=repo status=error cell={} error_code=decode_failed error={}",
                    id, err
                );
                None
            }
        }
    }

    fn persist_static(&self, path: &StoragePath, topology: &ImmutableTopology) {
        let written = serde_json::to_string(topology)
            .map_err(|err| err.to_string())
            .and_then(|body| self.store.write(path, &body).map_err(|err| err.to_string()));
        match written {
            Ok(()) => debug!(
                "event=topology_persist module=repo status=ok cell={}",
                topology.id
            ),
            Err(err) => warn!(
                "event=topology_persist module=repo status=error cell={} error={}",
                topology.id, err
            ),
        }
    }

    fn read_overlay(&self, path: &StoragePath) -> RepoResult<Option<MutableContent>> {
        let Some(body) = self.store.read(path)? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|err| RepoError::InvalidData(format!("{path}: {err}")))
    }

    fn persist_overlay(&self, path: &StoragePath, record: &MutableContent) -> RepoResult<()> {
        if record.is_default() {
            self.store.delete(path)?;
            return Ok(());
        }
        let body = serde_json::to_string(record)
            .map_err(|err| RepoError::InvalidData(format!("{path}: {err}")))?;
        self.store.write(path, &body)?;
        Ok(())
    }

    fn update_overlay(
        &self,
        id: &CellId,
        namespace: &Namespace,
        op: &str,
        mutate: impl FnOnce(&mut MutableContent),
    ) -> RepoResult<()> {
        let path = self.record_path(RecordKind::Dynamic(namespace), id)?;
        let _guard = self.lock_stripe(stripe_index(namespace, id));

        let mut record = self.read_overlay(&path)?.unwrap_or_default();
        mutate(&mut record);
        let result = self.persist_overlay(&path, &record);

        match &result {
            Ok(()) => info!(
                "event=tile_write module=repo status=ok op={} namespace={} cell={} record={}",
                op,
                namespace,
                id,
                if record.is_default() { "cleared" } else { "stored" }
            ),
            Err(err) => error!(
                "event=tile_write module=repo status=error op={} namespace={} cell={} error={}",
                op, namespace, id, err
            ),
        }
        result
    }

    fn lock_stripe(&self, index: usize) -> MutexGuard<'_, ()> {
        self.write_stripes[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes both stripes in index order so concurrent moves cannot deadlock.
    fn lock_pair(
        &self,
        namespace: &Namespace,
        a: &CellId,
        b: &CellId,
    ) -> (MutexGuard<'_, ()>, Option<MutexGuard<'_, ()>>) {
        let first = stripe_index(namespace, a);
        let second = stripe_index(namespace, b);
        if first == second {
            return (self.lock_stripe(first), None);
        }
        let (low, high) = (first.min(second), first.max(second));
        let low_guard = self.lock_stripe(low);
        let high_guard = self.lock_stripe(high);
        (low_guard, Some(high_guard))
    }
}

fn stripe_index(namespace: &Namespace, id: &CellId) -> usize {
    let mut hasher = DefaultHasher::new();
    namespace.hash(&mut hasher);
    id.hash(&mut hasher);
    (hasher.finish() % WRITE_STRIPES as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::{RepoError, TileRepository};
    use crate::grid::{GridLibrary, H3Grid};
    use crate::model::namespace::Namespace;
    use crate::model::tile::VisualProperties;
    use crate::storage::{
        RecordKind, SqliteTileStore, StorageError, StoragePath, StorageResult, TileStore,
    };
    use std::sync::Mutex;

    const CELL: &str = "8a194da9a74ffff";

    fn repo() -> TileRepository<H3Grid, SqliteTileStore> {
        TileRepository::new(H3Grid::new(), SqliteTileStore::open_in_memory().unwrap())
    }

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    /// Delegates to an in-memory store but refuses mutations of one path.
    struct FailingStore {
        inner: SqliteTileStore,
        blocked: Mutex<Option<StoragePath>>,
    }

    impl FailingStore {
        fn check(&self, path: &StoragePath) -> StorageResult<()> {
            if self.blocked.lock().unwrap().as_ref() == Some(path) {
                return Err(StorageError::LockPoisoned("blocked_for_test"));
            }
            Ok(())
        }
    }

    impl TileStore for FailingStore {
        fn backend_name(&self) -> &'static str {
            "failing"
        }

        fn read(&self, path: &StoragePath) -> StorageResult<Option<String>> {
            self.inner.read(path)
        }

        fn write(&self, path: &StoragePath, body: &str) -> StorageResult<()> {
            self.check(path)?;
            self.inner.write(path, body)
        }

        fn delete(&self, path: &StoragePath) -> StorageResult<bool> {
            self.check(path)?;
            self.inner.delete(path)
        }

        fn count_under(&self, prefix: &str) -> StorageResult<u64> {
            self.inner.count_under(prefix)
        }
    }

    #[test]
    fn restoring_defaults_deletes_the_overlay_record() {
        let repo = repo();
        let id = repo.grid().parse_cell(CELL).unwrap();
        let namespace = ns("default");

        repo.set_content(&id, &namespace, Some("hello".to_string()))
            .unwrap();
        repo.set_visual(
            &id,
            &namespace,
            &VisualProperties {
                fill_color: Some("#ff0000".to_string()),
                ..VisualProperties::default()
            },
        )
        .unwrap();
        assert_eq!(repo.overlay_count(&namespace).unwrap(), 1);

        repo.set_content(&id, &namespace, None).unwrap();
        assert!(repo.content_record(&id, &namespace).unwrap().is_some());

        repo.set_visual(
            &id,
            &namespace,
            &VisualProperties {
                fill_color: Some("#FFFFFF".to_string()),
                ..VisualProperties::default()
            },
        )
        .unwrap();
        assert!(repo.content_record(&id, &namespace).unwrap().is_none());
        assert_eq!(repo.overlay_count(&namespace).unwrap(), 0);
    }

    #[test]
    fn short_hex_default_color_leaves_no_record() {
        let repo = repo();
        let id = repo.grid().parse_cell(CELL).unwrap();
        let namespace = ns("default");

        for color in ["#fff", "#FFF"] {
            repo.set_visual(
                &id,
                &namespace,
                &VisualProperties {
                    fill_color: Some(color.to_string()),
                    border_color: Some("#000".to_string()),
                    ..VisualProperties::default()
                },
            )
            .unwrap();
            assert_eq!(repo.content_record(&id, &namespace).unwrap(), None);
        }
        assert_eq!(repo.overlay_count(&namespace).unwrap(), 0);
    }

    #[test]
    fn record_paths_follow_the_cell_resolution() {
        let repo = repo();
        let namespace = ns("default");
        let fine = repo.grid().parse_cell(CELL).unwrap();
        let base = repo.grid().parse_cell("8009fffffffffff").unwrap();

        let fine_path = repo.record_path(RecordKind::Dynamic(&namespace), &fine).unwrap();
        assert!(fine_path.as_str().starts_with("dynamic/default/res_10/"));
        let base_path = repo.record_path(RecordKind::Static, &base).unwrap();
        assert!(base_path.as_str().starts_with("static/res_0/"));

        let bogus = crate::model::cell::CellId::from_canonical("not-a-cell");
        assert!(matches!(
            repo.record_path(RecordKind::Static, &bogus),
            Err(RepoError::Grid(_))
        ));
    }

    #[test]
    fn invalid_visual_is_rejected_before_any_write() {
        let repo = repo();
        let id = repo.grid().parse_cell(CELL).unwrap();
        let namespace = ns("default");

        let err = repo
            .set_visual(
                &id,
                &namespace,
                &VisualProperties {
                    fill_opacity: Some(2.0),
                    ..VisualProperties::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidVisualProperty(_)));
        assert_eq!(repo.overlay_count(&namespace).unwrap(), 0);
    }

    #[test]
    fn corrupt_overlay_is_reported_as_invalid_data() {
        let repo = repo();
        let id = repo.grid().parse_cell(CELL).unwrap();
        let namespace = ns("default");
        let path = repo.record_path(RecordKind::Dynamic(&namespace), &id).unwrap();
        repo.store().write(&path, "{not json").unwrap();

        let err = repo.get(&id, &namespace).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn failed_source_clear_restores_target() {
        let store = FailingStore {
            inner: SqliteTileStore::open_in_memory().unwrap(),
            blocked: Mutex::new(None),
        };
        let repo = TileRepository::new(H3Grid::new(), store);
        let namespace = ns("default");
        let from = repo.grid().parse_cell(CELL).unwrap();
        let to = repo.grid().ring_neighbors(&from).unwrap()[0].clone();

        repo.set_content(&from, &namespace, Some("payload".to_string()))
            .unwrap();
        repo.set_content(&to, &namespace, Some("old".to_string()))
            .unwrap();
        *repo.store().blocked.lock().unwrap() =
            Some(repo.record_path(RecordKind::Dynamic(&namespace), &from).unwrap());

        let err = repo.move_content(&from, &to, &namespace).unwrap_err();
        assert!(matches!(err, RepoError::StorageUnavailable(_)));

        let target = repo.content_record(&to, &namespace).unwrap().unwrap();
        assert_eq!(target.content.as_deref(), Some("old"));
        let source = repo.content_record(&from, &namespace).unwrap().unwrap();
        assert_eq!(source.content.as_deref(), Some("payload"));
    }

    #[test]
    fn move_onto_itself_is_a_no_op() {
        let repo = repo();
        let id = repo.grid().parse_cell(CELL).unwrap();
        let namespace = ns("default");

        assert!(matches!(
            repo.move_content(&id, &id, &namespace),
            Err(RepoError::SourceHasNoContent(_))
        ));
        repo.set_content(&id, &namespace, Some("stay".to_string()))
            .unwrap();
        repo.move_content(&id, &id, &namespace).unwrap();
        let tile = repo.get(&id, &namespace).unwrap();
        assert_eq!(tile.content.as_deref(), Some("stay"));
    }
}
