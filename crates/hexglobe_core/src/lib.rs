//! Core domain logic for HexGlobe: hexagonal tiles addressed by H3 cells.
//! This crate owns tile topology, per-namespace overlays and grid layout.

pub mod config;
pub mod db;
pub mod geocode;
pub mod grid;
pub mod layout;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod topology;

pub use config::{ConfigError, HexGlobeConfig, StorageBackend};
pub use geocode::{
    CachedGeocoder, GeocodeError, GeocodeSource, GeocodedPlace, Geocoder, NominatimGeocoder,
};
pub use grid::{GridError, GridLibrary, GridResult, H3Grid};
pub use layout::GridLayoutEngine;
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::cell::{CellId, LatLng};
pub use model::layout::{GridBounds, GridLayout, GridResponse};
pub use model::namespace::{Namespace, NamespaceError};
pub use model::tile::{
    ImmutableTopology, MutableContent, NeighborMap, NeighborSlot, PositionKey, ResolvedVisual,
    Tile, VisualProperties, VisualValidationError,
};
pub use repo::tile_repo::{RepoError, RepoResult, TileRepository};
pub use service::seed::seed_sample_tiles;
pub use service::tile_service::{
    AddressLocation, TileService, TileServiceError, TileServiceResult, TileUpdate,
};
pub use storage::{
    FsTileStore, RecordKind, SqliteTileStore, StorageError, StoragePath, StorageResult, TileStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
