//! Tile use-case service.
//!
//! # Responsibility
//! - Accept raw caller input (id text, namespace text, coordinates,
//!   addresses) and validate it before any repository or network call.
//! - Provide query and update entry points for the CLI and other callers.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Content moves only happen between ring neighbors.
//! - Service layer remains storage-agnostic.

use crate::geocode::{GeocodeError, GeocodeSource, Geocoder};
use crate::grid::{GridError, GridLibrary};
use crate::layout::GridLayoutEngine;
use crate::model::cell::{CellId, LatLng, MAX_RESOLUTION};
use crate::model::layout::GridResponse;
use crate::model::namespace::Namespace;
use crate::model::tile::{Tile, VisualProperties};
use crate::repo::tile_repo::{RepoError, TileRepository};
use crate::storage::TileStore;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TileServiceResult<T> = Result<T, TileServiceError>;

/// Service-level error.
#[derive(Debug)]
pub enum TileServiceError {
    Repo(RepoError),
    Grid(GridError),
    /// `to` is not in the one-ring of `from`.
    NotNeighbors { from: CellId, to: CellId },
    Geocode(GeocodeError),
    /// Address lookup requested but no geocoder is attached.
    GeocoderUnavailable,
}

impl Display for TileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Grid(err) => write!(f, "{err}"),
            Self::NotNeighbors { from, to } => {
                write!(f, "tiles {from} and {to} are not neighbors")
            }
            Self::Geocode(err) => write!(f, "{err}"),
            Self::GeocoderUnavailable => write!(f, "address lookup is not configured"),
        }
    }
}

impl Error for TileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Grid(err) => Some(err),
            Self::Geocode(err) => Some(err),
            Self::NotNeighbors { .. } | Self::GeocoderUnavailable => None,
        }
    }
}

impl From<RepoError> for TileServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<GridError> for TileServiceError {
    fn from(value: GridError) -> Self {
        Self::Grid(value)
    }
}

impl From<GeocodeError> for TileServiceError {
    fn from(value: GeocodeError) -> Self {
        Self::Geocode(value)
    }
}

/// Cell found for a free-text address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressLocation {
    pub id: CellId,
    pub resolution: u8,
    pub coordinates: LatLng,
    pub address: String,
    pub source: GeocodeSource,
}

/// Partial tile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileUpdate {
    /// `Some(None)` clears the content.
    pub content: Option<Option<String>>,
    pub visual_properties: Option<VisualProperties>,
}

/// Use-case service wrapper around a tile repository.
pub struct TileService<G: GridLibrary, S: TileStore> {
    repo: TileRepository<G, S>,
    geocoder: Option<Box<dyn Geocoder>>,
}

impl<G: GridLibrary, S: TileStore> TileService<G, S> {
    pub fn new(repo: TileRepository<G, S>) -> Self {
        Self {
            repo,
            geocoder: None,
        }
    }

    /// Enables `locate_address`.
    pub fn with_geocoder(mut self, geocoder: impl Geocoder + 'static) -> Self {
        self.geocoder = Some(Box::new(geocoder));
        self
    }

    pub fn repo(&self) -> &TileRepository<G, S> {
        &self.repo
    }

    /// Validates raw id text through the grid library.
    pub fn parse_cell(&self, raw_id: &str) -> TileServiceResult<CellId> {
        Ok(self.repo.grid().parse_cell(raw_id)?)
    }

    pub fn tile(&self, raw_id: &str, namespace: &str) -> TileServiceResult<Tile> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        Ok(self.repo.get(&id, &namespace)?)
    }

    /// Neighbor tiles in clockwise order from `top_middle`; a pentagon
    /// yields five.
    pub fn neighbors(&self, raw_id: &str, namespace: &str) -> TileServiceResult<Vec<Tile>> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        let topology = self.repo.topology(&id)?;
        topology
            .neighbor_positions
            .cells()
            .map(|(_, neighbor)| {
                self.repo
                    .get(neighbor, &namespace)
                    .map_err(TileServiceError::from)
            })
            .collect()
    }

    /// Parent tile, or `None` at the coarsest resolution.
    pub fn parent(&self, raw_id: &str, namespace: &str) -> TileServiceResult<Option<Tile>> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        let topology = self.repo.topology(&id)?;
        match &topology.parent_id {
            Some(parent) => Ok(Some(self.repo.get(parent, &namespace)?)),
            None => Ok(None),
        }
    }

    /// Child tiles; empty at the finest resolution.
    pub fn children(&self, raw_id: &str, namespace: &str) -> TileServiceResult<Vec<Tile>> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        let topology = self.repo.topology(&id)?;
        topology
            .children_ids
            .iter()
            .map(|child| {
                self.repo
                    .get(child, &namespace)
                    .map_err(TileServiceError::from)
            })
            .collect()
    }

    /// Applies a partial update and returns the resulting tile.
    ///
    /// Visual overrides are validated before anything is written.
    pub fn update_tile(
        &self,
        raw_id: &str,
        namespace: &str,
        update: TileUpdate,
    ) -> TileServiceResult<Tile> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        if let Some(visual) = &update.visual_properties {
            visual.validate().map_err(RepoError::from)?;
        }

        if let Some(content) = update.content {
            self.repo.set_content(&id, &namespace, content)?;
        }
        if let Some(visual) = &update.visual_properties {
            self.repo.set_visual(&id, &namespace, visual)?;
        }
        Ok(self.repo.get(&id, &namespace)?)
    }

    pub fn update_visual(
        &self,
        raw_id: &str,
        namespace: &str,
        visual: VisualProperties,
    ) -> TileServiceResult<Tile> {
        self.update_tile(
            raw_id,
            namespace,
            TileUpdate {
                content: None,
                visual_properties: Some(visual),
            },
        )
    }

    /// Drops every visual override and returns the resulting tile.
    pub fn reset_visual(&self, raw_id: &str, namespace: &str) -> TileServiceResult<Tile> {
        let id = self.parse_cell(raw_id)?;
        let namespace = parse_namespace(namespace)?;
        self.repo.clear_visual(&id, &namespace)?;
        Ok(self.repo.get(&id, &namespace)?)
    }

    /// Moves content to an adjacent tile; returns `(from, to)` after the move.
    ///
    /// # Errors
    /// - `NotNeighbors` when `to` is not a ring neighbor of `from`.
    /// - `SourceHasNoContent` (via `Repo`) when `from` holds no content.
    pub fn move_content(
        &self,
        raw_from: &str,
        raw_to: &str,
        namespace: &str,
    ) -> TileServiceResult<(Tile, Tile)> {
        let from = self.parse_cell(raw_from)?;
        let to = self.parse_cell(raw_to)?;
        let namespace = parse_namespace(namespace)?;

        if !self.repo.grid().ring_neighbors(&from)?.contains(&to) {
            info!(
                "event=tile_move module=service status=rejected reason=not_neighbors namespace={} from={} to={}",
                namespace, from, to
            );
            return Err(TileServiceError::NotNeighbors { from, to });
        }

        self.repo.move_content(&from, &to, &namespace)?;
        Ok((
            self.repo.get(&from, &namespace)?,
            self.repo.get(&to, &namespace)?,
        ))
    }

    /// Rectangular layout around the focal tile.
    pub fn grid(
        &self,
        raw_focal: &str,
        width: u32,
        height: u32,
        namespace: &str,
    ) -> TileServiceResult<GridResponse> {
        let focal = self.parse_cell(raw_focal)?;
        parse_namespace(namespace)?;
        let layout = GridLayoutEngine::new(&self.repo).layout(&focal, width, height)?;
        Ok(GridResponse::from(&layout))
    }

    /// Cell containing the coordinate at `resolution`.
    pub fn locate(&self, lat: f64, lng: f64, resolution: i64) -> TileServiceResult<CellId> {
        Ok(self.repo.grid().cell_at(lat, lng, resolution)?)
    }

    /// Geocodes `address` and returns the containing cell.
    ///
    /// The resolution is checked before the geocoder is consulted.
    pub fn locate_address(
        &self,
        address: &str,
        resolution: i64,
    ) -> TileServiceResult<AddressLocation> {
        let level = u8::try_from(resolution)
            .ok()
            .filter(|level| *level <= MAX_RESOLUTION)
            .ok_or(GridError::UnsupportedResolution(resolution))?;
        let geocoder = self
            .geocoder
            .as_ref()
            .ok_or(TileServiceError::GeocoderUnavailable)?;

        let place = geocoder.geocode(address)?;
        let id = self
            .repo
            .grid()
            .cell_at(place.coordinates.lat, place.coordinates.lng, resolution)?;
        info!(
            "event=locate_address module=service status=ok cell={} resolution={} source={:?}",
            id, level, place.source
        );
        Ok(AddressLocation {
            id,
            resolution: level,
            coordinates: place.coordinates,
            address: place.address,
            source: place.source,
        })
    }

    /// Boundary vertices of the tile.
    pub fn geometry(&self, raw_id: &str) -> TileServiceResult<Vec<LatLng>> {
        let id = self.parse_cell(raw_id)?;
        Ok(self.repo.grid().boundary(&id)?)
    }
}

fn parse_namespace(raw: &str) -> TileServiceResult<Namespace> {
    Namespace::parse(raw).map_err(|err| TileServiceError::Repo(err.into()))
}
