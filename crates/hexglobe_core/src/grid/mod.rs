//! Grid library boundary.
//!
//! # Responsibility
//! - Define the only contract core code uses to reach hexagonal-grid math.
//! - Keep library-specific index types out of every other module.
//!
//! # Invariants
//! - Malformed ids fail with `GridError::InvalidCellId`, never a default cell.
//! - Resolutions outside `0..=15` fail with `GridError::UnsupportedResolution`.
//! - Results are deterministic for a given input.

use crate::model::cell::{CellId, LatLng};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod h3;

pub use h3::H3Grid;

/// Result type for grid library operations.
pub type GridResult<T> = Result<T, GridError>;

/// Errors raised at the grid library boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Input is not a valid cell token.
    InvalidCellId(String),
    /// Resolution outside `0..=15`.
    UnsupportedResolution(i64),
    /// Hierarchy edge: resolution 0 cells have no parent.
    NoParent(CellId),
    /// Hierarchy edge: resolution 15 cells have no children.
    NoChildren(CellId),
    /// Coordinates are not finite numbers.
    InvalidCoordinate { lat: f64, lng: f64 },
}

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCellId(value) => write!(f, "invalid cell id: `{value}`"),
            Self::UnsupportedResolution(value) => {
                write!(f, "unsupported resolution {value}; expected 0..=15")
            }
            Self::NoParent(id) => write!(f, "cell {id} has no parent"),
            Self::NoChildren(id) => write!(f, "cell {id} has no children"),
            Self::InvalidCoordinate { lat, lng } => {
                write!(f, "invalid coordinate lat={lat} lng={lng}")
            }
        }
    }
}

impl Error for GridError {}

/// Primitive operations delegated to the external hexagonal-grid library.
///
/// Implementations must be cheap to share across threads; every other core
/// component borrows one instead of owning library state.
pub trait GridLibrary: Send + Sync {
    /// Validates raw user text and returns the canonical id.
    fn parse_cell(&self, raw: &str) -> GridResult<CellId>;
    /// Geographic center of the cell.
    fn center(&self, id: &CellId) -> GridResult<LatLng>;
    /// Cells sharing an edge with `id` (6, or 5 for a pentagon). Order is
    /// unspecified.
    fn ring_neighbors(&self, id: &CellId) -> GridResult<Vec<CellId>>;
    fn is_pentagon(&self, id: &CellId) -> GridResult<bool>;
    /// Containing cell one resolution coarser.
    fn parent(&self, id: &CellId) -> GridResult<CellId>;
    /// Contained cells one resolution finer, in library order.
    fn children(&self, id: &CellId) -> GridResult<Vec<CellId>>;
    fn resolution_of(&self, id: &CellId) -> GridResult<u8>;
    fn cell_at(&self, lat: f64, lng: f64, resolution: i64) -> GridResult<CellId>;
    /// Cell outline as a closed-by-convention ring of vertices.
    fn boundary(&self, id: &CellId) -> GridResult<Vec<LatLng>>;
    /// Leading characters shared by every id this library produces.
    fn scheme_prefix(&self) -> &str {
        ""
    }
}
