//! Derived cell topology: neighbor positions and cross-resolution ids.
//!
//! # Responsibility
//! - Compute the immutable parts of a tile from grid library primitives.
//!
//! # Invariants
//! - Everything here is a pure function of the `CellId`; no storage access.

pub mod geodesy;
pub mod neighbors;
pub mod resolution;

use crate::grid::{GridError, GridLibrary, GridResult};
use crate::model::cell::CellId;
use crate::model::tile::ImmutableTopology;
use neighbors::{DegenerateNeighborSector, NeighborPositioner};
use resolution::ResolutionMapper;

/// Computes the full immutable topology record for `id`.
///
/// Returns positioning diagnostics alongside the record so callers can
/// surface them; they never fail the computation.
pub fn compute_topology<G: GridLibrary + ?Sized>(
    grid: &G,
    id: &CellId,
) -> GridResult<(ImmutableTopology, Vec<DegenerateNeighborSector>)> {
    let resolution = grid.resolution_of(id)?;
    let parent_id = match grid.parent(id) {
        Ok(parent) => Some(parent),
        Err(GridError::NoParent(_)) => None,
        Err(err) => return Err(err),
    };
    let children_ids = match grid.children(id) {
        Ok(children) => children,
        Err(GridError::NoChildren(_)) => Vec::new(),
        Err(err) => return Err(err),
    };
    let positioned = NeighborPositioner::new(grid).position(id)?;
    let resolution_siblings = ResolutionMapper::new(grid).siblings(id)?;

    let topology = ImmutableTopology {
        id: id.clone(),
        resolution,
        parent_id,
        children_ids,
        neighbor_positions: positioned.neighbors,
        resolution_siblings,
        is_pentagon: grid.is_pentagon(id)?,
    };
    Ok((topology, positioned.diagnostics))
}
