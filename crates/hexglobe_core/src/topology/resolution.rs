//! Cross-resolution mapping for one geographic location.
//!
//! Coarser entries are true ancestors. Finer entries are NOT an enumeration
//! of descendants: they are the single cell containing the focal cell's
//! centroid at that resolution ("this point at resolution X").

use crate::grid::{GridError, GridLibrary, GridResult};
use crate::model::cell::{is_supported_resolution, CellId, MAX_RESOLUTION, MIN_RESOLUTION};
use std::collections::BTreeMap;

/// Computes `resolution_siblings` for a cell.
pub struct ResolutionMapper<'g, G: GridLibrary + ?Sized> {
    grid: &'g G,
}

impl<'g, G: GridLibrary + ?Sized> ResolutionMapper<'g, G> {
    pub fn new(grid: &'g G) -> Self {
        Self { grid }
    }

    /// Returns the id at every resolution `0..=15`.
    ///
    /// The ancestor chain is walked once; each intermediate parent is reused
    /// for every coarser entry. The centroid is fetched once for all finer
    /// entries.
    pub fn siblings(&self, id: &CellId) -> GridResult<BTreeMap<u8, CellId>> {
        let own = self.grid.resolution_of(id)?;
        let mut siblings = BTreeMap::new();
        siblings.insert(own, id.clone());

        let mut current = id.clone();
        for target in (MIN_RESOLUTION..own).rev() {
            current = self.grid.parent(&current)?;
            siblings.insert(target, current.clone());
        }

        if own < MAX_RESOLUTION {
            let center = self.grid.center(id)?;
            for target in own + 1..=MAX_RESOLUTION {
                let cell = self
                    .grid
                    .cell_at(center.lat, center.lng, i64::from(target))?;
                siblings.insert(target, cell);
            }
        }

        Ok(siblings)
    }

    /// Returns the id at a single `target` resolution.
    ///
    /// # Errors
    /// - `UnsupportedResolution` when `target` is outside `0..=15`.
    pub fn sibling_at(&self, id: &CellId, target: i64) -> GridResult<CellId> {
        if !is_supported_resolution(target) {
            return Err(GridError::UnsupportedResolution(target));
        }
        let own = i64::from(self.grid.resolution_of(id)?);
        if target == own {
            return Ok(id.clone());
        }
        if target < own {
            let mut current = id.clone();
            for _ in target..own {
                current = self.grid.parent(&current)?;
            }
            return Ok(current);
        }
        let center = self.grid.center(id)?;
        self.grid.cell_at(center.lat, center.lng, target)
    }
}
