//! Rectangular offset-coordinate layout around a focal cell.

use crate::model::cell::CellId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `(row, col)` in offset coordinates; rows grow upward, columns rightward.
pub type GridCoord = (i32, i32);

/// Inclusive extent actually reached by a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_row: i32,
    pub max_row: i32,
    pub min_col: i32,
    pub max_col: i32,
}

impl GridBounds {
    pub fn single(coord: GridCoord) -> Self {
        Self {
            min_row: coord.0,
            max_row: coord.0,
            min_col: coord.1,
            max_col: coord.1,
        }
    }

    pub fn include(&mut self, (row, col): GridCoord) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
    }

    pub fn contains(&self, (row, col): GridCoord) -> bool {
        (self.min_row..=self.max_row).contains(&row) && (self.min_col..=self.max_col).contains(&col)
    }

    /// Number of coordinates inside the bounds.
    pub fn area(&self) -> usize {
        let rows = (self.max_row - self.min_row + 1).max(0) as usize;
        let cols = (self.max_col - self.min_col + 1).max(0) as usize;
        rows * cols
    }
}

/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub focal_id: CellId,
    pub cells: BTreeMap<GridCoord, CellId>,
    pub bounds: GridBounds,
    pub pentagon_cells: BTreeSet<GridCoord>,
}

impl GridLayout {
    pub fn cell_at(&self, coord: GridCoord) -> Option<&CellId> {
        self.cells.get(&coord)
    }

    pub fn coord_of(&self, id: &CellId) -> Option<GridCoord> {
        self.cells
            .iter()
            .find(|(_, cell)| *cell == id)
            .map(|(coord, _)| *coord)
    }
}

/// Grid query response shape: `grid` is keyed `"row,col"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridResponse {
    pub center_tile_id: CellId,
    pub grid: BTreeMap<String, CellId>,
    pub bounds: GridBounds,
    pub pentagon_positions: Vec<[i32; 2]>,
}

impl From<&GridLayout> for GridResponse {
    fn from(layout: &GridLayout) -> Self {
        Self {
            center_tile_id: layout.focal_id.clone(),
            grid: layout
                .cells
                .iter()
                .map(|((row, col), id)| (format!("{row},{col}"), id.clone()))
                .collect(),
            bounds: layout.bounds,
            pentagon_positions: layout
                .pentagon_cells
                .iter()
                .map(|(row, col)| [*row, *col])
                .collect(),
        }
    }
}
