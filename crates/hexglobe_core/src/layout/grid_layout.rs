//! Breadth-first offset-coordinate layout around a focal cell.
//!
//! Coordinates: columns grow left to right, rows grow bottom to top, and
//! odd columns sit half a row lower than even columns.
//!
//! # Invariants
//! - The focal cell is always at `(0, 0)`.
//! - A coordinate is claimed by the first cell that reaches it (BFS hop
//!   order, then clockwise key order) and a cell is placed at most once.
//! - Nothing outside `[-ceil(h/2), ceil(h/2)] x [-ceil(w/2), ceil(w/2)]`
//!   is placed.

use crate::grid::GridLibrary;
use crate::model::cell::CellId;
use crate::model::layout::{GridBounds, GridCoord, GridLayout};
use crate::model::tile::PositionKey;
use crate::repo::tile_repo::{RepoResult, TileRepository};
use crate::storage::TileStore;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::Instant;

/// Offset coordinate of the neighbor in direction `key` of the cell at
/// `(row, col)`.
pub fn neighbor_offset(key: PositionKey, (row, col): GridCoord) -> GridCoord {
    let even = col.rem_euclid(2) == 0;
    let upper = if even { row + 1 } else { row };
    let lower = if even { row } else { row - 1 };
    match key {
        PositionKey::TopMiddle => (row + 1, col),
        PositionKey::BottomMiddle => (row - 1, col),
        PositionKey::TopRight => (upper, col + 1),
        PositionKey::BottomRight => (lower, col + 1),
        PositionKey::TopLeft => (upper, col - 1),
        PositionKey::BottomLeft => (lower, col - 1),
    }
}

/// Builds layouts from the repository's cached topology; each reached cell
/// is looked up once for both adjacency and pentagon status.
pub struct GridLayoutEngine<'r, G: GridLibrary, S: TileStore> {
    repo: &'r TileRepository<G, S>,
}

impl<'r, G: GridLibrary, S: TileStore> GridLayoutEngine<'r, G, S> {
    pub fn new(repo: &'r TileRepository<G, S>) -> Self {
        Self { repo }
    }

    /// Lays out cells around `focal` inside a `width x height` window.
    ///
    /// # Errors
    /// - Fails only when `focal` itself is rejected by the grid library.
    ///   Problems with surrounding cells shrink the layout instead.
    pub fn layout(&self, focal: &CellId, width: u32, height: u32) -> RepoResult<GridLayout> {
        let started_at = Instant::now();
        let half_rows = half_extent(height);
        let half_cols = half_extent(width);
        let window = GridBounds {
            min_row: -half_rows,
            max_row: half_rows,
            min_col: -half_cols,
            max_col: half_cols,
        };

        let focal_topology = self.repo.topology(focal)?;

        let mut cells: BTreeMap<GridCoord, CellId> = BTreeMap::new();
        let mut placed: HashSet<CellId> = HashSet::new();
        let mut pentagon_cells = BTreeSet::new();
        let mut bounds = GridBounds::single((0, 0));
        cells.insert((0, 0), focal.clone());
        placed.insert(focal.clone());

        let mut frontier: VecDeque<(CellId, GridCoord)> = VecDeque::new();
        let mut pending_focal = Some(focal_topology);
        frontier.push_back((focal.clone(), (0, 0)));

        while let Some((cell, coord)) = frontier.pop_front() {
            let topology = match pending_focal.take() {
                Some(topology) => topology,
                None => match self.repo.topology(&cell) {
                    Ok(topology) => topology,
                    Err(err) => {
                        warn!(
                            "event=grid_layout module=layout status=warn cell={} error={}",
                            cell, err
                        );
                        continue;
                    }
                },
            };
            if topology.is_pentagon {
                pentagon_cells.insert(coord);
            }
            if cells.len() >= window.area() {
                continue;
            }

            for (key, neighbor) in topology.neighbor_positions.cells() {
                let next = neighbor_offset(key, coord);
                if !window.contains(next) || cells.contains_key(&next) || placed.contains(neighbor)
                {
                    continue;
                }
                cells.insert(next, neighbor.clone());
                placed.insert(neighbor.clone());
                bounds.include(next);
                frontier.push_back((neighbor.clone(), next));
            }
        }

        debug!(
            "event=grid_layout module=layout status=ok focal={} width={} height={} cells={} pentagons={} duration_ms={}",
            focal,
            width,
            height,
            cells.len(),
            pentagon_cells.len(),
            started_at.elapsed().as_millis()
        );

        Ok(GridLayout {
            focal_id: focal.clone(),
            cells,
            bounds,
            pentagon_cells,
        })
    }
}

fn half_extent(size: u32) -> i32 {
    i32::try_from(size.div_ceil(2)).unwrap_or(i32::MAX / 2)
}

#[cfg(test)]
mod tests {
    use super::{neighbor_offset, GridLayoutEngine};
    use crate::grid::{GridLibrary, H3Grid};
    use crate::model::cell::CellId;
    use crate::model::tile::PositionKey;
    use crate::repo::tile_repo::TileRepository;
    use crate::storage::SqliteTileStore;
    use std::collections::HashSet;

    fn repo() -> TileRepository<H3Grid, SqliteTileStore> {
        TileRepository::new(H3Grid::new(), SqliteTileStore::open_in_memory().unwrap())
    }

    #[test]
    fn offsets_follow_column_parity() {
        let even = (0, 0);
        assert_eq!(neighbor_offset(PositionKey::TopMiddle, even), (1, 0));
        assert_eq!(neighbor_offset(PositionKey::TopRight, even), (1, 1));
        assert_eq!(neighbor_offset(PositionKey::BottomRight, even), (0, 1));
        assert_eq!(neighbor_offset(PositionKey::BottomMiddle, even), (-1, 0));
        assert_eq!(neighbor_offset(PositionKey::BottomLeft, even), (0, -1));
        assert_eq!(neighbor_offset(PositionKey::TopLeft, even), (1, -1));

        let odd = (2, -1);
        assert_eq!(neighbor_offset(PositionKey::TopRight, odd), (2, 0));
        assert_eq!(neighbor_offset(PositionKey::BottomRight, odd), (1, 0));
        assert_eq!(neighbor_offset(PositionKey::TopLeft, odd), (2, -2));
        assert_eq!(neighbor_offset(PositionKey::BottomLeft, odd), (1, -2));
    }

    #[test]
    fn focal_neighbors_land_on_the_offset_table() {
        let repo = repo();
        let focal = repo.grid().cell_at(37.7749, -122.4194, 9).unwrap();
        let layout = GridLayoutEngine::new(&repo).layout(&focal, 5, 5).unwrap();

        assert_eq!(layout.cell_at((0, 0)), Some(&focal));
        let topology = repo.topology(&focal).unwrap();
        for (key, neighbor) in topology.neighbor_positions.cells() {
            assert_eq!(layout.coord_of(neighbor), Some(neighbor_offset(key, (0, 0))));
        }

        assert!(layout.bounds.min_row <= -2 && layout.bounds.max_row >= 2);
        assert!(layout.bounds.min_col <= -2 && layout.bounds.max_col >= 2);
        assert!(layout.bounds.min_row >= -3 && layout.bounds.max_col <= 3);

        let unique: HashSet<_> = layout.cells.values().collect();
        assert_eq!(unique.len(), layout.cells.len());
        assert!(layout.pentagon_cells.is_empty());
    }

    #[test]
    fn zero_window_keeps_only_the_focal() {
        let repo = repo();
        let focal = repo.grid().cell_at(51.5074, -0.1278, 7).unwrap();
        let layout = GridLayoutEngine::new(&repo).layout(&focal, 0, 0).unwrap();

        assert_eq!(layout.cells.len(), 1);
        assert_eq!(layout.bounds.area(), 1);
    }

    #[test]
    fn pentagon_focal_is_reported() {
        let repo = repo();
        let focal = repo.grid().parse_cell("8009fffffffffff").unwrap();
        let layout = GridLayoutEngine::new(&repo).layout(&focal, 3, 3).unwrap();

        assert!(layout.pentagon_cells.contains(&(0, 0)));
        assert_eq!(layout.cell_at((0, 0)), Some(&focal));
    }

    /// Pentagon center child of the resolution-0 pentagon `8009fffffffffff`.
    fn pentagon_at(repo: &TileRepository<H3Grid, SqliteTileStore>, resolution: u8) -> CellId {
        let mut cell = repo.grid().parse_cell("8009fffffffffff").unwrap();
        for _ in 0..resolution {
            cell = repo
                .grid()
                .children(&cell)
                .unwrap()
                .into_iter()
                .find(|child| repo.grid().is_pentagon(child).unwrap())
                .unwrap();
        }
        cell
    }

    #[test]
    fn large_window_beside_a_pentagon_is_partial_and_consistent() {
        let repo = repo();
        let pentagon = pentagon_at(&repo, 3);
        let focal = repo.grid().ring_neighbors(&pentagon).unwrap()[0].clone();
        let layout = GridLayoutEngine::new(&repo).layout(&focal, 9, 9).unwrap();

        let window_area = 11 * 11;
        assert!(layout.cells.len() < window_area, "{} cells", layout.cells.len());

        let unique: HashSet<&CellId> = layout.cells.values().collect();
        assert_eq!(unique.len(), layout.cells.len());

        let rows = layout.cells.keys().map(|(row, _)| *row);
        let cols = layout.cells.keys().map(|(_, col)| *col);
        assert_eq!(layout.bounds.min_row, rows.clone().min().unwrap());
        assert_eq!(layout.bounds.max_row, rows.max().unwrap());
        assert_eq!(layout.bounds.min_col, cols.clone().min().unwrap());
        assert_eq!(layout.bounds.max_col, cols.max().unwrap());
        assert!(layout.bounds.min_row >= -5 && layout.bounds.max_row <= 5);
        assert!(layout.bounds.min_col >= -5 && layout.bounds.max_col <= 5);

        let pentagon_coord = layout.coord_of(&pentagon).unwrap();
        assert!(layout.pentagon_cells.contains(&pentagon_coord));
        for coord in &layout.pentagon_cells {
            assert!(repo.is_pentagon(&layout.cells[coord]).unwrap());
        }
    }

    #[test]
    fn malformed_focal_fails() {
        let repo = repo();
        let bogus = CellId::from_canonical("zz");
        assert!(GridLayoutEngine::new(&repo).layout(&bogus, 3, 3).is_err());
    }
}
