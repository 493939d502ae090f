//! `GridLibrary` implementation backed by the `h3o` crate.

use super::{GridError, GridLibrary, GridResult};
use crate::model::cell::{CellId, LatLng};
use h3o::{CellIndex, Resolution};

/// Every H3 cell-mode index starts with this hex digit.
const H3_CELL_PREFIX: &str = "8";

/// Stateless H3 adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Grid;

impl H3Grid {
    pub fn new() -> Self {
        Self
    }

    fn index(&self, id: &CellId) -> GridResult<CellIndex> {
        decode(id.as_str())
    }
}

fn decode(raw: &str) -> GridResult<CellIndex> {
    raw.trim()
        .parse::<CellIndex>()
        .map_err(|_| GridError::InvalidCellId(raw.to_string()))
}

fn encode(index: CellIndex) -> CellId {
    CellId::from_canonical(index.to_string())
}

fn resolution(value: i64) -> GridResult<Resolution> {
    u8::try_from(value)
        .ok()
        .and_then(|raw| Resolution::try_from(raw).ok())
        .ok_or(GridError::UnsupportedResolution(value))
}

impl GridLibrary for H3Grid {
    fn parse_cell(&self, raw: &str) -> GridResult<CellId> {
        decode(raw).map(encode)
    }

    fn center(&self, id: &CellId) -> GridResult<LatLng> {
        let center = h3o::LatLng::from(self.index(id)?);
        Ok(LatLng::new(center.lat(), center.lng()))
    }

    fn ring_neighbors(&self, id: &CellId) -> GridResult<Vec<CellId>> {
        let index = self.index(id)?;
        let disk: Vec<CellIndex> = index.grid_disk(1);
        Ok(disk
            .into_iter()
            .filter(|cell| *cell != index)
            .map(encode)
            .collect())
    }

    fn is_pentagon(&self, id: &CellId) -> GridResult<bool> {
        Ok(self.index(id)?.is_pentagon())
    }

    fn parent(&self, id: &CellId) -> GridResult<CellId> {
        let index = self.index(id)?;
        let current = u8::from(index.resolution());
        if current == 0 {
            return Err(GridError::NoParent(id.clone()));
        }
        let coarser = resolution(i64::from(current) - 1)?;
        index
            .parent(coarser)
            .map(encode)
            .ok_or_else(|| GridError::NoParent(id.clone()))
    }

    fn children(&self, id: &CellId) -> GridResult<Vec<CellId>> {
        let index = self.index(id)?;
        let current = u8::from(index.resolution());
        if current >= crate::model::cell::MAX_RESOLUTION {
            return Err(GridError::NoChildren(id.clone()));
        }
        let finer = resolution(i64::from(current) + 1)?;
        Ok(index.children(finer).map(encode).collect())
    }

    fn resolution_of(&self, id: &CellId) -> GridResult<u8> {
        Ok(u8::from(self.index(id)?.resolution()))
    }

    fn cell_at(&self, lat: f64, lng: f64, resolution_level: i64) -> GridResult<CellId> {
        let target = resolution(resolution_level)?;
        let point =
            h3o::LatLng::new(lat, lng).map_err(|_| GridError::InvalidCoordinate { lat, lng })?;
        Ok(encode(point.to_cell(target)))
    }

    fn boundary(&self, id: &CellId) -> GridResult<Vec<LatLng>> {
        let boundary = self.index(id)?.boundary();
        Ok(boundary
            .iter()
            .map(|vertex| LatLng::new(vertex.lat(), vertex.lng()))
            .collect())
    }

    fn scheme_prefix(&self) -> &str {
        H3_CELL_PREFIX
    }
}

#[cfg(test)]
mod tests {
    use super::H3Grid;
    use crate::grid::{GridError, GridLibrary};

    const SAMPLE: &str = "8a194da9a74ffff";
    const PENTAGON_RES0: &str = "8009fffffffffff";

    #[test]
    fn parse_cell_canonicalizes_case() {
        let grid = H3Grid::new();
        let id = grid.parse_cell("8A194DA9A74FFFF").unwrap();
        assert_eq!(id.as_str(), SAMPLE);
    }

    #[test]
    fn parse_cell_rejects_garbage() {
        let grid = H3Grid::new();
        let err = grid.parse_cell("not-a-cell").unwrap_err();
        assert_eq!(err, GridError::InvalidCellId("not-a-cell".to_string()));
    }

    #[test]
    fn hexagon_has_six_ring_neighbors_and_pentagon_five() {
        let grid = H3Grid::new();
        let hexagon = grid.parse_cell(SAMPLE).unwrap();
        let pentagon = grid.parse_cell(PENTAGON_RES0).unwrap();

        assert!(!grid.is_pentagon(&hexagon).unwrap());
        assert!(grid.is_pentagon(&pentagon).unwrap());
        assert_eq!(grid.ring_neighbors(&hexagon).unwrap().len(), 6);
        assert_eq!(grid.ring_neighbors(&pentagon).unwrap().len(), 5);
    }

    #[test]
    fn hierarchy_edges_are_reported() {
        let grid = H3Grid::new();
        let root = grid.parse_cell(PENTAGON_RES0).unwrap();
        assert_eq!(grid.parent(&root).unwrap_err(), GridError::NoParent(root.clone()));

        let finest = grid.cell_at(37.7749, -122.4194, 15).unwrap();
        assert_eq!(
            grid.children(&finest).unwrap_err(),
            GridError::NoChildren(finest.clone())
        );
    }

    #[test]
    fn children_count_depends_on_shape() {
        let grid = H3Grid::new();
        let hexagon = grid.parse_cell(SAMPLE).unwrap();
        let pentagon = grid.parse_cell(PENTAGON_RES0).unwrap();
        assert_eq!(grid.children(&hexagon).unwrap().len(), 7);
        assert_eq!(grid.children(&pentagon).unwrap().len(), 6);
    }

    #[test]
    fn cell_at_rejects_out_of_range_resolution() {
        let grid = H3Grid::new();
        assert_eq!(
            grid.cell_at(0.0, 0.0, 16).unwrap_err(),
            GridError::UnsupportedResolution(16)
        );
        assert_eq!(
            grid.cell_at(0.0, 0.0, -1).unwrap_err(),
            GridError::UnsupportedResolution(-1)
        );
    }

    #[test]
    fn cell_at_rejects_non_finite_coordinates() {
        let grid = H3Grid::new();
        let err = grid.cell_at(f64::NAN, 0.0, 5).unwrap_err();
        assert!(matches!(err, GridError::InvalidCoordinate { .. }));
    }

    #[test]
    fn center_round_trips_through_cell_at() {
        let grid = H3Grid::new();
        let id = grid.parse_cell(SAMPLE).unwrap();
        let center = grid.center(&id).unwrap();
        let again = grid.cell_at(center.lat, center.lng, 10).unwrap();
        assert_eq!(again, id);
    }

    #[test]
    fn boundary_has_one_vertex_per_edge_or_more() {
        let grid = H3Grid::new();
        let id = grid.parse_cell(SAMPLE).unwrap();
        assert!(grid.boundary(&id).unwrap().len() >= 6);
    }
}
