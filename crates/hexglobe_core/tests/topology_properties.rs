use hexglobe_core::topology::compute_topology;
use hexglobe_core::topology::neighbors::{sector_for_bearing, NeighborPositioner};
use hexglobe_core::topology::resolution::ResolutionMapper;
use hexglobe_core::{CellId, GridLibrary, H3Grid, PositionKey};
use std::collections::HashSet;

const SAMPLE_POINTS: &[(f64, f64)] = &[
    (37.7749, -122.4194),
    (-33.8688, 151.2093),
    (64.1466, -21.9426),
    (0.0, 0.0),
    (-54.8019, -68.3030),
];

fn sample_cells(grid: &H3Grid) -> Vec<CellId> {
    let mut cells = Vec::new();
    for (lat, lng) in SAMPLE_POINTS {
        for resolution in [0, 1, 4, 9, 12, 15] {
            cells.push(grid.cell_at(*lat, *lng, resolution).unwrap());
        }
    }
    cells.extend(pentagon_chain(grid, 6));
    cells
}

/// A resolution-0 pentagon and its pentagon center children down to
/// `depth`.
fn pentagon_chain(grid: &H3Grid, depth: u8) -> Vec<CellId> {
    let mut chain = vec![grid.parse_cell("8009fffffffffff").unwrap()];
    for _ in 0..depth {
        let last = chain.last().unwrap().clone();
        let child = grid
            .children(&last)
            .unwrap()
            .into_iter()
            .find(|child| grid.is_pentagon(child).unwrap())
            .unwrap();
        chain.push(child);
    }
    chain
}

#[test]
fn neighbor_map_has_six_keys_and_marker_iff_pentagon() {
    let grid = H3Grid::new();
    let positioner = NeighborPositioner::new(&grid);

    for cell in sample_cells(&grid) {
        let positioned = positioner.position(&cell).unwrap();
        let neighbors = positioned.neighbors;
        assert_eq!(neighbors.len(), 6, "cell {cell}");
        assert!(neighbors.is_complete(), "cell {cell}");
        assert!(neighbors.marker_count() <= 1, "cell {cell}");
        assert_eq!(
            neighbors.marker_count() == 1,
            grid.is_pentagon(&cell).unwrap(),
            "cell {cell}"
        );

        let ring: HashSet<CellId> = grid.ring_neighbors(&cell).unwrap().into_iter().collect();
        let placed: HashSet<CellId> = neighbors.cells().map(|(_, id)| id.clone()).collect();
        assert_eq!(placed, ring, "every ring neighbor is addressable for {cell}");
    }
}

#[test]
fn resolution_siblings_are_anchored_on_the_cell_and_its_ancestors() {
    let grid = H3Grid::new();
    let mapper = ResolutionMapper::new(&grid);

    for cell in sample_cells(&grid) {
        let resolution = grid.resolution_of(&cell).unwrap();
        let siblings = mapper.siblings(&cell).unwrap();
        assert_eq!(siblings.len(), 16);
        assert_eq!(siblings.get(&resolution), Some(&cell));

        let mut ancestor = cell.clone();
        for target in (0..resolution).rev() {
            ancestor = grid.parent(&ancestor).unwrap();
            assert_eq!(siblings.get(&target), Some(&ancestor), "cell {cell} target {target}");
        }
        for target in resolution + 1..=15 {
            assert_eq!(grid.resolution_of(&siblings[&target]).unwrap(), target);
        }
    }
}

#[test]
fn sector_boundaries_are_lower_inclusive() {
    assert_eq!(sector_for_bearing(30.0), PositionKey::TopRight);
    assert_eq!(sector_for_bearing(29.999), PositionKey::TopMiddle);
    assert_eq!(sector_for_bearing(330.0), PositionKey::TopMiddle);
    assert_eq!(sector_for_bearing(329.999), PositionKey::TopLeft);
    assert_eq!(sector_for_bearing(180.0), PositionKey::BottomMiddle);
    assert_eq!(sector_for_bearing(-45.0), PositionKey::TopLeft);
}

#[test]
fn topology_record_is_consistent_for_pentagons() {
    let grid = H3Grid::new();
    for cell in pentagon_chain(&grid, 3) {
        let (topology, _) = compute_topology(&grid, &cell).unwrap();
        assert!(topology.is_pentagon);
        assert_eq!(topology.neighbor_positions.marker_count(), 1);
        assert_eq!(topology.children_ids.len(), 6);
        assert_eq!(topology.resolution_siblings[&topology.resolution], cell);
    }
}
