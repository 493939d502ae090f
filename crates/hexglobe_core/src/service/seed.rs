//! Sample data seeding for demos and manual testing.

use crate::grid::GridLibrary;
use crate::model::cell::CellId;
use crate::model::namespace::Namespace;
use crate::model::tile::VisualProperties;
use crate::repo::tile_repo::RepoError;
use crate::service::tile_service::{TileService, TileServiceResult};
use crate::storage::TileStore;
use log::info;
use std::collections::{HashSet, VecDeque};

const SAMPLE_BORDER_THICKNESS: u32 = 2;
const SAMPLE_FILL_OPACITY: f64 = 0.7;

/// Writes sample content and colors to every cell within `radius` rings of
/// the cell containing `(lat, lng)`.
///
/// Cells are visited breadth-first; the returned ids start with the center.
pub fn seed_sample_tiles<G: GridLibrary, S: TileStore>(
    service: &TileService<G, S>,
    namespace: &str,
    lat: f64,
    lng: f64,
    resolution: i64,
    radius: u32,
) -> TileServiceResult<Vec<CellId>> {
    let namespace = Namespace::parse(namespace).map_err(RepoError::from)?;
    let repo = service.repo();
    let grid = repo.grid();
    let center = grid.cell_at(lat, lng, resolution)?;

    let mut visited: HashSet<CellId> = HashSet::from([center.clone()]);
    let mut queue: VecDeque<(CellId, u32)> = VecDeque::from([(center, 0)]);
    let mut seeded = Vec::new();

    while let Some((id, hops)) = queue.pop_front() {
        let index = seeded.len();
        let shape = if grid.is_pentagon(&id)? {
            "pentagon"
        } else {
            "hexagon"
        };
        repo.set_content(
            &id,
            &namespace,
            Some(format!("Sample content for {shape} {id}")),
        )?;
        repo.set_visual(&id, &namespace, &sample_visual(index))?;

        if hops < radius {
            let mut ring = grid.ring_neighbors(&id)?;
            ring.sort();
            for neighbor in ring {
                if visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor, hops + 1));
                }
            }
        }
        seeded.push(id);
    }

    info!(
        "event=seed_tiles module=service status=ok namespace={} resolution={} radius={} tiles={}",
        namespace,
        resolution,
        radius,
        seeded.len()
    );
    Ok(seeded)
}

fn sample_visual(index: usize) -> VisualProperties {
    let red = (20 * index) % 256;
    let green = (40 * index) % 256;
    let blue = (60 * index) % 256;
    VisualProperties {
        border_thickness: Some(SAMPLE_BORDER_THICKNESS),
        fill_color: Some(format!("#{red:02x}{green:02x}{blue:02x}")),
        fill_opacity: Some(SAMPLE_FILL_OPACITY),
        ..VisualProperties::default()
    }
}

#[cfg(test)]
mod tests {
    use super::sample_visual;

    #[test]
    fn sample_colors_wrap_per_channel() {
        assert_eq!(sample_visual(0).fill_color.as_deref(), Some("#000000"));
        assert_eq!(sample_visual(1).fill_color.as_deref(), Some("#14283c"));
        assert_eq!(sample_visual(13).fill_color.as_deref(), Some("#04080c"));
        assert!(sample_visual(5).validate().is_ok());
    }
}
