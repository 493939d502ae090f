//! Direction-aware neighbor positioning.
//!
//! # Responsibility
//! - Turn the library's unordered one-ring into a six-key map whose keys
//!   mean the same compass direction for every cell.
//!
//! # Invariants
//! - Output always has six keys.
//! - A pentagon marker appears iff the ring has five cells.
//! - Sectors are half-open: `[center - 30, center + 30)` degrees.
//! - Equal inputs give equal outputs regardless of ring order.

use crate::grid::{GridLibrary, GridResult};
use crate::model::cell::CellId;
use crate::model::tile::{NeighborMap, NeighborSlot, PositionKey};
use crate::topology::geodesy::{
    angular_distance_deg, great_circle_distance_km, initial_bearing_deg, normalize_deg,
};
use log::warn;
use std::fmt::{Display, Formatter};

const SECTOR_WIDTH_DEG: f64 = 60.0;
const HALF_SECTOR_DEG: f64 = 30.0;

/// Maps a bearing in degrees to the key whose sector contains it.
pub fn sector_for_bearing(bearing_deg: f64) -> PositionKey {
    let shifted = normalize_deg(bearing_deg + HALF_SECTOR_DEG);
    let index = (shifted / SECTOR_WIDTH_DEG).floor() as usize;
    PositionKey::ALL[index.min(PositionKey::ALL.len() - 1)]
}

/// Non-fatal report: two neighbors fell into one sector.
#[derive(Debug, Clone, PartialEq)]
pub struct DegenerateNeighborSector {
    pub cell: CellId,
    pub sector: PositionKey,
    /// Neighbor closer to the focal center; keeps `sector`.
    pub kept: CellId,
    pub displaced: CellId,
    /// Vacant sector the displaced neighbor moved to; `None` means dropped.
    pub relocated_to: Option<PositionKey>,
}

impl Display for DegenerateNeighborSector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "degenerate neighbor sector {} of {}: kept {}, displaced {}",
            self.sector, self.cell, self.kept, self.displaced
        )?;
        match self.relocated_to {
            Some(key) => write!(f, " (relocated to {key})"),
            None => write!(f, " (dropped)"),
        }
    }
}

/// Positioned neighbors plus any diagnostics raised while building them.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedNeighbors {
    pub neighbors: NeighborMap,
    pub diagnostics: Vec<DegenerateNeighborSector>,
}

#[derive(Debug, Clone)]
struct Candidate {
    id: CellId,
    bearing_deg: f64,
    distance_km: f64,
}

/// Assigns position keys to a cell's ring neighbors.
pub struct NeighborPositioner<'g, G: GridLibrary + ?Sized> {
    grid: &'g G,
}

impl<'g, G: GridLibrary + ?Sized> NeighborPositioner<'g, G> {
    pub fn new(grid: &'g G) -> Self {
        Self { grid }
    }

    /// Builds the six-key neighbor map for `id`.
    ///
    /// # Errors
    /// - Propagates grid library errors for malformed ids.
    pub fn position(&self, id: &CellId) -> GridResult<PositionedNeighbors> {
        let origin = self.grid.center(id)?;
        let mut ring = self.grid.ring_neighbors(id)?;
        ring.sort();

        let mut candidates = Vec::with_capacity(ring.len());
        for neighbor in ring {
            let center = self.grid.center(&neighbor)?;
            candidates.push(Candidate {
                id: neighbor,
                bearing_deg: initial_bearing_deg(origin, center),
                distance_km: great_circle_distance_km(origin, center),
            });
        }

        let mut slots: [Option<Candidate>; 6] = Default::default();
        let mut collisions: Vec<(PositionKey, CellId, Candidate)> = Vec::new();
        for candidate in candidates {
            let key = sector_for_bearing(candidate.bearing_deg);
            let slot = &mut slots[key.index()];
            match slot.take() {
                None => *slot = Some(candidate),
                Some(existing) => {
                    let (winner, loser) = if candidate.distance_km < existing.distance_km {
                        (candidate, existing)
                    } else {
                        (existing, candidate)
                    };
                    let kept = winner.id.clone();
                    *slot = Some(winner);
                    collisions.push((key, kept, loser));
                }
            }
        }

        let mut diagnostics = Vec::with_capacity(collisions.len());
        for (sector, kept, loser) in collisions {
            let relocated_to = nearest_vacancy(&slots, loser.bearing_deg);
            let displaced = loser.id.clone();
            if let Some(key) = relocated_to {
                slots[key.index()] = Some(loser);
            }
            let diagnostic = DegenerateNeighborSector {
                cell: id.clone(),
                sector,
                kept,
                displaced,
                relocated_to,
            };
            warn!(
                "event=neighbor_sector_degenerate module=topology status=warn cell={} sector={} kept={} displaced={} relocated_to={}",
                diagnostic.cell,
                diagnostic.sector,
                diagnostic.kept,
                diagnostic.displaced,
                diagnostic.relocated_to.map_or("none", PositionKey::as_str)
            );
            diagnostics.push(diagnostic);
        }

        let neighbors = NeighborMap::from_slots(slots.map(|slot| match slot {
            Some(candidate) => NeighborSlot::Cell(candidate.id),
            None => NeighborSlot::Pentagon,
        }));

        Ok(PositionedNeighbors {
            neighbors,
            diagnostics,
        })
    }
}

fn nearest_vacancy(slots: &[Option<Candidate>; 6], bearing_deg: f64) -> Option<PositionKey> {
    PositionKey::ALL
        .into_iter()
        .filter(|key| slots[key.index()].is_none())
        .min_by(|a, b| {
            angular_distance_deg(bearing_deg, a.sector_center_deg())
                .total_cmp(&angular_distance_deg(bearing_deg, b.sector_center_deg()))
        })
}
