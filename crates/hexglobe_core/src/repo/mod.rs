//! Repository layer over tile storage.
//!
//! # Responsibility
//! - Merge shared topology with namespace overlays into client tiles.
//! - Keep record encoding and storage layout out of the service layer.
//!
//! # Invariants
//! - Overlay writes validate visual overrides before touching storage.
//! - Repository APIs return semantic errors (`SourceHasNoContent`) in
//!   addition to storage transport errors.

pub mod tile_repo;
