//! Domain model for tiles, topology and layouts.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one merged tile shape over shared topology and namespaced overlays.
//!
//! # Invariants
//! - Every tile is identified by a `CellId` minted by the grid library.
//! - Topology records are immutable; only overlays change.

pub mod cell;
pub mod layout;
pub mod namespace;
pub mod tile;
