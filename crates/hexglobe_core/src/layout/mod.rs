//! Layout of the globe surface onto a flat rectangular grid.
//!
//! # Responsibility
//! - Place a focal cell and its surroundings on offset coordinates for
//!   rendering.
//!
//! # Invariants
//! - Layouts are derived on demand and never persisted.

pub mod grid_layout;

pub use grid_layout::{neighbor_offset, GridLayoutEngine};
