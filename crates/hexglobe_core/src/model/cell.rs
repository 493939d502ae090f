//! Cell identity and geographic coordinate types.
//!
//! # Responsibility
//! - Define the opaque `CellId` token shared by every layer.
//! - Define the `LatLng` value exchanged with the grid library.
//!
//! # Invariants
//! - A `CellId` is only minted by a `GridLibrary` implementation, so every
//!   instance held by core code is already canonical.
//! - Resolutions live in `MIN_RESOLUTION..=MAX_RESOLUTION`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Coarsest supported tessellation level.
pub const MIN_RESOLUTION: u8 = 0;
/// Finest supported tessellation level.
pub const MAX_RESOLUTION: u8 = 15;

/// Opaque identifier of one cell at one resolution.
///
/// The string form is the grid library's canonical token (lowercase H3 hex
/// for `H3Grid`). Ordering is lexical and only used for deterministic
/// iteration and lock ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    /// Wraps an already canonical token.
    ///
    /// Grid library implementations call this after validating input; core
    /// code must not use it to fabricate ids from user text.
    pub fn from_canonical(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CellId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CellId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Returns whether `resolution` is inside the supported range.
pub fn is_supported_resolution(resolution: i64) -> bool {
    (i64::from(MIN_RESOLUTION)..=i64::from(MAX_RESOLUTION)).contains(&resolution)
}

#[cfg(test)]
mod tests {
    use super::{is_supported_resolution, CellId};

    #[test]
    fn cell_id_serializes_as_plain_string() {
        let id = CellId::from_canonical("8a194da9a74ffff");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"8a194da9a74ffff\"");
    }

    #[test]
    fn supported_resolution_range_is_inclusive() {
        assert!(is_supported_resolution(0));
        assert!(is_supported_resolution(15));
        assert!(!is_supported_resolution(-1));
        assert!(!is_supported_resolution(16));
    }
}
