//! Address geocoding boundary.
//!
//! # Responsibility
//! - Turn free-text addresses into coordinates for `TileService::locate_address`.
//! - Keep the HTTP client and its wire format behind the `Geocoder` trait.
//!
//! # Invariants
//! - Addresses are trimmed; an empty address never reaches a backend.
//! - Only successful lookups are cached.

use crate::model::cell::LatLng;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod cache;
mod nominatim;

pub use cache::{CachedGeocoder, DEFAULT_CACHE_TTL};
pub use nominatim::{NominatimGeocoder, DEFAULT_NOMINATIM_URL};

pub type GeocodeResult<T> = Result<T, GeocodeError>;

/// Geocoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    EmptyAddress,
    /// Transport failure before a response arrived.
    Http(String),
    /// The service answered with a non-success status.
    Status(u16),
    NotFound(String),
    /// The response body did not have the expected shape.
    InvalidResponse(String),
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAddress => write!(f, "address must not be empty"),
            Self::Http(message) => write!(f, "geocoding request failed: {message}"),
            Self::Status(code) => write!(f, "geocoding service error: {code}"),
            Self::NotFound(address) => write!(f, "no location found for address: {address}"),
            Self::InvalidResponse(message) => {
                write!(f, "unexpected geocoding response: {message}")
            }
        }
    }
}

impl Error for GeocodeError {}

/// Where a geocoded place came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    Cache,
    Nominatim,
    /// Any other backend.
    Backend,
}

/// One geocoding answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedPlace {
    pub coordinates: LatLng,
    /// Display name reported by the backend, or the query itself.
    pub address: String,
    pub source: GeocodeSource,
}

/// Address-to-coordinate lookup.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> GeocodeResult<GeocodedPlace>;
}

impl<T: Geocoder + ?Sized> Geocoder for Box<T> {
    fn geocode(&self, address: &str) -> GeocodeResult<GeocodedPlace> {
        (**self).geocode(address)
    }
}

pub(crate) fn normalize_address(address: &str) -> GeocodeResult<&str> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(GeocodeError::EmptyAddress);
    }
    Ok(trimmed)
}
