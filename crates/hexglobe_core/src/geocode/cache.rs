//! In-memory TTL cache in front of another geocoder.

use super::{normalize_address, GeocodeResult, GeocodeSource, GeocodedPlace, Geocoder};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a lookup is reused.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    place: GeocodedPlace,
    stored_at: Instant,
}

/// Caches successful lookups by trimmed address for `ttl`.
pub struct CachedGeocoder<G: Geocoder> {
    inner: G,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(inner: G, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn geocode(&self, address: &str) -> GeocodeResult<GeocodedPlace> {
        let key = normalize_address(address)?;
        if let Some(entry) = self.entries().get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                debug!("event=geocode module=geocode status=ok source=cache");
                return Ok(GeocodedPlace {
                    source: GeocodeSource::Cache,
                    ..entry.place.clone()
                });
            }
        }

        // Lookup runs unlocked; concurrent misses for one address both query.
        let place = self.inner.geocode(key)?;
        self.entries().insert(
            key.to_string(),
            Entry {
                place: place.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::CachedGeocoder;
    use crate::geocode::{
        GeocodeError, GeocodeResult, GeocodeSource, GeocodedPlace, Geocoder,
    };
    use crate::model::cell::LatLng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every address with a fixed point and counts calls.
    #[derive(Default)]
    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    impl Geocoder for CountingGeocoder {
        fn geocode(&self, address: &str) -> GeocodeResult<GeocodedPlace> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if address == "atlantis" {
                return Err(GeocodeError::NotFound(address.to_string()));
            }
            Ok(GeocodedPlace {
                coordinates: LatLng::new(37.7749, -122.4194),
                address: format!("{address}, resolved"),
                source: GeocodeSource::Backend,
            })
        }
    }

    #[test]
    fn repeated_lookup_is_served_from_cache() {
        let cached = CachedGeocoder::new(CountingGeocoder::default());

        let first = cached.geocode("San Francisco").unwrap();
        assert_eq!(first.source, GeocodeSource::Backend);
        let second = cached.geocode("  San Francisco ").unwrap();
        assert_eq!(second.source, GeocodeSource::Cache);
        assert_eq!(second.coordinates, first.coordinates);
        assert_eq!(second.address, "San Francisco, resolved");
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        cached.geocode("Oakland").unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let cached = CachedGeocoder::with_ttl(CountingGeocoder::default(), Duration::ZERO);
        cached.geocode("Berlin").unwrap();
        let again = cached.geocode("Berlin").unwrap();
        assert_eq!(again.source, GeocodeSource::Backend);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cached = CachedGeocoder::new(CountingGeocoder::default());
        assert!(cached.geocode("atlantis").is_err());
        assert!(cached.geocode("atlantis").is_err());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);

        assert_eq!(cached.geocode(""), Err(GeocodeError::EmptyAddress));
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }
}
