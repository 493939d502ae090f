//! OpenStreetMap Nominatim search client.

use super::{
    normalize_address, GeocodeError, GeocodeResult, GeocodeSource, GeocodedPlace, Geocoder,
};
use crate::model::cell::LatLng;
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// Blocking Nominatim client; Nominatim rejects requests without a user agent.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>) -> GeocodeResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("HexGlobe/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GeocodeError::Http(err.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, address: &str) -> GeocodeResult<GeocodedPlace> {
        let address = normalize_address(address)?;
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .map_err(|err| GeocodeError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "event=geocode module=geocode status=error backend=nominatim http_status={}",
                status.as_u16()
            );
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|err| GeocodeError::Http(err.to_string()))?;
        let place = parse_search_response(address, &body)?;
        info!(
            "event=geocode module=geocode status=ok backend=nominatim lat={} lng={}",
            place.coordinates.lat, place.coordinates.lng
        );
        Ok(place)
    }
}

/// Reads the first hit of a `format=json` search response.
fn parse_search_response(address: &str, body: &str) -> GeocodeResult<GeocodedPlace> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|err| GeocodeError::InvalidResponse(err.to_string()))?;
    let Some(hit) = hits.into_iter().next() else {
        return Err(GeocodeError::NotFound(address.to_string()));
    };

    let coordinate = |field: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| GeocodeError::InvalidResponse(format!("{field} `{value}`")))
    };
    Ok(GeocodedPlace {
        coordinates: LatLng::new(coordinate("lat", &hit.lat)?, coordinate("lon", &hit.lon)?),
        address: hit.display_name.unwrap_or_else(|| address.to_string()),
        source: GeocodeSource::Nominatim,
    })
}
