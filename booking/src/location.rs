use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6_371.0;

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl std::str::FromStr for Coordinates {
    type Err = LocationError;

    /// Parses `"lat,lng"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LocationError::NotFound(format!("invalid coordinates: {s}"));
        let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub formatted_address: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("no location matches: {0}")]
    NotFound(String),

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Address search and device geolocation. Opaque to the booking core.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn search_location(&self, query: &str) -> Result<ResolvedLocation, LocationError>;
    async fn detect_location(&self) -> Result<Coordinates, LocationError>;
}

/// Resolves queries against a fixed gazetteer and reports a configured
/// device position.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationProvider {
    places: Vec<ResolvedLocation>,
    device: Option<Coordinates>,
}

impl StaticLocationProvider {
    pub fn new(places: Vec<ResolvedLocation>, device: Option<Coordinates>) -> Self {
        Self { places, device }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn search_location(&self, query: &str) -> Result<ResolvedLocation, LocationError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(LocationError::NotFound(query.to_string()));
        }

        // Literal coordinates resolve to themselves.
        if let Ok(coordinates) = needle.parse::<Coordinates>() {
            return Ok(ResolvedLocation {
                coordinates,
                formatted_address: format!("{:.5}, {:.5}", coordinates.lat, coordinates.lng),
            });
        }

        self.places
            .iter()
            .find(|p| p.formatted_address.to_lowercase().contains(&needle))
            .cloned()
            .ok_or_else(|| LocationError::NotFound(query.to_string()))
    }

    async fn detect_location(&self) -> Result<Coordinates, LocationError> {
        self.device
            .ok_or_else(|| LocationError::Unavailable("no device position configured".into()))
    }
}
