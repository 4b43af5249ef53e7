//! Location key type and validation errors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors that can occur when building a location key.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside `[-90, 90]` or not finite.
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    /// Longitude is outside `[-180, 180]` or not finite.
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Text could not be parsed as `lat,lon`.
    #[error("Invalid location '{0}': expected LAT,LON")]
    Parse(String),
}

/// Identifies the collection of entries fetched for one geographic query.
///
/// Immutable once created. Equality and hashing are exact on the coordinate
/// bits; `-0.0` is normalized to `0.0` on construction so both spellings of
/// zero select the same collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationKey {
    latitude: f64,
    longitude: f64,
}

impl LocationKey {
    /// Creates a validated location key.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        if !latitude.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(CoordError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(CoordError::InvalidLongitude(longitude));
        }

        // Adding 0.0 turns -0.0 into 0.0 and leaves everything else alone
        Ok(Self {
            latitude: latitude + 0.0,
            longitude: longitude + 0.0,
        })
    }

    /// Latitude in degrees.
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

// NaN is rejected by `new`, so bitwise comparison is a total equivalence.
impl Eq for LocationKey {}

impl Hash for LocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

impl FromStr for LocationKey {
    type Err = CoordError;

    /// Parses `LAT,LON`, optionally wrapped in parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);

        let (lat, lon) = inner
            .split_once(',')
            .ok_or_else(|| CoordError::Parse(s.to_string()))?;

        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoordError::Parse(s.to_string()))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| CoordError::Parse(s.to_string()))?;

        Self::new(lat, lon)
    }
}
