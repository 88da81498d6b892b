//! Great-circle distance between the server and a client location.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Statute miles per minute of arc.
const MILES_PER_ARC_MINUTE: f64 = 1.1515;
const KILOMETERS_PER_MILE: f64 = 1.609344;
const NAUTICAL_MILES_PER_MILE: f64 = 0.8684;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
    NauticalMiles,
}

impl DistanceUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            DistanceUnit::Miles => " mi",
            DistanceUnit::Kilometers => " km",
            DistanceUnit::NauticalMiles => " NM",
        }
    }

    fn from_miles(self, miles: f64) -> f64 {
        match self {
            DistanceUnit::Miles => miles,
            DistanceUnit::Kilometers => miles * KILOMETERS_PER_MILE,
            DistanceUnit::NauticalMiles => miles * NAUTICAL_MILES_PER_MILE,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown distance unit '{0}'")]
pub struct UnknownUnit(pub String);

impl FromStr for DistanceUnit {
    type Err = UnknownUnit;

    /// Accepts the single-letter codes used by speedtest clients
    /// (`M`, `K`, `N`) as well as the unit suffixes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" | "mi" | "miles" => Ok(DistanceUnit::Miles),
            "k" | "km" | "kilometers" | "kilometres" => Ok(DistanceUnit::Kilometers),
            "n" | "nm" | "nautical" => Ok(DistanceUnit::NauticalMiles),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const ORIGIN: Coordinates = Coordinates { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("expected \"lat,lng\", got '{0}'")]
    FieldCount(String),
    #[error("invalid latitude '{0}'")]
    Latitude(String),
    #[error("invalid longitude '{0}'")]
    Longitude(String),
}

/// Parse an ipinfo-style `"lat,lng"` location string.
pub fn parse_location(location: &str) -> Result<Coordinates, CoordinateError> {
    let mut parts = location.split(',');
    let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CoordinateError::FieldCount(location.to_string()));
    };

    let lat = lat
        .trim()
        .parse::<f64>()
        .map_err(|_| CoordinateError::Latitude(lat.to_string()))?;
    let lng = lng
        .trim()
        .parse::<f64>()
        .map_err(|_| CoordinateError::Longitude(lng.to_string()))?;

    Ok(Coordinates { lat, lng })
}

/// Parse a location, logging and falling back to `(0, 0)` when malformed.
pub fn parse_location_or_origin(location: &str) -> Coordinates {
    parse_location(location).unwrap_or_else(|err| {
        tracing::warn!(location = %location, error = %err, "malformed location, using 0,0");
        Coordinates::ORIGIN
    })
}

/// Distance along the surface between two points, in `unit`.
pub fn great_circle(origin: Coordinates, dest: Coordinates, unit: DistanceUnit) -> f64 {
    let phi1 = origin.lat.to_radians();
    let phi2 = dest.lat.to_radians();
    let delta_lambda = (origin.lng - dest.lng).to_radians();

    let cosine = phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * delta_lambda.cos();
    // Rounding can push the cosine just outside acos's domain for
    // identical or antipodal points.
    let angle = cosine.clamp(-1.0, 1.0).acos().to_degrees();

    unit.from_miles(angle * 60.0 * MILES_PER_ARC_MINUTE)
}

/// Formatted distance, e.g. `"12.34 km"`.
pub fn distance(origin: Coordinates, dest: Coordinates, unit: DistanceUnit) -> String {
    format!("{:.2}{}", great_circle(origin, dest, unit), unit.suffix())
}
