//! Geographic point types

use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build coordinates only when both components are finite and in range
    pub fn checked(lat: f64, lng: f64) -> Option<Self> {
        let coords = Self { lat, lng };
        coords.is_valid().then_some(coords)
    }

    /// lat in [-90, 90], lng in [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A location in the global matrix order: the depot (index 0) or a
/// resolved student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl Point {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: Some(name.into()),
            coordinates,
        }
    }

    pub fn unnamed(coordinates: Coordinates) -> Self {
        Self {
            name: None,
            coordinates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(Coordinates::checked(91.0, 0.0).is_none());
        assert!(Coordinates::checked(0.0, -180.5).is_none());
        assert!(Coordinates::checked(f64::NAN, 0.0).is_none());
        assert_eq!(Coordinates::checked(-90.0, 180.0), Some(Coordinates::new(-90.0, 180.0)));
    }

    #[test]
    fn test_point_serializes_flat() {
        let point = Point::new("School", Coordinates::new(24.7, 46.6));
        let json = serde_json::to_value(&point).unwrap();

        assert_eq!(json["name"], "School");
        assert_eq!(json["lat"], 24.7);
        assert_eq!(json["lng"], 46.6);
    }

    #[test]
    fn test_unnamed_point_omits_name() {
        let json = serde_json::to_value(Point::unnamed(Coordinates::new(1.0, 2.0))).unwrap();
        assert!(json.get("name").is_none());
    }
}
