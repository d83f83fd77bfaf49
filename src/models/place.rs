//! Gazetteer place record.

use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Whether the point lies inside the WGS84 coordinate range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A named place from the gazetteer.
///
/// Ids are assigned by the source dataset and never rewritten by the index
/// build; the pipeline only reads places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn new(id: i64, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validity() {
        assert!(Place::new(1, "Newark", 40.73, -74.17).point().is_valid());
        assert!(!Place::new(2, "Nowhere", 91.0, 0.0).point().is_valid());
        assert!(!Place::new(3, "Nowhere", 0.0, f64::NAN).point().is_valid());
    }

    #[test]
    fn test_json_shape() {
        let place = Place::new(7, "Boston", 42.36, -71.06);
        let json = serde_json::to_value(&place).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Boston");

        let back: Place = serde_json::from_value(json).unwrap();
        assert_eq!(back, place);
    }
}
