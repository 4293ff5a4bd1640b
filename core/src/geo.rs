//! Great-circle distance between transactions.

use crate::types::Km;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: Km = 6371.0;

/// A point on the globe, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat_rad: f64,
    pub lon_rad: f64,
}

impl Coordinates {
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_rad: latitude.to_radians(),
            lon_rad: longitude.to_radians(),
        }
    }

    pub fn distance_to(&self, other: &Coordinates) -> Km {
        haversine(self.lat_rad, self.lon_rad, other.lat_rad, other.lon_rad)
    }
}

/// Haversine distance in kilometers between two points given in radians.
/// NaN inputs propagate to a NaN distance.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Km {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    c * EARTH_RADIUS_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Coordinates::from_degrees(51.5074, -0.1278);
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = Coordinates::from_degrees(51.0, 0.0);
        let b = Coordinates::from_degrees(52.0, 0.0);
        let d = a.distance_to(&b);
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn london_to_paris() {
        let london = Coordinates::from_degrees(51.5074, -0.1278);
        let paris = Coordinates::from_degrees(48.8566, 2.3522);
        let d = london.distance_to(&paris);
        assert!((d - 343.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = Coordinates::from_degrees(53.4808, -2.2426);
        let b = Coordinates::from_degrees(52.4862, -1.8904);
        assert_eq!(a.distance_to(&b), b.distance_to(&a));
    }

    #[test]
    fn nan_propagates() {
        assert!(haversine(f64::NAN, 0.0, 0.1, 0.1).is_nan());
    }
}
