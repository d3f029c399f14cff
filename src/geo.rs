const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Coordinates rounded to two decimal places (~1.1 km), used to share
/// elevation lookups between nearby reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat_hundredths: i64,
    lon_hundredths: i64,
}

impl CoordKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_hundredths: (lat * 100.0).round() as i64,
            lon_hundredths: (lon * 100.0).round() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distances() {
        // Colombo to Kandy: ~94 km
        let dist = haversine_km(6.9271, 79.8612, 7.2906, 80.6337);
        assert!((dist - 94.0).abs() < 3.0, "got {dist}");

        let dist = haversine_km(6.03, 80.21, 6.03, 80.21);
        assert!(dist.abs() < 1e-9);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_km(6.05, 80.22, 6.10, 80.30);
        let b = haversine_km(6.10, 80.30, 6.05, 80.22);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn coord_key_rounds_to_two_decimals() {
        assert_eq!(CoordKey::new(6.9271, 79.8612), CoordKey::new(6.93, 79.86));
        assert_ne!(CoordKey::new(6.9271, 79.8612), CoordKey::new(6.9351, 79.8612));
    }
}
