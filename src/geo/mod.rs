use crate::models::driver::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_km(a, b) * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, haversine_m};
    use crate::models::driver::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: -26.2041,
            lng: 28.0473,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn johannesburg_to_pretoria_is_around_55_km() {
        let johannesburg = GeoPoint {
            lat: -26.2041,
            lng: 28.0473,
        };
        let pretoria = GeoPoint {
            lat: -25.7479,
            lng: 28.2293,
        };
        let distance = haversine_km(&johannesburg, &pretoria);
        assert!((distance - 55.0).abs() < 5.0);
    }

    #[test]
    fn small_latitude_step_is_around_111_meters() {
        let a = GeoPoint {
            lat: -26.2041,
            lng: 28.0473,
        };
        let b = GeoPoint {
            lat: -26.2031,
            lng: 28.0473,
        };
        let distance = haversine_m(&a, &b);
        assert!((distance - 111.0).abs() < 2.0);
    }
}
