//! WKT polygon helper.
//!
//! Closes the ring if the first and last point differ, then renders
//! `POLYGON((...))`.

pub fn wkt_polygon(points: &[(f64, f64)]) -> String {
    if points.is_empty() {
        return String::new();
    }

    let mut ring = points.to_vec();
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    let coords: Vec<String> = ring
        .iter()
        .map(|(lon, lat)| format!("{} {}", lon, lat))
        .collect();

    format!("POLYGON(({}))", coords.join(", "))
}

/// Great-circle distance in metres (haversine).
pub fn haversine_distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let sin_half_phi = (d_phi / 2.0).sin();
    let sin_half_lambda = (d_lambda / 2.0).sin();

    let a = sin_half_phi * sin_half_phi + phi1.cos() * phi2.cos() * sin_half_lambda * sin_half_lambda;
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_open_ring() {
        let wkt = wkt_polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert!(wkt.starts_with("POLYGON(("));
        assert!(wkt.ends_with("0 0))"));
    }

    #[test]
    fn leaves_already_closed_ring_alone() {
        let pts = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
        let wkt = wkt_polygon(&pts);
        assert_eq!(wkt.matches("0 0").count(), 2);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let d = haversine_distance_m((35.0, 51.0), (35.0, 51.0));
        assert!(d < 1e-6);
    }

    #[test]
    fn haversine_matches_known_distance_roughly() {
        // Tehran to Mashhad is roughly 740 km as the crow flies.
        let d = haversine_distance_m((35.6892, 51.3890), (36.2605, 59.6168));
        assert!(d > 700_000.0 && d < 800_000.0, "got {d}");
    }
}
