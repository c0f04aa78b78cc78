//! Spherical-cap helpers on a unit sphere.

use std::f64::consts::PI;

use crate::models::{GeoPoint, Geometry, Position};

/// Vertices used to approximate a cap boundary
const CAP_VERTICES: usize = 64;

/// Great-circle angle between two points, in radians (haversine)
pub fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Polygon approximating the boundary of a spherical cap.
///
/// The outer ring is closed and counter-clockwise (right-hand rule), which is
/// what geo_shape queries expect. A cap containing a pole is cut along the
/// antimeridian and closed through that pole; a cap containing both poles is
/// the whole globe minus the antipodal cap.
pub fn spherical_cap(center: GeoPoint, angular_radius: f64) -> Geometry {
    let delta = angular_radius.clamp(0.0, PI);
    let north = central_angle(center, GeoPoint::new(90.0, 0.0)) < delta;
    let south = central_angle(center, GeoPoint::new(-90.0, 0.0)) < delta;

    match (north, south) {
        (false, false) => Geometry::Polygon(vec![closed(boundary(center, delta))]),
        (true, false) => Geometry::Polygon(vec![polar_ring(boundary(center, delta), 90.0)]),
        (false, true) => Geometry::Polygon(vec![polar_ring(boundary(center, delta), -90.0)]),
        (true, true) => {
            let mut rings = vec![closed(vec![
                vec![-180.0, -90.0],
                vec![180.0, -90.0],
                vec![180.0, 90.0],
                vec![-180.0, 90.0],
            ])];
            let excluded = PI - delta;
            if excluded > f64::EPSILON {
                let antipode = GeoPoint::new(-center.lat, normalize_lon(center.lon + 180.0));
                let mut hole = closed(boundary(antipode, excluded));
                // holes run clockwise
                hole.reverse();
                rings.push(hole);
            }
            Geometry::Polygon(rings)
        }
    }
}

/// Counter-clockwise boundary vertices, not closed
fn boundary(center: GeoPoint, delta: f64) -> Vec<Position> {
    let phi1 = center.lat.to_radians();
    let lambda1 = center.lon.to_radians();

    (0..CAP_VERTICES)
        .map(|i| {
            // Bearings run clockwise from north, so walk them backwards
            let theta = 2.0 * PI * (CAP_VERTICES - i) as f64 / CAP_VERTICES as f64;
            let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
            let lambda2 = lambda1
                + (theta.sin() * delta.sin() * phi1.cos())
                    .atan2(delta.cos() - phi1.sin() * phi2.sin());
            vec![normalize_lon(lambda2.to_degrees()), phi2.to_degrees()]
        })
        .collect()
}

fn closed(mut ring: Vec<Position>) -> Vec<Position> {
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}

/// Ring for a cap around the pole at `pole_lat`.
///
/// Around a pole the boundary crosses every meridian once, so sorting by
/// longitude yields the edge from -180 to 180. The ring follows that edge and
/// returns along the pole's parallel.
fn polar_ring(mut points: Vec<Position>, pole_lat: f64) -> Vec<Position> {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]));
    let edge_lat = antimeridian_lat(&points);

    let mut ring = Vec::with_capacity(points.len() + 5);
    if pole_lat > 0.0 {
        // west to east along the edge, back west along the pole
        ring.push(vec![-180.0, edge_lat]);
        ring.extend(points);
        ring.push(vec![180.0, edge_lat]);
        ring.push(vec![180.0, pole_lat]);
        ring.push(vec![-180.0, pole_lat]);
    } else {
        // east to west along the edge, back east along the pole
        ring.push(vec![180.0, edge_lat]);
        ring.extend(points.into_iter().rev());
        ring.push(vec![-180.0, edge_lat]);
        ring.push(vec![-180.0, pole_lat]);
        ring.push(vec![180.0, pole_lat]);
    }
    closed(ring)
}

/// Latitude where the edge between the easternmost and the westernmost
/// vertex crosses the antimeridian. `points` are sorted by longitude.
fn antimeridian_lat(points: &[Position]) -> f64 {
    let (Some(west), Some(east)) = (points.first(), points.last()) else {
        return 0.0;
    };
    let span = west[0] + 360.0 - east[0];
    if span <= f64::EPSILON {
        return east[1];
    }
    let t = (180.0 - east[0]) / span;
    east[1] + t * (west[1] - east[1])
}

fn normalize_lon(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use geo::Contains;

    use super::*;

    #[test]
    fn test_central_angle_quarter_circle() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 90.0);
        assert!((central_angle(a, b) - PI / 2.0).abs() < 1e-12);
        assert_eq!(central_angle(a, a), 0.0);
    }

    #[test]
    fn test_cap_vertices_sit_on_the_boundary() {
        let center = GeoPoint::new(-34.6, -58.38);
        let radius = 0.01;
        let cap = spherical_cap(center, radius);

        let positions = cap.positions();
        assert_eq!(positions.len(), CAP_VERTICES + 1);
        assert_eq!(positions.first(), positions.last());

        for p in positions {
            let point = GeoPoint::from_position(p).unwrap();
            assert!((central_angle(center, point) - radius).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cap_ring_is_counter_clockwise() {
        let cap = spherical_cap(GeoPoint::new(10.0, 10.0), 0.05);
        let ring: Vec<Position> = cap.positions().into_iter().cloned().collect();

        // Shoelace: positive area means counter-clockwise in lon/lat space
        assert!(twice_signed_area(&ring) > 0.0);
    }

    fn twice_signed_area(ring: &[Position]) -> f64 {
        ring.windows(2)
            .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
            .sum()
    }

    fn contains(cap: &Geometry, lon: f64, lat: f64) -> bool {
        match cap.to_geo() {
            geo::Geometry::Polygon(polygon) => polygon.contains(&geo::Point::new(lon, lat)),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_north_polar_cap_closes_through_the_pole() {
        // 500 km around a point one degree from the pole
        let cap = spherical_cap(GeoPoint::new(89.0, 0.0), 500.0 / 6378.1);
        let Geometry::Polygon(ref rings) = cap else {
            panic!("unexpected geometry {:?}", cap);
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].first(), rings[0].last());
        assert!(rings[0].iter().any(|p| p[1] == 90.0));
        assert!(twice_signed_area(&rings[0]) > 0.0);

        assert!(contains(&cap, 0.0, 89.0));
        assert!(contains(&cap, 170.0, 89.5));
        assert!(contains(&cap, -90.0, 88.0));
        assert!(!contains(&cap, 0.0, 80.0));
        assert!(!contains(&cap, 179.0, 85.0));
    }

    #[test]
    fn test_south_polar_cap_closes_through_the_pole() {
        let cap = spherical_cap(GeoPoint::new(-88.0, 120.0), 500.0 / 6378.1);
        let Geometry::Polygon(ref rings) = cap else {
            panic!("unexpected geometry {:?}", cap);
        };
        assert!(rings[0].iter().any(|p| p[1] == -90.0));
        assert!(twice_signed_area(&rings[0]) > 0.0);

        assert!(contains(&cap, 120.0, -88.0));
        assert!(contains(&cap, -60.0, -89.0));
        assert!(!contains(&cap, 120.0, -80.0));
        assert!(!contains(&cap, -60.0, -86.0));
    }

    #[test]
    fn test_cap_over_both_poles_cuts_out_the_antipode() {
        let cap = spherical_cap(GeoPoint::new(0.0, 180.0), 2.0);
        let Geometry::Polygon(ref rings) = cap else {
            panic!("unexpected geometry {:?}", cap);
        };
        assert_eq!(rings.len(), 2);
        assert!(twice_signed_area(&rings[0]) > 0.0);
        assert!(twice_signed_area(&rings[1]) < 0.0);

        assert!(contains(&cap, 0.0, 89.0));
        assert!(contains(&cap, 0.0, -89.0));
        assert!(!contains(&cap, 0.0, 0.0));
        assert!(!contains(&cap, 30.0, 20.0));
    }

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon(190.0), -170.0);
        assert_eq!(normalize_lon(-190.0), 170.0);
        assert_eq!(normalize_lon(45.0), 45.0);
    }
}
