use std::f64::consts::PI;

use crate::models::{Coordinate, RouteKind};

/// Produces the geometry for a route. Scoring never looks inside the path
/// beyond its point count, so implementations are free to shape it.
pub trait PathProvider: Send + Sync {
    /// `None` when this provider cannot connect the two points.
    fn path(&self, kind: RouteKind, origin: Coordinate, destination: Coordinate)
    -> Option<Vec<Coordinate>>;
}

/// Synthesizes waypoints between origin and destination.
///
/// The safest path bows away from the straight line to imitate following
/// main roads; the fastest path stays close to it with fewer waypoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpolatedPaths;

impl PathProvider for InterpolatedPaths {
    fn path(
        &self,
        kind: RouteKind,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Option<Vec<Coordinate>> {
        Some(match kind {
            RouteKind::Safest => safest_path(origin, destination),
            RouteKind::Fastest => fastest_path(origin, destination),
        })
    }
}

fn safest_path(origin: Coordinate, destination: Coordinate) -> Vec<Coordinate> {
    let d_lat = destination.lat - origin.lat;
    let d_lng = destination.lng - origin.lng;

    let mut points = Vec::with_capacity(10);
    points.push(origin);
    for i in 1..=8 {
        let progress = f64::from(i) / 9.0;
        let road_offset = (progress * PI).sin() * 0.002;
        points.push(Coordinate {
            lat: origin.lat + d_lat * progress + road_offset,
            lng: origin.lng + d_lng * progress + road_offset * 0.5,
        });
    }
    points.push(destination);
    points
}

fn fastest_path(origin: Coordinate, destination: Coordinate) -> Vec<Coordinate> {
    let d_lat = destination.lat - origin.lat;
    let d_lng = destination.lng - origin.lng;

    let mut points = Vec::with_capacity(6);
    points.push(origin);
    for i in 1..=4 {
        let progress = f64::from(i) / 5.0;
        let road_offset = (progress * PI * 0.5).sin() * 0.001;
        points.push(Coordinate {
            lat: origin.lat + d_lat * progress + road_offset,
            lng: origin.lng + d_lng * progress,
        });
    }
    points.push(destination);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Coordinate = Coordinate {
        lat: -26.1076,
        lng: 28.0567,
    };
    const B: Coordinate = Coordinate {
        lat: -26.2041,
        lng: 28.0473,
    };

    #[test]
    fn safest_path_has_ten_points_and_keeps_endpoints() {
        let path = InterpolatedPaths.path(RouteKind::Safest, A, B).unwrap();
        assert_eq!(path.len(), 10);
        assert_eq!(path.first(), Some(&A));
        assert_eq!(path.last(), Some(&B));
    }

    #[test]
    fn fastest_path_has_six_points() {
        let path = InterpolatedPaths.path(RouteKind::Fastest, A, B).unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path.first(), Some(&A));
        assert_eq!(path.last(), Some(&B));
        // Longitude follows the straight line exactly.
        let expected_lng = A.lng + (B.lng - A.lng) * 0.2;
        assert!((path[1].lng - expected_lng).abs() < 1e-12);
    }

    #[test]
    fn paths_are_deterministic() {
        assert_eq!(
            InterpolatedPaths.path(RouteKind::Safest, A, B),
            InterpolatedPaths.path(RouteKind::Safest, A, B)
        );
    }
}
