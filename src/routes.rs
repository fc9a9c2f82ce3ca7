use geo::HaversineDistance;

use crate::error::{Result, SafetyError};
use crate::models::{Coordinate, RouteCandidate, RouteKind, SafetyReport};
use crate::paths::{InterpolatedPaths, PathProvider};
use crate::reports::planar_distance;
use crate::safety::score_route;

/// Origin and destination closer than this (in degrees, per axis) are the
/// same place.
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Builds the `[safest, fastest]` pair for a trip.
pub struct RouteRankingService {
    paths: Box<dyn PathProvider>,
    risk_radius: f64,
}

impl RouteRankingService {
    pub fn new(paths: Box<dyn PathProvider>, risk_radius: f64) -> Self {
        Self { paths, risk_radius }
    }

    pub fn interpolated(risk_radius: f64) -> Self {
        Self::new(Box::new(InterpolatedPaths), risk_radius)
    }

    /// Always returns exactly two candidates, safest first.
    pub fn plan_routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        reports: &[SafetyReport],
    ) -> Result<Vec<RouteCandidate>> {
        origin.validate()?;
        destination.validate()?;
        if (origin.lat - destination.lat).abs() < DEGENERATE_EPSILON
            && (origin.lng - destination.lng).abs() < DEGENERATE_EPSILON
        {
            return Err(SafetyError::DegenerateRoute);
        }

        [RouteKind::Safest, RouteKind::Fastest]
            .into_iter()
            .map(|kind| self.candidate(kind, origin, destination, reports))
            .collect()
    }

    fn candidate(
        &self,
        kind: RouteKind,
        origin: Coordinate,
        destination: Coordinate,
        reports: &[SafetyReport],
    ) -> Result<RouteCandidate> {
        let path = self.paths.path(kind, origin, destination).unwrap_or_else(|| {
            log::warn!("No {kind} path from provider, falling back to interpolation");
            InterpolatedPaths
                .path(kind, origin, destination)
                .unwrap_or_else(|| vec![origin, destination])
        });

        let score = score_route(kind, &path, reports)?;
        let distance_km = straight_line_km(origin, destination) * kind.detour_factor();
        let distance_km = (distance_km * 10.0).round() / 10.0;
        let duration_min = (distance_km * kind.minutes_per_km()).ceil() as u32;
        let hazard_count = hazards_along(&path, reports, self.risk_radius);

        Ok(RouteCandidate {
            id: kind.to_string(),
            kind,
            color: kind.color().to_string(),
            path,
            distance_km,
            duration_min,
            safety_score: score.safety_score,
            warnings: score.warnings,
            hazard_count,
        })
    }
}

fn straight_line_km(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point()) / 1000.0
}

/// Distinct dangerous reports within `radius` of any point on the path.
fn hazards_along(path: &[Coordinate], reports: &[SafetyReport], radius: f64) -> usize {
    reports
        .iter()
        .filter(|r| r.report_type.is_dangerous())
        .filter(|r| {
            let at = r.location.coordinate();
            path.iter().any(|&p| planar_distance(p, at) < radius)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RISK_RADIUS;
    use crate::models::{ReportLocation, ReportType};
    use chrono::DateTime;
    use uuid::Uuid;

    const SANDTON: Coordinate = Coordinate {
        lat: -26.1076,
        lng: 28.0567,
    };
    const CARLTON: Coordinate = Coordinate {
        lat: -26.2041,
        lng: 28.0473,
    };

    fn service() -> RouteRankingService {
        RouteRankingService::interpolated(DEFAULT_RISK_RADIUS)
    }

    fn report(kind: ReportType, at: Coordinate) -> SafetyReport {
        SafetyReport {
            id: Uuid::new_v4(),
            report_type: kind,
            title: String::new(),
            description: String::new(),
            location: ReportLocation {
                lat: at.lat,
                lng: at.lng,
                address: String::new(),
            },
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            user_id: String::new(),
            user_name: String::new(),
            upvotes: 0,
            verified: false,
        }
    }

    #[test]
    fn returns_safest_then_fastest() {
        let routes = service().plan_routes(SANDTON, CARLTON, &[]).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].kind, RouteKind::Safest);
        assert_eq!(routes[1].kind, RouteKind::Fastest);
        assert_eq!(routes[0].id, "safest");
        assert!(routes[0].safety_score > routes[1].safety_score);
    }

    #[test]
    fn ordering_holds_in_both_directions() {
        for (from, to) in [(SANDTON, CARLTON), (CARLTON, SANDTON)] {
            let routes = service().plan_routes(from, to, &[]).unwrap();
            assert_eq!(routes[0].kind, RouteKind::Safest);
            assert!(routes[0].safety_score > routes[1].safety_score);
        }
    }

    #[test]
    fn same_origin_and_destination_is_degenerate() {
        assert_eq!(
            service().plan_routes(SANDTON, SANDTON, &[]).unwrap_err(),
            SafetyError::DegenerateRoute
        );
        let nudged = Coordinate {
            lat: SANDTON.lat + 1e-9,
            lng: SANDTON.lng,
        };
        assert_eq!(
            service().plan_routes(SANDTON, nudged, &[]).unwrap_err(),
            SafetyError::DegenerateRoute
        );
    }

    #[test]
    fn distance_and_duration_follow_kind() {
        let routes = service().plan_routes(SANDTON, CARLTON, &[]).unwrap();
        // About 10.8km as the crow flies.
        assert!(routes[0].distance_km > routes[1].distance_km);
        assert!(routes[0].distance_km > 13.0 && routes[0].distance_km < 15.0);
        assert_eq!(
            routes[1].duration_min,
            (routes[1].distance_km * 2.0).ceil() as u32
        );
        assert_eq!(routes[0].color, "#22c55e");
    }

    #[test]
    fn hazards_are_counted_but_do_not_change_score() {
        let reports = vec![
            report(ReportType::Harassment, SANDTON),
            report(ReportType::SafeSpace, SANDTON),
            report(ReportType::Emergency, Coordinate { lat: 0.0, lng: 0.0 }),
        ];
        let routes = service().plan_routes(SANDTON, CARLTON, &reports).unwrap();
        assert_eq!(routes[0].hazard_count, 1);
        assert_eq!(routes[0].safety_score, 9.2);
        assert_eq!(routes[1].safety_score, 6.8);
    }

    struct NoPaths;

    impl PathProvider for NoPaths {
        fn path(&self, _: RouteKind, _: Coordinate, _: Coordinate) -> Option<Vec<Coordinate>> {
            None
        }
    }

    #[test]
    fn falls_back_when_provider_has_no_path() {
        let service = RouteRankingService::new(Box::new(NoPaths), DEFAULT_RISK_RADIUS);
        let routes = service.plan_routes(SANDTON, CARLTON, &[]).unwrap();
        assert_eq!(routes[0].path.len(), 10);
        assert_eq!(routes[1].path.len(), 6);
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        let bad = Coordinate {
            lat: 95.0,
            lng: 0.0,
        };
        assert!(matches!(
            service().plan_routes(bad, CARLTON, &[]),
            Err(SafetyError::InvalidInput(_))
        ));
    }
}
