use std::collections::HashMap;

use chrono::{DateTime, Utc};
use h3o::{CellIndex, LatLng, Resolution};
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Result, SafetyError};
use crate::models::{Coordinate, ReportType, RiskLevel, RouteKind, SafetyReport};
use crate::reports::planar_distance;

pub const SAFEST_SCORE: f64 = 9.2;
pub const FASTEST_SCORE: f64 = 6.8;

const SAFEST_WARNINGS: [&str; 3] = [
    "well-lit main roads",
    "avoids isolated areas",
    "high foot traffic",
];
const FASTEST_WARNINGS: [&str; 3] = [
    "direct route",
    "may include less-populated segments",
    "faster but lower safety margin",
];

// --- Location risk ---

/// Classifies the area around `location` by counting dangerous reports
/// strictly within `radius` degrees (planar, not geodesic).
///
/// More than two dangerous reports is high, one or two is medium, none is low.
/// A missing location is the caller's problem; no fallback is applied here.
pub fn assess_location_risk(
    location: Option<Coordinate>,
    reports: &[SafetyReport],
    radius: f64,
) -> Result<RiskLevel> {
    let location = location.ok_or_else(|| SafetyError::invalid("location is unavailable"))?;
    location.validate()?;
    if !(radius.is_finite() && radius > 0.0) {
        return Err(SafetyError::invalid(format!(
            "radius must be positive, got {radius}"
        )));
    }

    let mut dangerous = 0usize;
    for report in reports {
        let at = report.location.coordinate();
        at.validate()?;
        if report.report_type.is_dangerous() && planar_distance(location, at) < radius {
            dangerous += 1;
        }
    }

    Ok(match dangerous {
        0 => RiskLevel::Low,
        1 | 2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    })
}

/// Contributing factors shown next to a risk level.
pub fn location_factors(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Low => &["Well-lit area", "High foot traffic", "Police presence"],
        RiskLevel::Medium => &["Moderate lighting", "Some activity", "Mixed reports"],
        RiskLevel::High => &["Poor lighting", "Isolated area", "Recent incidents"],
    }
}

// --- Route scoring ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteScore {
    pub safety_score: f64,
    pub warnings: Vec<String>,
}

/// Scores a candidate path. The score is a constant per route kind, not a
/// per-segment calculation; safest always outranks fastest.
pub fn score_route(
    kind: RouteKind,
    path: &[Coordinate],
    _reports: &[SafetyReport],
) -> Result<RouteScore> {
    if path.len() < 2 {
        return Err(SafetyError::invalid(format!(
            "a route needs at least 2 points, got {}",
            path.len()
        )));
    }
    for point in path {
        point.validate()?;
    }

    let (safety_score, warnings) = match kind {
        RouteKind::Safest => (SAFEST_SCORE, &SAFEST_WARNINGS),
        RouteKind::Fastest => (FASTEST_SCORE, &FASTEST_WARNINGS),
    };

    Ok(RouteScore {
        safety_score,
        warnings: warnings.iter().map(|w| (*w).to_string()).collect(),
    })
}

// --- Safety zones ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Safe,
    Caution,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyZone {
    pub cell: String,
    pub center: Coordinate,
    pub kind: ZoneKind,
    pub reports: usize,
    pub dangerous_reports: usize,
    pub last_updated: DateTime<Utc>,
}

/// Community reports bucketed into H3 cells.
pub struct SafetyMap {
    resolution: Resolution,
    zones: HashMap<CellIndex, SafetyZone>,
}

impl SafetyMap {
    pub fn from_reports(reports: &[SafetyReport], resolution: u8) -> Result<Self> {
        let resolution = Resolution::try_from(resolution)
            .map_err(|e| SafetyError::invalid(format!("H3 resolution {resolution}: {e}")))?;

        let mut grouped: HashMap<CellIndex, Vec<&SafetyReport>> = HashMap::new();
        for report in reports {
            let Some(cell) = to_cell(report.location.coordinate(), resolution) else {
                log::warn!("Skipping report {} with invalid location", report.id);
                continue;
            };
            grouped.entry(cell).or_default().push(report);
        }

        let zones = grouped
            .into_iter()
            .map(|(cell, in_cell)| (cell, build_zone(cell, &in_cell)))
            .collect::<HashMap<_, _>>();

        log::debug!("Built {} safety zones at resolution {resolution}", zones.len());
        Ok(Self { resolution, zones })
    }

    pub fn zone_at(&self, coordinate: Coordinate) -> Option<&SafetyZone> {
        to_cell(coordinate, self.resolution).and_then(|cell| self.zones.get(&cell))
    }

    /// 0.0 = safe, 1.0 = dangerous. Used to weight street graph edges.
    pub fn edge_risk(&self, coordinate: Coordinate) -> f32 {
        match self.zone_at(coordinate).map(|z| z.kind) {
            Some(ZoneKind::Danger) => 0.9,
            Some(ZoneKind::Caution) => 0.4,
            Some(ZoneKind::Safe) | None => 0.1,
        }
    }

    /// Most dangerous zones first.
    pub fn zones(&self) -> Vec<&SafetyZone> {
        self.zones
            .values()
            .sorted_by(|a, b| {
                b.dangerous_reports
                    .cmp(&a.dangerous_reports)
                    .then(b.reports.cmp(&a.reports))
                    .then(a.cell.cmp(&b.cell))
            })
            .collect()
    }
}

fn to_cell(coordinate: Coordinate, resolution: Resolution) -> Option<CellIndex> {
    LatLng::new(coordinate.lat, coordinate.lng)
        .ok()
        .map(|ll| ll.to_cell(resolution))
}

fn build_zone(cell: CellIndex, reports: &[&SafetyReport]) -> SafetyZone {
    let dangerous = reports
        .iter()
        .filter(|r| r.report_type.is_dangerous())
        .count();
    let poorly_lit = reports
        .iter()
        .any(|r| r.report_type == ReportType::PoorLighting);

    let kind = match dangerous {
        0 if !poorly_lit => ZoneKind::Safe,
        0..=2 => ZoneKind::Caution,
        _ => ZoneKind::Danger,
    };

    let center = LatLng::from(cell);
    SafetyZone {
        cell: cell.to_string(),
        center: Coordinate {
            lat: center.lat(),
            lng: center.lng(),
        },
        kind,
        reports: reports.len(),
        dangerous_reports: dangerous,
        last_updated: reports
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
    }
}
