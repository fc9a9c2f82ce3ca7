use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::error::{Result, SafetyError};

// --- Geometry ---

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Cape Town city centre. Callers without a device location may use it;
    /// the core never substitutes it on their behalf.
    pub const FALLBACK: Coordinate = Coordinate {
        lat: -33.9249,
        lng: 18.4241,
    };

    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let c = Self { lat, lng };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(SafetyError::invalid(format!(
                "coordinate ({}, {}) is not finite",
                self.lat, self.lng
            )));
        }
        if self.lat.abs() > 90.0 || self.lng.abs() > 180.0 {
            return Err(SafetyError::invalid(format!(
                "coordinate ({}, {}) is out of range",
                self.lat, self.lng
            )));
        }
        Ok(())
    }

    /// geo uses (x, y) = (lng, lat).
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }

    pub fn to_rstar(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

// --- Community reports ---

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReportType {
    Harassment,
    PoorLighting,
    SuspiciousActivity,
    SafeSpace,
    Emergency,
}

impl ReportType {
    /// Harassment, suspicious activity and emergencies count toward risk.
    /// Poor lighting and safe spaces are informational.
    pub fn is_dangerous(self) -> bool {
        matches!(
            self,
            Self::Harassment | Self::SuspiciousActivity | Self::Emergency
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

impl ReportLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub title: String,
    pub description: String,
    pub location: ReportLocation,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub upvotes: u32,
    pub verified: bool,
}

/// What a user submits. The store fills in id, timestamp, author and counters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: ReportLocation,
}

// --- Risk ---

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Safe Area",
            Self::Medium => "Moderate Risk",
            Self::High => "High Risk",
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            Self::Low => {
                "This appears to be a relatively safe area, but always stay aware of your surroundings."
            }
            Self::Medium => "Stay alert and consider having someone track your location.",
            Self::High => {
                "Consider finding a well-lit, populated area or contacting someone you trust."
            }
        }
    }
}

// --- Routes ---

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RouteKind {
    Safest,
    Fastest,
}

impl RouteKind {
    pub fn color(self) -> &'static str {
        match self {
            Self::Safest => "#22c55e",
            Self::Fastest => "#3b82f6",
        }
    }

    /// Multiplier applied to the straight-line distance.
    pub fn detour_factor(self) -> f64 {
        match self {
            Self::Safest => 1.3,
            Self::Fastest => 1.1,
        }
    }

    pub fn minutes_per_km(self) -> f64 {
        match self {
            Self::Safest => 2.5,
            Self::Fastest => 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub id: String,
    pub kind: RouteKind,
    pub color: String,
    pub path: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_min: u32,
    pub safety_score: f64,
    pub warnings: Vec<String>,
    /// Dangerous reports near the path. Informational only.
    pub hazard_count: usize,
}

// --- Guardian mode ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TripStatus {
    Active,
    Overdue,
    Completed,
}

impl TripStatus {
    /// Active and overdue trips still accept check-ins.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLocation {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianTrip {
    pub id: Uuid,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub estimated_arrival: DateTime<Utc>,
    pub status: TripStatus,
    pub guardian_contacts: BTreeSet<String>,
    pub check_in_deadline: DateTime<Utc>,
    pub last_location: Option<LastLocation>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GuardianEventKind {
    TrackingStarted,
    CheckInOverdue,
    CheckInConfirmed,
    ArrivedSafely,
    TripCancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianEvent {
    pub kind: GuardianEventKind,
    pub trip_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn report_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReportType::PoorLighting).unwrap(),
            "\"poor-lighting\""
        );
        assert_eq!(
            ReportType::from_str("suspicious-activity").unwrap(),
            ReportType::SuspiciousActivity
        );
        assert_eq!(ReportType::SafeSpace.to_string(), "safe-space");
    }

    #[test]
    fn dangerous_types() {
        assert!(ReportType::Harassment.is_dangerous());
        assert!(ReportType::SuspiciousActivity.is_dangerous());
        assert!(ReportType::Emergency.is_dangerous());
        assert!(!ReportType::PoorLighting.is_dangerous());
        assert!(!ReportType::SafeSpace.is_dangerous());
    }

    #[test]
    fn coordinate_rejects_garbage() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(-33.9, 18.4).is_ok());
    }

    #[test]
    fn safer_kind_takes_longer() {
        assert!(RouteKind::Safest.detour_factor() > RouteKind::Fastest.detour_factor());
        assert!(RouteKind::Safest.minutes_per_km() > RouteKind::Fastest.minutes_per_km());
    }

    #[test]
    fn report_json_uses_camel_case() {
        let json = serde_json::json!({
            "type": "harassment",
            "title": "Followed near the station",
            "location": { "lat": -33.92, "lng": 18.42 }
        });
        let report: NewReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.report_type, ReportType::Harassment);
        assert_eq!(report.location.address, "");
        assert_eq!(report.description, "");
    }
}
