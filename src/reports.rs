use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use uuid::Uuid;

use crate::error::{Result, SafetyError};
use crate::models::{Coordinate, NewReport, ReportLocation, ReportType, SafetyReport};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// In-memory community report collection.
///
/// Reports are kept in submission order and indexed in an R-tree on raw
/// (lng, lat) degrees, so "reports near X" uses the same planar metric as
/// the risk scorer.
pub struct ReportStore {
    reports: Vec<SafetyReport>,
    by_id: HashMap<Uuid, usize>,
    index: RTree<IndexedPoint>,
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
            by_id: HashMap::new(),
            index: RTree::new(),
        }
    }

    /// Two reports from the Cape Town demo data set.
    pub fn with_demo_reports(now: DateTime<Utc>) -> Self {
        let mut store = Self::new();
        store.insert(SafetyReport {
            id: Uuid::new_v4(),
            report_type: ReportType::PoorLighting,
            title: "Dark alley on Smith Street".to_string(),
            description: "Very poor lighting after 7pm, feels unsafe walking alone".to_string(),
            location: ReportLocation {
                lat: -33.9249,
                lng: 18.4241,
                address: "Smith Street, Cape Town".to_string(),
            },
            timestamp: now - TimeDelta::hours(2),
            user_id: "2".to_string(),
            user_name: "Anonymous User".to_string(),
            upvotes: 5,
            verified: true,
        });
        store.insert(SafetyReport {
            id: Uuid::new_v4(),
            report_type: ReportType::SafeSpace,
            title: "Well-lit parking area".to_string(),
            description: "Good security and lighting, feels safe even late evening".to_string(),
            location: ReportLocation {
                lat: -33.9279,
                lng: 18.4209,
                address: "V&A Waterfront, Cape Town".to_string(),
            },
            timestamp: now - TimeDelta::hours(1),
            user_id: "3".to_string(),
            user_name: "SafeWalker".to_string(),
            upvotes: 12,
            verified: true,
        });
        store
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// All reports in submission order.
    pub fn all(&self) -> &[SafetyReport] {
        &self.reports
    }

    pub fn get(&self, id: Uuid) -> Option<&SafetyReport> {
        self.by_id.get(&id).map(|&i| &self.reports[i])
    }

    /// Submits a new report on behalf of the current user.
    pub fn add(&mut self, report: NewReport, now: DateTime<Utc>) -> Result<SafetyReport> {
        report.location.coordinate().validate()?;
        if report.title.trim().is_empty() {
            return Err(SafetyError::invalid("report title is required"));
        }

        let report = SafetyReport {
            id: Uuid::new_v4(),
            report_type: report.report_type,
            title: report.title.trim().to_string(),
            description: report.description,
            location: report.location,
            timestamp: now,
            user_id: "current-user".to_string(),
            user_name: "Current User".to_string(),
            upvotes: 0,
            verified: false,
        };
        log::info!(
            "New {} report {} at ({}, {})",
            report.report_type,
            report.id,
            report.location.lat,
            report.location.lng
        );
        self.insert(report.clone());
        Ok(report)
    }

    fn insert(&mut self, report: SafetyReport) {
        let idx = self.reports.len();
        self.index
            .insert(GeomWithData::new(report.location.coordinate().to_rstar(), idx));
        self.by_id.insert(report.id, idx);
        self.reports.push(report);
    }

    pub fn upvote(&mut self, id: Uuid) -> Result<SafetyReport> {
        let report = self.get_mut(id)?;
        report.upvotes = report.upvotes.saturating_add(1);
        Ok(report.clone())
    }

    /// Moderation hook.
    pub fn set_verified(&mut self, id: Uuid, verified: bool) -> Result<SafetyReport> {
        let report = self.get_mut(id)?;
        report.verified = verified;
        Ok(report.clone())
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut SafetyReport> {
        let idx = *self.by_id.get(&id).ok_or(SafetyError::ReportNotFound(id))?;
        Ok(&mut self.reports[idx])
    }

    /// Newest first, as the community feed shows them.
    pub fn recent(&self, limit: usize) -> Vec<SafetyReport> {
        self.reports
            .iter()
            .rev()
            .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Reports strictly closer than `radius` degrees to `point`.
    pub fn near(&self, point: Coordinate, radius: f64) -> Vec<SafetyReport> {
        let mut hits: Vec<usize> = self
            .index
            .locate_within_distance(point.to_rstar(), radius * radius)
            .map(|entry| entry.data)
            .filter(|&i| planar_distance(point, self.reports[i].location.coordinate()) < radius)
            .collect();
        hits.sort_unstable();
        log::debug!(
            "{} reports within {radius} deg of ({}, {})",
            hits.len(),
            point.lat,
            point.lng
        );
        hits.into_iter().map(|i| self.reports[i].clone()).collect()
    }

    pub fn count_by_type(&self) -> HashMap<ReportType, usize> {
        self.reports.iter().map(|r| r.report_type).counts()
    }
}

/// Euclidean distance on raw degree deltas. Not geodesic.
pub fn planar_distance(a: Coordinate, b: Coordinate) -> f64 {
    use geo::EuclideanDistance;
    a.to_point().euclidean_distance(&b.to_point())
}
