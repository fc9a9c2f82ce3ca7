//! Guardian mode: one tracked trip at a time.
//!
//! ```text
//! idle --start--> active --tick past deadline--> overdue
//!                   ^  |                            |
//!                   |  +--complete--> completed <---+ complete
//!                   +-------------check_in----------+
//! active/overdue --cancel--> idle
//! ```
//!
//! While overdue, every further missed deadline re-alerts guardians.
//!
//! Time never advances on its own: `tick` is driven by a scheduler (or a
//! test) with an explicit instant.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DEFAULT_CHECK_IN_INTERVAL_SECS;
use crate::error::{Result, SafetyError};
use crate::models::{
    Coordinate, GuardianEvent, GuardianEventKind, GuardianTrip, LastLocation, TripStatus,
};

/// Fire-and-forget delivery of trip events to guardians.
pub trait GuardianNotifier: Send + Sync {
    fn notify(&self, event: &GuardianEvent);
}

/// Most events [`EventLog`] keeps before dropping the oldest.
pub const EVENT_LOG_CAPACITY: usize = 256;

/// Logs every event and keeps the current trip's events for inspection.
/// A new trip starts a fresh log.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<GuardianEvent>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn events(&self) -> Vec<GuardianEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: GuardianEventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl GuardianNotifier for EventLog {
    fn notify(&self, event: &GuardianEvent) {
        log::info!("[trip {}] {} {}", event.trip_id, event.kind, event.payload);
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if event.kind == GuardianEventKind::TrackingStarted {
            events.clear();
        }
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

pub struct GuardianTripManager {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn GuardianNotifier>,
    check_in_interval: TimeDelta,
    trip: Option<GuardianTrip>,
}

impl GuardianTripManager {
    pub fn new(clock: Arc<dyn Clock>, notifier: Arc<dyn GuardianNotifier>) -> Self {
        Self::with_interval(
            clock,
            notifier,
            TimeDelta::seconds(DEFAULT_CHECK_IN_INTERVAL_SECS),
        )
    }

    pub fn with_interval(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn GuardianNotifier>,
        check_in_interval: TimeDelta,
    ) -> Self {
        Self {
            clock,
            notifier,
            check_in_interval,
            trip: None,
        }
    }

    pub fn check_in_interval(&self) -> TimeDelta {
        self.check_in_interval
    }

    /// The current trip, including a completed one until the next start.
    pub fn trip(&self) -> Option<&GuardianTrip> {
        self.trip.as_ref()
    }

    pub fn start_trip(
        &mut self,
        destination: &str,
        estimated_travel_minutes: u32,
        guardian_contacts: impl IntoIterator<Item = String>,
    ) -> Result<GuardianTrip> {
        if self.open_trip().is_some() {
            return Err(SafetyError::TripAlreadyActive);
        }
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(SafetyError::invalid("destination is required"));
        }
        if estimated_travel_minutes == 0 {
            return Err(SafetyError::invalid(
                "estimated travel time must be at least one minute",
            ));
        }

        let now = self.clock.now();
        let trip = GuardianTrip {
            id: Uuid::new_v4(),
            destination: destination.to_string(),
            start_time: now,
            estimated_arrival: now + TimeDelta::minutes(i64::from(estimated_travel_minutes)),
            status: TripStatus::Active,
            guardian_contacts: guardian_contacts.into_iter().collect::<BTreeSet<_>>(),
            check_in_deadline: now + self.check_in_interval,
            last_location: None,
        };

        log::info!(
            "Guardian mode active: {} guardians tracking trip {} to {}",
            trip.guardian_contacts.len(),
            trip.id,
            trip.destination
        );
        self.emit(
            &trip,
            GuardianEventKind::TrackingStarted,
            now,
            json!({
                "destination": trip.destination,
                "estimatedArrival": trip.estimated_arrival,
                "guardians": trip.guardian_contacts,
            }),
        );

        self.trip = Some(trip.clone());
        Ok(trip)
    }

    /// Flags an open trip whose check-in deadline has passed. The deadline
    /// moves one interval forward each time, so an overdue trip keeps
    /// alerting guardians at the check-in cadence until the traveler checks
    /// in or arrives. A no-op for idle and completed trips.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<GuardianTrip> {
        let interval = self.check_in_interval;
        let overdue = match self.trip.as_mut() {
            Some(trip) if trip.status.is_open() && now >= trip.check_in_deadline => {
                trip.status = TripStatus::Overdue;
                trip.check_in_deadline = now + interval;
                Some(trip.clone())
            }
            _ => None,
        };

        if let Some(trip) = &overdue {
            log::warn!("Check-in overdue for trip {} to {}", trip.id, trip.destination);
            self.emit(
                trip,
                GuardianEventKind::CheckInOverdue,
                now,
                json!({
                    "destination": trip.destination,
                    "nextCheckIn": trip.check_in_deadline,
                    "lastLocation": trip.last_location,
                }),
            );
        }

        self.trip.clone()
    }

    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<GuardianTrip> {
        let interval = self.check_in_interval;
        let trip = self.open_trip_mut()?;
        trip.check_in_deadline = now + interval;
        trip.status = TripStatus::Active;
        let trip = trip.clone();

        self.emit(
            &trip,
            GuardianEventKind::CheckInConfirmed,
            now,
            json!({ "nextCheckIn": trip.check_in_deadline }),
        );
        Ok(trip)
    }

    /// "I've arrived safely". Completed trips are terminal.
    pub fn complete_trip(&mut self, now: DateTime<Utc>) -> Result<GuardianTrip> {
        let trip = self.open_trip_mut()?;
        trip.status = TripStatus::Completed;
        let trip = trip.clone();

        log::info!("Trip {} to {} completed", trip.id, trip.destination);
        self.emit(
            &trip,
            GuardianEventKind::ArrivedSafely,
            now,
            json!({ "destination": trip.destination }),
        );
        Ok(trip)
    }

    /// Abandons the open trip without an arrival. Returns the trip as it was;
    /// the manager is idle afterwards.
    pub fn cancel_trip(&mut self) -> Result<GuardianTrip> {
        self.open_trip_mut()?;
        let Some(trip) = self.trip.take() else {
            return Err(SafetyError::NoActiveTrip);
        };

        log::info!("Trip {} to {} cancelled", trip.id, trip.destination);
        self.emit(
            &trip,
            GuardianEventKind::TripCancelled,
            self.clock.now(),
            json!({ "destination": trip.destination }),
        );
        Ok(trip)
    }

    /// Records where the traveler is. Guardians read it from the trip; no
    /// event is sent.
    pub fn update_location(
        &mut self,
        location: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<GuardianTrip> {
        location.validate()?;
        let trip = self.open_trip_mut()?;
        trip.last_location = Some(LastLocation {
            lat: location.lat,
            lng: location.lng,
            timestamp: now,
        });
        Ok(trip.clone())
    }

    /// Whole seconds until the next check-in is due, zero once it has passed.
    pub fn check_in_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.open_trip()
            .map(|trip| (trip.check_in_deadline - now).num_seconds().max(0))
    }

    fn open_trip(&self) -> Option<&GuardianTrip> {
        self.trip.as_ref().filter(|t| t.status.is_open())
    }

    fn open_trip_mut(&mut self) -> Result<&mut GuardianTrip> {
        self.trip
            .as_mut()
            .filter(|t| t.status.is_open())
            .ok_or(SafetyError::NoActiveTrip)
    }

    fn emit(
        &self,
        trip: &GuardianTrip,
        kind: GuardianEventKind,
        at: DateTime<Utc>,
        payload: serde_json::Value,
    ) {
        if trip.guardian_contacts.is_empty() {
            log::debug!("Trip {} has no guardians, not sending {kind}", trip.id);
            return;
        }
        self.notifier.notify(&GuardianEvent {
            kind,
            trip_id: trip.id,
            timestamp: at,
            payload,
        });
    }
}

/// Formats a countdown as `m:ss`.
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
