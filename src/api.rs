use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::contacts::{Guardian, GuardianRoster};
use crate::error::{Result, SafetyError};
use crate::guardian::{EventLog, GuardianTripManager, format_countdown};
use crate::models::{
    Coordinate, GuardianEvent, GuardianTrip, NewReport, ReportType, RiskLevel, RouteCandidate,
    SafetyReport,
};
use crate::reports::ReportStore;
use crate::routes::RouteRankingService;
use crate::safety::{SafetyMap, SafetyZone, assess_location_risk, location_factors};

// Shared State. Each lock is the single writer for what it guards.
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub reports: Mutex<ReportStore>,
    pub roster: Mutex<GuardianRoster>,
    pub trips: Mutex<GuardianTripManager>,
    pub events: Arc<EventLog>,
    pub routes: RouteRankingService,
}

pub fn router(state: Arc<AppState>) -> Router {
    // Allows the browser front-end to talk to this API
    let cors = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/:id/upvote", post(upvote_report))
        .route("/risk", get(location_risk))
        .route("/zones", get(safety_zones))
        .route("/routes", post(plan_routes))
        .route("/trip", get(current_trip).post(start_trip))
        .route("/trip/check-in", post(check_in))
        .route("/trip/complete", post(complete_trip))
        .route("/trip/cancel", post(cancel_trip))
        .route("/trip/location", post(update_location))
        .route("/trip/events", get(trip_events))
        .route("/guardians", get(list_guardians).post(add_guardian))
        .route("/guardians/:id", delete(remove_guardian))
        .route("/guardians/:id/toggle", post(toggle_guardian))
        .layer(cors)
        .with_state(state)
}

/// Drives `tick` so overdue check-ins surface without any request.
pub fn spawn_ticker(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_millis(state.config.tick_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let now = state.clock.now();
            state.trips.lock().await.tick(now);
        }
    })
}

// --- Errors ---

impl SafetyError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ReportNotFound(_) => StatusCode::NOT_FOUND,
            Self::TripAlreadyActive | Self::NoActiveTrip => StatusCode::CONFLICT,
            Self::DegenerateRoute => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Graph(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SafetyError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::warn!("Request rejected ({status}): {self}");
        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, SafetyError>;

// --- API DTOs ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFeed {
    pub reports: Vec<SafetyReport>,
    pub safe_spaces: usize,
    pub total: usize,
}

/// Kept as raw strings so a malformed number is reported like any other
/// invalid input.
#[derive(Deserialize)]
pub struct RiskQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

impl RiskQuery {
    fn location(&self) -> Result<Option<Coordinate>> {
        let lat = parse_degrees("lat", self.lat.as_deref())?;
        let lng = parse_degrees("lng", self.lng.as_deref())?;
        Ok(match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Coordinate { lat, lng }),
            _ => None,
        })
    }
}

fn parse_degrees(name: &str, raw: Option<&str>) -> Result<Option<f64>> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<f64>().map_err(|_| {
                SafetyError::invalid(format!("{name} must be a number, got {raw:?}"))
            })
        })
        .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResponse {
    pub level: RiskLevel,
    pub label: &'static str,
    pub advice: &'static str,
    pub factors: &'static [&'static str],
    pub nearby_reports: usize,
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTripRequest {
    pub destination: String,
    #[serde(default = "default_travel_minutes")]
    pub estimated_travel_minutes: u32,
    /// Falls back to the active guardians when omitted.
    pub guardian_contacts: Option<Vec<String>>,
}

fn default_travel_minutes() -> u32 {
    30
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub trip: Option<GuardianTrip>,
    pub check_in_remaining: Option<String>,
}

#[derive(Deserialize)]
pub struct NewGuardian {
    pub name: String,
    pub phone: String,
}

// --- Handlers ---

async fn list_reports(State(state): State<Arc<AppState>>) -> Json<ReportFeed> {
    let store = state.reports.lock().await;
    Json(ReportFeed {
        reports: store.recent(store.len()),
        safe_spaces: store
            .count_by_type()
            .get(&ReportType::SafeSpace)
            .copied()
            .unwrap_or(0),
        total: store.len(),
    })
}

async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewReport>,
) -> ApiResult<SafetyReport> {
    let now = state.clock.now();
    Ok(Json(state.reports.lock().await.add(payload, now)?))
}

async fn upvote_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SafetyReport> {
    Ok(Json(state.reports.lock().await.upvote(id)?))
}

async fn location_risk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RiskQuery>,
) -> ApiResult<RiskResponse> {
    let location = query.location()?;
    let radius = state.config.risk_radius;

    let nearby = match location {
        Some(at) if at.validate().is_ok() => state.reports.lock().await.near(at, radius),
        _ => Vec::new(),
    };
    let level = assess_location_risk(location, &nearby, radius)?;

    Ok(Json(RiskResponse {
        level,
        label: level.label(),
        advice: level.advice(),
        factors: location_factors(level),
        nearby_reports: nearby.len(),
    }))
}

async fn safety_zones(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SafetyZone>> {
    let store = state.reports.lock().await;
    let map = SafetyMap::from_reports(store.all(), state.config.safety_zone_resolution)?;
    Ok(Json(map.zones().into_iter().cloned().collect()))
}

async fn plan_routes(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRequest>,
) -> ApiResult<Vec<RouteCandidate>> {
    let store = state.reports.lock().await;
    let routes = state
        .routes
        .plan_routes(payload.origin, payload.destination, store.all())?;
    Ok(Json(routes))
}

async fn current_trip(State(state): State<Arc<AppState>>) -> Json<TripResponse> {
    let trips = state.trips.lock().await;
    Json(trip_response(&trips, state.clock.as_ref()))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartTripRequest>,
) -> ApiResult<GuardianTrip> {
    let contacts = match payload.guardian_contacts {
        Some(contacts) => contacts,
        None => state.roster.lock().await.active_ids(),
    };
    let trip = state.trips.lock().await.start_trip(
        &payload.destination,
        payload.estimated_travel_minutes,
        contacts,
    )?;
    Ok(Json(trip))
}

async fn check_in(State(state): State<Arc<AppState>>) -> ApiResult<GuardianTrip> {
    let now = state.clock.now();
    Ok(Json(state.trips.lock().await.check_in(now)?))
}

async fn complete_trip(State(state): State<Arc<AppState>>) -> ApiResult<GuardianTrip> {
    let now = state.clock.now();
    Ok(Json(state.trips.lock().await.complete_trip(now)?))
}

async fn cancel_trip(State(state): State<Arc<AppState>>) -> ApiResult<GuardianTrip> {
    Ok(Json(state.trips.lock().await.cancel_trip()?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(location): Json<Coordinate>,
) -> ApiResult<GuardianTrip> {
    let now = state.clock.now();
    Ok(Json(state.trips.lock().await.update_location(location, now)?))
}

async fn trip_events(State(state): State<Arc<AppState>>) -> Json<Vec<GuardianEvent>> {
    Json(state.events.events())
}

async fn list_guardians(State(state): State<Arc<AppState>>) -> Json<Vec<Guardian>> {
    Json(state.roster.lock().await.all().to_vec())
}

async fn add_guardian(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewGuardian>,
) -> ApiResult<Guardian> {
    Ok(Json(
        state.roster.lock().await.add(&payload.name, &payload.phone)?,
    ))
}

async fn toggle_guardian(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Guardian> {
    Ok(Json(state.roster.lock().await.toggle(&id)?))
}

async fn remove_guardian(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Guardian> {
    Ok(Json(state.roster.lock().await.remove(&id)?))
}

fn trip_response(trips: &GuardianTripManager, clock: &dyn Clock) -> TripResponse {
    TripResponse {
        trip: trips.trip().cloned(),
        check_in_remaining: trips
            .check_in_remaining(clock.now())
            .map(format_countdown),
    }
}

/// Wires the default in-memory state around a route service.
pub fn build_state(
    config: Config,
    clock: Arc<dyn Clock>,
    routes: RouteRankingService,
    reports: ReportStore,
) -> Arc<AppState> {
    let events = Arc::new(EventLog::new());
    let trips = GuardianTripManager::with_interval(
        clock.clone(),
        events.clone(),
        config.check_in_interval(),
    );
    Arc::new(AppState {
        config,
        clock,
        reports: Mutex::new(reports),
        roster: Mutex::new(GuardianRoster::new()),
        trips: Mutex::new(trips),
        events,
        routes,
    })
}
