use std::sync::Arc;

use anyhow::Context;
use safewalk::api::{build_state, router, spawn_ticker};
use safewalk::clock::{Clock, SystemClock};
use safewalk::config::Config;
use safewalk::graph::NavigationGraph;
use safewalk::reports::ReportStore;
use safewalk::routes::RouteRankingService;
use safewalk::safety::SafetyMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = Config::from_env().context("Invalid configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 1. Community reports
    let reports = if config.seed_demo_reports {
        ReportStore::with_demo_reports(clock.now())
    } else {
        ReportStore::new()
    };
    log::info!("Loaded {} safety reports", reports.len());

    // 2. Route geometry: OSM street graph when an extract is configured
    let routes = match &config.osm_pbf_path {
        Some(pbf_path) => {
            let safety_map = SafetyMap::from_reports(reports.all(), config.safety_zone_resolution)?;
            let nav_graph = NavigationGraph::from_pbf(pbf_path, &safety_map)
                .with_context(|| format!("Failed to load PBF file {pbf_path}"))?;
            RouteRankingService::new(Box::new(nav_graph), config.risk_radius)
        }
        None => {
            log::info!("OSM_PBF_PATH not set, using interpolated route paths");
            RouteRankingService::interpolated(config.risk_radius)
        }
    };

    let addr = config.listen_addr();
    let state = build_state(config, clock, routes, reports);
    spawn_ticker(state.clone());

    let app = router(state);

    log::info!("API server running on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
