//! HttpApi
//!
//! Thin axum layer translating HTTP to `Orchestrator::plan_route` and
//! exposing `/health` and `/admin/cache/*`, grounded directly in
//! `sx9-cdn-data-fabric/src/main.rs`'s `AppState` + `Router` assembly and
//! `health_check` handler shape.

use crate::error::PlanError;
use crate::geonode_cache::GeoNodeCache;
use crate::kv::KvCache;
use crate::orchestrator::{Orchestrator, PlannedRoute};
use crate::relstore::RelStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub geo_node_cache: Arc<GeoNodeCache>,
    pub relstore: RelStore,
    pub kv: KvCache,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/plan-route", post(plan_route))
        .route("/admin/cache/geo-nodes", get(geo_node_cache_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = state.relstore.health_check().await;
    let kv_ok = state.kv.ping().await;
    let status = if db_ok && kv_ok { "healthy" } else { "degraded" };

    Json(serde_json::json!({
        "status": status,
        "service": "weather-route-cache",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
        "redis": kv_ok,
    }))
}

async fn geo_node_cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.geo_node_cache.stats();
    Json(serde_json::json!({
        "nodes_loaded": stats.nodes_loaded,
        "redis_hits": stats.redis_hits,
        "postgres_fallbacks": stats.postgres_fallbacks,
    }))
}

#[derive(Debug, Deserialize)]
struct PlanRouteRequest {
    origin: String,
    destination: String,
    departure_local: Option<DateTime<Utc>>,
    #[serde(default)]
    with_traffic: bool,
}

#[derive(Debug, Serialize)]
struct PlaceAlertResponse {
    place_id: i64,
    name: String,
    place_type: String,
    province: Option<String>,
    progress: f64,
    entry_time: DateTime<Utc>,
    weather: Option<crate::weather_cache::WeatherPayload>,
}

#[derive(Debug, Serialize)]
struct WeatherCellResponse {
    h3_index: String,
    lat: f64,
    lon: f64,
    weather: crate::weather_cache::WeatherPayload,
}

#[derive(Debug, Serialize)]
struct PlanRouteResponse {
    distance_km: f64,
    duration_hours: f64,
    geometry: Vec<(f64, f64)>,
    weather_summary: String,
    weather_cells: Vec<WeatherCellResponse>,
    places_on_route: Vec<PlaceAlertResponse>,
    cache_hit: bool,
    h3_stats: H3StatsResponse,
}

#[derive(Debug, Serialize)]
struct H3StatsResponse {
    total_cells: u64,
    hits: u64,
    misses: u64,
    stale_serves: u64,
    new_api_calls: u64,
    cell_cache_hit_rate: f64,
}

impl From<PlannedRoute> for PlanRouteResponse {
    fn from(route: PlannedRoute) -> Self {
        Self {
            distance_km: route.distance_km,
            duration_hours: route.duration_hours,
            geometry: route.geometry,
            weather_summary: route.weather_summary,
            weather_cells: route
                .weather_cells
                .into_iter()
                .map(|c| WeatherCellResponse {
                    h3_index: c.cell_id,
                    lat: c.lat,
                    lon: c.lon,
                    weather: c.payload,
                })
                .collect(),
            places_on_route: route
                .places_on_route
                .into_iter()
                .map(|p| PlaceAlertResponse {
                    place_id: p.place_id,
                    name: p.name,
                    place_type: p.place_type,
                    province: p.province,
                    progress: p.progress,
                    entry_time: p.entry_time,
                    weather: p.weather,
                })
                .collect(),
            cache_hit: route.cache_hit,
            h3_stats: H3StatsResponse {
                total_cells: route.h3_stats.total_cells,
                hits: route.h3_stats.hits,
                misses: route.h3_stats.misses,
                stale_serves: route.h3_stats.stale_serves,
                new_api_calls: route.h3_stats.new_api_calls,
                cell_cache_hit_rate: route.h3_stats.cell_cache_hit_rate(),
            },
        }
    }
}

async fn plan_route(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRouteRequest>,
) -> Result<Json<PlanRouteResponse>, (StatusCode, Json<serde_json::Value>)> {
    let departure = req.departure_local.unwrap_or_else(Utc::now);

    state
        .orchestrator
        .plan_route(&req.origin, &req.destination, departure, req.with_traffic)
        .await
        .map(|route| Json(route.into()))
        .map_err(|e| {
            warn!("plan_route failed: {e}");
            let status = match &e {
                PlanError::InputInvalid { .. } => StatusCode::BAD_REQUEST,
                PlanError::Unresolved { .. } => StatusCode::NOT_FOUND,
                PlanError::NoRoute => StatusCode::UNPROCESSABLE_ENTITY,
                PlanError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({ "error": e.to_string() })))
        })
}
