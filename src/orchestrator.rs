//! Orchestrator
//!
//! The `PlanRoute` state machine: RESOLVING → ROUTING → BUILDING (retried
//! once) → WEATHER → DONE. Composes every other component behind one
//! container so callers only ever need a single `Orchestrator` handle.

use crate::error::PlanError;
use crate::graph_builder::GraphBuilder;
use crate::graph_router::{GraphRouter, RouteResult};
use crate::normalize;
use crate::place_alerts::{PlaceAlert, PlaceAlerts};
use crate::relstore::RelStore;
use crate::seeder::Seeder;
use crate::weather_overlay::{WeatherCellResult, WeatherOverlay, WeatherOverlayStats};
use chrono::{DateTime, Utc};
use tracing::info;

const TRAFFIC_MULTIPLIER: f64 = 1.30;

pub struct PlannedRoute {
    pub distance_km: f64,
    pub duration_hours: f64,
    pub geometry: Vec<(f64, f64)>,
    pub weather_summary: String,
    pub weather_cells: Vec<WeatherCellResult>,
    pub places_on_route: Vec<PlaceAlert>,
    pub cache_hit: bool,
    pub h3_stats: WeatherOverlayStats,
}

pub struct Orchestrator {
    relstore: RelStore,
    graph_router: GraphRouter,
    graph_builder: GraphBuilder,
    weather_overlay: WeatherOverlay,
    place_alerts: PlaceAlerts,
    seeder: Seeder,
}

impl Orchestrator {
    pub fn new(
        relstore: RelStore,
        graph_router: GraphRouter,
        graph_builder: GraphBuilder,
        weather_overlay: WeatherOverlay,
        place_alerts: PlaceAlerts,
        seeder: Seeder,
    ) -> Self {
        Self {
            relstore,
            graph_router,
            graph_builder,
            weather_overlay,
            place_alerts,
            seeder,
        }
    }

    /// Exposes the underlying store for callers that need to assert on
    /// durable state directly (integration tests mainly — `AppState`'s own
    /// admin endpoints hold their own `RelStore` handle already).
    pub fn relstore(&self) -> RelStore {
        self.relstore.clone()
    }

    pub async fn plan_route(
        &self,
        origin_name: &str,
        dest_name: &str,
        departure_local: DateTime<Utc>,
        with_traffic: bool,
    ) -> Result<PlannedRoute, PlanError> {
        if origin_name.trim().is_empty() || dest_name.trim().is_empty() {
            return Err(PlanError::input_invalid("origin and destination names must be non-empty"));
        }

        // RESOLVING
        let src_place_id = self.resolve_place(origin_name).await?;
        let dst_place_id = self.resolve_place(dest_name).await?;
        if src_place_id == dst_place_id {
            return Err(PlanError::input_invalid("origin and destination resolve to the same place"));
        }

        let src_place = self
            .relstore
            .get_place(src_place_id)
            .await
            .map_err(|e| PlanError::internal(e.to_string()))?
            .ok_or_else(|| PlanError::unresolved(origin_name.to_string()))?;
        let dst_place = self
            .relstore
            .get_place(dst_place_id)
            .await
            .map_err(|e| PlanError::internal(e.to_string()))?
            .ok_or_else(|| PlanError::unresolved(dest_name.to_string()))?;

        // ROUTING
        let mut cache_hit = true;
        let mut route = self
            .graph_router
            .find_route(src_place_id, dst_place_id)
            .await
            .map_err(|e| PlanError::internal(e.to_string()))?;

        // BUILDING, retried once
        if route.is_none() {
            cache_hit = false;
            info!("🛠️ graph miss for {origin_name} -> {dest_name}; invoking GraphBuilder");
            let built = self
                .graph_builder
                .handle_miss(&self.graph_router, src_place_id, dst_place_id, src_place.center, dst_place.center)
                .await
                .map_err(|e| PlanError::internal(e.to_string()))?;
            if built {
                route = self
                    .graph_router
                    .find_route(src_place_id, dst_place_id)
                    .await
                    .map_err(|e| PlanError::internal(e.to_string()))?;
            }
        }

        let Some(route) = route else {
            return Err(PlanError::NoRoute);
        };

        // WEATHER: weather overlay and place alerts run concurrently over
        // the same geometry.
        let (weather, alerts) = tokio::join!(
            self.weather_overlay.build(&route, departure_local),
            self.place_alerts.build(&route, src_place_id, dst_place_id, departure_local),
        );
        let weather = weather.map_err(|e| PlanError::internal(e.to_string()))?;
        let places_on_route = alerts.map_err(|e| PlanError::internal(e.to_string()))?;

        // DONE
        Ok(self.finish(route, weather, places_on_route, cache_hit, with_traffic))
    }

    async fn resolve_place(&self, name: &str) -> Result<i64, PlanError> {
        let normalized = normalize::normalize(name);
        if normalized.is_empty() {
            return Err(PlanError::input_invalid(format!("'{name}' has no resolvable form")));
        }
        if let Some(id) = self
            .relstore
            .find_place(&normalized, None, None)
            .await
            .map_err(|e| PlanError::internal(e.to_string()))?
        {
            return Ok(id);
        }
        self.seeder
            .get_or_seed_place(name, None, 8)
            .await
            .map_err(|e| PlanError::internal(e.to_string()))?
            .ok_or_else(|| PlanError::unresolved(name.to_string()))
    }

    fn finish(
        &self,
        route: RouteResult,
        weather: crate::weather_overlay::WeatherOverlayResult,
        places_on_route: Vec<PlaceAlert>,
        cache_hit: bool,
        with_traffic: bool,
    ) -> PlannedRoute {
        let distance_km = route.total_distance_m / 1000.0;
        let base_duration_hours = route.total_duration_s / 3600.0;
        let duration_hours = if with_traffic {
            base_duration_hours * TRAFFIC_MULTIPLIER
        } else {
            base_duration_hours
        };

        PlannedRoute {
            distance_km,
            duration_hours,
            geometry: route.geometry,
            weather_summary: weather.summary,
            weather_cells: weather.cells,
            places_on_route,
            cache_hit,
            h3_stats: weather.stats,
        }
    }
}
