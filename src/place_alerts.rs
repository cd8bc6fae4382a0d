//! PlaceAlerts
//!
//! Walks a route's geometry through `ST_Contains`, dedups the places it
//! passes through, and attaches an estimated entry time and forecast to
//! each, interpolated from point index over total duration. Also keeps
//! `RoutePlacesCache` warm as a side effect, since the places-along-route
//! list this produces is exactly what that cache stores.

use crate::graph_router::RouteResult;
use crate::relstore::{RelStore, RoutePlaceSummary};
use crate::route_places_cache::RoutePlacesCache;
use crate::weather_cache::{WeatherCache, WeatherPayload};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PlaceAlert {
    pub place_id: i64,
    pub name: String,
    pub place_type: String,
    pub province: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub progress: f64,
    pub entry_time: DateTime<Utc>,
    pub weather: Option<WeatherPayload>,
}

pub struct PlaceAlerts {
    relstore: RelStore,
    weather_cache: Arc<WeatherCache>,
    route_places_cache: RoutePlacesCache,
}

impl PlaceAlerts {
    pub fn new(relstore: RelStore, weather_cache: Arc<WeatherCache>, route_places_cache: RoutePlacesCache) -> Self {
        Self {
            relstore,
            weather_cache,
            route_places_cache,
        }
    }

    pub async fn build(
        &self,
        route: &RouteResult,
        src_place_id: i64,
        dst_place_id: i64,
        departure_time: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PlaceAlert>> {
        let n_points = route.geometry.len();
        if n_points == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut alerts = Vec::new();

        for (idx, &(lat, lon)) in route.geometry.iter().enumerate() {
            let candidates = self.relstore.places_containing(lat, lon).await?;
            for (place_id, name, place_type, province) in candidates {
                if !seen.insert(place_id) {
                    continue;
                }

                let progress = idx as f64 / n_points as f64;
                let entry_time = departure_time + ChronoDuration::seconds((route.total_duration_s * progress).round() as i64);
                let weather = self
                    .weather_cache
                    .get(lat, lon, entry_time, true)
                    .await
                    .ok()
                    .flatten()
                    .map(|reading| reading.payload);

                alerts.push(PlaceAlert {
                    place_id,
                    name,
                    place_type,
                    province,
                    lat,
                    lon,
                    progress,
                    entry_time,
                    weather,
                });
            }
        }

        alerts.sort_by(|a, b| a.progress.partial_cmp(&b.progress).unwrap_or(std::cmp::Ordering::Equal));

        let summaries: Vec<RoutePlaceSummary> = alerts
            .iter()
            .map(|a| RoutePlaceSummary {
                name: a.name.clone(),
                place_type: a.place_type.clone(),
                lat: a.lat,
                lon: a.lon,
            })
            .collect();
        let _ = self.route_places_cache.set(src_place_id, dst_place_id, &summaries).await;

        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_fraction_of_point_index() {
        let n_points = 4usize;
        let idx = 1usize;
        let progress = idx as f64 / n_points as f64;
        assert!((progress - 0.25).abs() < 1e-9);
    }
}
