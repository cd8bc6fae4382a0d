//! WeatherOverlay
//!
//! Walks a route's geometry, buckets each point into an H3 cell at the
//! estimated arrival time, and resolves one forecast per distinct
//! (cell, hour) pair — never once per geometry point.

use crate::clients::openmeteo::ForecastProvider;
use crate::geo::h3;
use crate::graph_router::RouteResult;
use crate::singleflight::Singleflight;
use crate::weather_cache::{WeatherCache, WeatherPayload};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct WeatherCellResult {
    pub cell_id: String,
    pub lat: f64,
    pub lon: f64,
    pub arrival_time: DateTime<Utc>,
    pub payload: WeatherPayload,
    pub category: &'static str,
    pub stale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherOverlayStats {
    pub total_cells: u64,
    pub hits: u64,
    pub misses: u64,
    pub stale_serves: u64,
    pub new_api_calls: u64,
}

impl WeatherOverlayStats {
    /// Fraction of cells served from `WeatherCache` without an upstream
    /// forecast call. `0.0` when no cells were resolved rather than dividing
    /// by zero.
    pub fn cell_cache_hit_rate(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_cells as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherOverlayResult {
    pub cells: Vec<WeatherCellResult>,
    pub summary: String,
    pub stats: WeatherOverlayStats,
}

pub struct WeatherOverlay {
    weather_cache: Arc<WeatherCache>,
    forecast_provider: Arc<dyn ForecastProvider>,
    singleflight: Arc<Singleflight>,
    parallel_weather_requests: usize,
    h3_resolution: u8,
}

impl WeatherOverlay {
    pub fn new(
        weather_cache: Arc<WeatherCache>,
        forecast_provider: Arc<dyn ForecastProvider>,
        singleflight: Arc<Singleflight>,
        parallel_weather_requests: usize,
        h3_resolution: u8,
    ) -> Self {
        Self {
            weather_cache,
            forecast_provider,
            singleflight,
            parallel_weather_requests,
            h3_resolution,
        }
    }

    pub async fn build(&self, route: &RouteResult, departure_time: DateTime<Utc>) -> anyhow::Result<WeatherOverlayResult> {
        let mut by_cell: HashMap<String, (f64, f64, DateTime<Utc>)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (idx, &(lat, lon)) in route.geometry.iter().enumerate() {
            let offset_s = route.edge_details.get(idx).map(|s| s.agg_cost).unwrap_or(0.0);
            let arrival = departure_time + ChronoDuration::seconds(offset_s.round() as i64);
            let cell_id = h3::cell(lat, lon, self.h3_resolution);
            if cell_id.is_empty() {
                continue;
            }
            by_cell.entry(cell_id.clone()).or_insert_with(|| {
                order.push(cell_id.clone());
                (lat, lon, arrival)
            });
        }

        let hits = Arc::new(AtomicU64::new(0));
        let misses = Arc::new(AtomicU64::new(0));
        let stale_serves = Arc::new(AtomicU64::new(0));
        let new_api_calls = Arc::new(AtomicU64::new(0));
        let semaphore = Arc::new(Semaphore::new(self.parallel_weather_requests.max(1)));

        let mut handles = Vec::with_capacity(order.len());
        for cell_id in &order {
            let (lat, lon, arrival) = by_cell[cell_id];
            let cell_id = cell_id.clone();
            let permit = semaphore.clone().acquire_owned().await?;
            let weather_cache = self.weather_cache.clone();
            let forecast_provider = self.forecast_provider.clone();
            let singleflight = self.singleflight.clone();
            let hits = hits.clone();
            let misses = misses.clone();
            let stale_serves = stale_serves.clone();
            let new_api_calls = new_api_calls.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = fetch_cell(
                    &weather_cache,
                    &forecast_provider,
                    &singleflight,
                    &cell_id,
                    lat,
                    lon,
                    arrival,
                    &hits,
                    &misses,
                    &stale_serves,
                    &new_api_calls,
                )
                .await;
                result.map(|(payload, stale)| WeatherCellResult {
                    cell_id,
                    lat,
                    lon,
                    arrival_time: arrival,
                    category: categorize_weather(payload.weather_code),
                    payload,
                    stale,
                })
            }));
        }

        let mut cells = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(Ok(Some(cell))) = handle.await {
                cells.push(cell);
            }
        }

        let stats = WeatherOverlayStats {
            total_cells: order.len() as u64,
            hits: hits.load(Ordering::SeqCst),
            misses: misses.load(Ordering::SeqCst),
            stale_serves: stale_serves.load(Ordering::SeqCst),
            new_api_calls: new_api_calls.load(Ordering::SeqCst),
        };
        let summary = generate_weather_summary(&cells);

        Ok(WeatherOverlayResult { cells, summary, stats })
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_cell(
    weather_cache: &WeatherCache,
    forecast_provider: &Arc<dyn ForecastProvider>,
    singleflight: &Singleflight,
    cell_id: &str,
    lat: f64,
    lon: f64,
    arrival_time: DateTime<Utc>,
    hits: &AtomicU64,
    misses: &AtomicU64,
    stale_serves: &AtomicU64,
    new_api_calls: &AtomicU64,
) -> anyhow::Result<Option<(WeatherPayload, bool)>> {
    if let Some(reading) = weather_cache.get(lat, lon, arrival_time, true).await? {
        hits.fetch_add(1, Ordering::SeqCst);
        if reading.stale {
            stale_serves.fetch_add(1, Ordering::SeqCst);
        }
        return Ok(Some((reading.payload, reading.stale)));
    }

    misses.fetch_add(1, Ordering::SeqCst);
    let hour_bucket = arrival_time.format("%Y%m%d%H").to_string();
    let singleflight_key = format!("weather-fetch:{cell_id}_{hour_bucket}");

    let forecast_provider = forecast_provider.clone();
    let payload = singleflight
        .get_or_fetch(&singleflight_key, Duration::from_secs(10), move || {
            let forecast_provider = forecast_provider.clone();
            async move {
                let points = forecast_provider.hourly_forecast(lat, lon).await?;
                let matched = points
                    .iter()
                    .find(|p| p.time.starts_with(&arrival_time.format("%Y-%m-%dT%H").to_string()))
                    .or_else(|| points.first())
                    .ok_or_else(|| anyhow::anyhow!("forecast provider returned no points"))?;
                Ok(WeatherPayload {
                    temperature_c: matched.temperature_c,
                    weather_code: matched.weather_code,
                })
            }
        })
        .await?;

    new_api_calls.fetch_add(1, Ordering::SeqCst);
    weather_cache.set(lat, lon, arrival_time, payload.clone(), None).await?;
    Ok(Some((payload, false)))
}

/// Maps an Open-Meteo WMO weather code to a coarse display category.
fn categorize_weather(code: i32) -> &'static str {
    match code {
        0 => "clear",
        1..=3 => "cloudy",
        45 | 48 => "fog",
        51..=57 | 61..=67 | 80..=82 => "rain",
        71..=77 | 85 | 86 => "snow",
        95..=99 => "thunderstorm",
        _ => "cloudy",
    }
}

/// One-sentence summary from the two most common categories along the
/// route, in descending order of occurrence.
fn generate_weather_summary(cells: &[WeatherCellResult]) -> String {
    if cells.is_empty() {
        return "No weather data available for this route.".to_string();
    }

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for cell in cells {
        *counts.entry(cell.category).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&'static str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    match ranked.as_slice() {
        [(only, _)] => format!("Expect {only} conditions for the whole route."),
        [(first, _), (second, _), ..] => {
            format!("Mostly {first} with stretches of {second} along the route.")
        }
        [] => "No weather data available for this route.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_weather_covers_documented_codes() {
        assert_eq!(categorize_weather(0), "clear");
        assert_eq!(categorize_weather(2), "cloudy");
        assert_eq!(categorize_weather(45), "fog");
        assert_eq!(categorize_weather(63), "rain");
        assert_eq!(categorize_weather(75), "snow");
        assert_eq!(categorize_weather(96), "thunderstorm");
    }

    #[test]
    fn summary_is_stable_for_single_category() {
        let cell = |cat: &'static str| WeatherCellResult {
            cell_id: "x".into(),
            lat: 0.0,
            lon: 0.0,
            arrival_time: Utc::now(),
            payload: WeatherPayload {
                temperature_c: 20.0,
                weather_code: 0,
            },
            category: cat,
            stale: false,
        };
        let cells = vec![cell("clear"), cell("clear")];
        assert_eq!(generate_weather_summary(&cells), "Expect clear conditions for the whole route.");
    }

    #[test]
    fn summary_on_empty_cells_is_explicit() {
        assert_eq!(generate_weather_summary(&[]), "No weather data available for this route.");
    }
}
