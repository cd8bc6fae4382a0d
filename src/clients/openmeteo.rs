//! Open-Meteo-compatible forecast client.
//!
//! Consumes `hourly.time[]` / `hourly.temperature_2m[]` /
//! `hourly.weathercode[]`. Batch requests accept comma-joined
//! coordinates; a `429` response backs off exponentially (2x, capped at
//! 3 retries) before giving up on the batch.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("forecast rate-limited after retries")]
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct ForecastPoint {
    pub time: String,
    pub temperature_c: f64,
    pub weather_code: i32,
}

#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn hourly_forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastPoint>, ForecastError>;
    async fn batch_hourly_forecast(
        &self,
        coords: &[(f64, f64)],
    ) -> Result<Vec<Vec<ForecastPoint>>, ForecastError>;
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

const MAX_RETRIES: u32 = 3;

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, lat_csv: &str, lon_csv: &str) -> Result<serde_json::Value, ForecastError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("latitude", lat_csv),
                    ("longitude", lon_csv),
                    ("hourly", "temperature_2m,weathercode"),
                    ("forecast_days", "3"),
                ])
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    return Err(ForecastError::RateLimited);
                }
                let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            return Ok(response.error_for_status()?.json().await?);
        }
    }

    fn parse_single(body: &serde_json::Value) -> Vec<ForecastPoint> {
        let hourly = &body["hourly"];
        let times = hourly["time"].as_array().cloned().unwrap_or_default();
        let temps = hourly["temperature_2m"].as_array().cloned().unwrap_or_default();
        let codes = hourly["weathercode"].as_array().cloned().unwrap_or_default();

        times
            .iter()
            .zip(temps.iter())
            .zip(codes.iter())
            .map(|((time, temp), code)| ForecastPoint {
                time: time.as_str().unwrap_or_default().to_string(),
                temperature_c: temp.as_f64().unwrap_or(0.0),
                weather_code: code.as_i64().unwrap_or(0) as i32,
            })
            .collect()
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    async fn hourly_forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastPoint>, ForecastError> {
        let body = self.fetch(&lat.to_string(), &lon.to_string()).await?;
        Ok(Self::parse_single(&body))
    }

    async fn batch_hourly_forecast(
        &self,
        coords: &[(f64, f64)],
    ) -> Result<Vec<Vec<ForecastPoint>>, ForecastError> {
        if coords.is_empty() {
            return Ok(Vec::new());
        }
        let lats: Vec<String> = coords.iter().map(|(lat, _)| lat.to_string()).collect();
        let lons: Vec<String> = coords.iter().map(|(_, lon)| lon.to_string()).collect();
        let body = self.fetch(&lats.join(","), &lons.join(",")).await?;

        // The batch form returns a list when multiple coordinates were
        // requested, or a single object for exactly one.
        if let Some(list) = body.as_array() {
            Ok(list.iter().map(Self::parse_single).collect())
        } else {
            Ok(vec![Self::parse_single(&body)])
        }
    }
}

