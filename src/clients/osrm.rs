//! OSRM-compatible router client.
//!
//! Consumes `routes[0].geometry` / `.distance` / `.duration` /
//! `legs[0].annotation.duration` / `legs[0].steps[*].name` via an async
//! `reqwest::Client`, since this service runs inside an async runtime.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OsrmError {
    #[error("osrm http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("osrm api error: {0}")]
    Api(String),
    #[error("osrm returned no route")]
    NoRoute,
}

/// One OSRM route step: the road class active over `distance_m` of the
/// route starting where the previous step ended.
#[derive(Debug, Clone)]
pub struct RouteStep {
    pub road_name: String,
    pub distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct RawRoute {
    /// Dense polyline as `(lon, lat)` pairs.
    pub coords: Vec<(f64, f64)>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub segment_durations_s: Vec<f64>,
    pub steps: Vec<RouteStep>,
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, src: (f64, f64), dst: (f64, f64)) -> Result<RawRoute, OsrmError>;
}

pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn route(&self, src: (f64, f64), dst: (f64, f64)) -> Result<RawRoute, OsrmError> {
        let (src_lat, src_lon) = src;
        let (dst_lat, dst_lon) = dst;
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, src_lon, src_lat, dst_lon, dst_lat
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "full"),
                ("geometries", "geojson"),
                ("steps", "true"),
                ("annotations", "duration"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<OsrmRouteResponse>()
            .await?;

        let route = response.routes.into_iter().next().ok_or(OsrmError::NoRoute)?;
        let leg = route.legs.into_iter().next();

        let segment_durations_s = leg
            .as_ref()
            .map(|l| l.annotation.duration.clone())
            .unwrap_or_default();
        let steps = leg
            .map(|l| {
                l.steps
                    .into_iter()
                    .map(|s| RouteStep {
                        road_name: s.name,
                        distance_m: s.distance,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawRoute {
            coords: route.geometry.coordinates,
            distance_m: route.distance,
            duration_s: route.duration,
            segment_durations_s,
            steps,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    annotation: OsrmAnnotation,
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmAnnotation {
    duration: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    name: String,
    distance: f64,
}
