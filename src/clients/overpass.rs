//! Overpass-compatible OSM boundary client.
//!
//! Consumes the first element's `members[role=outer].geometry[{lat,lon}]`
//! or its `bounds` as a rectangular fallback when no detailed ring comes
//! back.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("overpass http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("overpass returned no matching element")]
    NotFound,
}

#[derive(Debug, Clone)]
pub struct BoundaryResult {
    /// Outer-ring vertices as `(lat, lon)`.
    pub outer_ring: Vec<(f64, f64)>,
    pub osm_id: Option<i64>,
    pub population: Option<i64>,
}

#[async_trait]
pub trait BoundaryProvider: Send + Sync {
    async fn fetch_boundary(&self, name: &str, admin_level: u8) -> Result<BoundaryResult, BoundaryError>;
}

pub struct OverpassClient {
    client: reqwest::Client,
    base_url: String,
}

impl OverpassClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BoundaryProvider for OverpassClient {
    async fn fetch_boundary(&self, name: &str, admin_level: u8) -> Result<BoundaryResult, BoundaryError> {
        let query = format!(
            "[out:json];relation[\"boundary\"=\"administrative\"][\"admin_level\"=\"{admin_level}\"][\"name\"=\"{name}\"];out geom;"
        );

        let response: serde_json::Value = self
            .client
            .post(&self.base_url)
            .form(&[("data", query.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let elements = response["elements"].as_array().cloned().unwrap_or_default();
        let element = elements.first().ok_or(BoundaryError::NotFound)?;

        let members = element["members"].as_array().cloned().unwrap_or_default();
        let mut outer_ring: Vec<(f64, f64)> = Vec::new();
        for member in &members {
            if member["role"].as_str() != Some("outer") {
                continue;
            }
            if let Some(geometry) = member["geometry"].as_array() {
                for point in geometry {
                    if let (Some(lat), Some(lon)) = (point["lat"].as_f64(), point["lon"].as_f64()) {
                        outer_ring.push((lat, lon));
                    }
                }
            }
        }

        if outer_ring.is_empty() {
            if let Some(bounds) = element["bounds"].as_object() {
                let (minlat, minlon, maxlat, maxlon) = (
                    bounds["minlat"].as_f64().unwrap_or(0.0),
                    bounds["minlon"].as_f64().unwrap_or(0.0),
                    bounds["maxlat"].as_f64().unwrap_or(0.0),
                    bounds["maxlon"].as_f64().unwrap_or(0.0),
                );
                outer_ring = vec![
                    (minlat, minlon),
                    (minlat, maxlon),
                    (maxlat, maxlon),
                    (maxlat, minlon),
                ];
            }
        }

        if outer_ring.is_empty() {
            return Err(BoundaryError::NotFound);
        }

        Ok(BoundaryResult {
            outer_ring,
            osm_id: element["id"].as_i64(),
            population: element["tags"]["population"]
                .as_str()
                .and_then(|s| s.parse().ok()),
        })
    }
}
