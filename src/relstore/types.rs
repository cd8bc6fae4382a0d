//! Typed records for the place/node/edge/weather/route-places data model.
//! Every field that could have been a loose JSON blob is an explicit
//! struct or enum instead, so callers get compile-time checking on shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceType {
    City,
    Town,
    Village,
    Hamlet,
    Suburb,
    Region,
}

impl PlaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceType::City => "city",
            PlaceType::Town => "town",
            PlaceType::Village => "village",
            PlaceType::Hamlet => "hamlet",
            PlaceType::Suburb => "suburb",
            PlaceType::Region => "region",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Waypoint,
    AccessPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub place_id: i64,
    pub name: String,
    pub place_type: PlaceType,
    pub country: Option<String>,
    pub province: Option<String>,
    pub center: (f64, f64), // (lat, lon)
    pub boundary_wkt: Option<String>,
    pub geohash: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: i64,
    pub geometry: (f64, f64), // (lat, lon)
    pub geohash: String,
    pub node_type: NodeType,
    pub linked_place_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub edge_id: i64,
    pub source_node: i64,
    pub target_node: i64,
    pub geometry: Vec<(f64, f64)>,
    pub distance_meters: f64,
    pub max_speed_kmh: f64,
    pub base_duration_seconds: f64,
    pub road_type: Option<String>,
}

impl Edge {
    pub fn compute_duration_seconds(distance_meters: f64, max_speed_kmh: f64) -> f64 {
        distance_meters / (max_speed_kmh / 3.6)
    }
}

/// A step of a `pgr_dijkstra` shortest path result.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub seq: i32,
    pub node: i64,
    pub edge: Option<i64>,
    pub cost: f64,
    pub agg_cost: f64,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone)]
pub struct WeatherCacheRow {
    pub cache_key: String,
    pub h3_index: String,
    pub forecast_hour: DateTime<Utc>,
    pub model_run_time: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlaceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub place_type: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlacesEntry {
    pub source_place_id: i64,
    pub target_place_id: i64,
    pub places: Vec<RoutePlaceSummary>,
    pub total_places: usize,
    pub updated_at: DateTime<Utc>,
}
