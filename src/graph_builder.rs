//! GraphBuilder
//!
//! On a GraphRouter cache miss, grows the graph so the next identical
//! query is a hit, reusing existing hubs via the split-point optimization
//! instead of always duplicating long highway segments. Samples the
//! fetched polyline, map-matches each sample to an existing node or
//! inserts a waypoint, and links consecutive samples with edges costed
//! from the enclosing OSRM step's road class.

use crate::clients::osrm::{RawRoute, RouteProvider};
use crate::geo::{geohash, wkt};
use crate::geonode_cache::GeoNodeCache;
use crate::graph_router::GraphRouter;
use crate::relstore::{NodeType, RelStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const ROAD_SPEED_DEFAULT_KMH: f64 = 50.0;
const INTERMEDIATE_LINK_RADIUS_KM: f64 = 10.0;

fn road_speed_kmh(road_name: &str) -> f64 {
    let table: HashMap<&str, f64> = HashMap::from([
        ("motorway", 100.0),
        ("trunk", 90.0),
        ("primary", 80.0),
        ("secondary", 60.0),
        ("tertiary", 50.0),
        ("residential", 30.0),
        ("service", 20.0),
    ]);
    let lowered = road_name.to_lowercase();
    table
        .iter()
        .find(|(class, _)| lowered.contains(*class))
        .map(|(_, speed)| *speed)
        .unwrap_or(ROAD_SPEED_DEFAULT_KMH)
}

pub struct GraphBuilder {
    relstore: RelStore,
    router: Arc<dyn RouteProvider>,
    geo_node_cache: Arc<GeoNodeCache>,
    split_point_tolerance: f64,
    map_match_threshold_m: f64,
    route_sample_interval_km: f64,
}

impl GraphBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relstore: RelStore,
        router: Arc<dyn RouteProvider>,
        geo_node_cache: Arc<GeoNodeCache>,
        split_point_tolerance: f64,
        map_match_threshold_m: f64,
        route_sample_interval_km: f64,
    ) -> Self {
        Self {
            relstore,
            router,
            geo_node_cache,
            split_point_tolerance,
            map_match_threshold_m,
            route_sample_interval_km,
        }
    }

    pub async fn handle_miss(
        &self,
        graph_router: &GraphRouter,
        src_place_id: i64,
        dst_place_id: i64,
        src_coords: (f64, f64),
        dst_coords: (f64, f64),
    ) -> anyhow::Result<bool> {
        // Split-point attempt: hubs near the destination belonging to
        // city/town places.
        let hubs = self
            .relstore
            .find_nearest_hub_nodes(dst_coords.0, dst_coords.1, 50.0, 10)
            .await?;

        for (hub_node, hub_place, _dist_km) in hubs {
            if !graph_router.check_path_exists(src_place_id, hub_place).await? {
                continue;
            }
            let Some(existing) = graph_router.find_route(src_place_id, hub_place).await? else {
                continue;
            };

            let hub_geom = self.relstore.node_geometries(&[hub_node]).await?;
            let Some(&(_, hub_lat, hub_lon)) = hub_geom.first() else {
                continue;
            };

            let last_mile = match self.router.route((hub_lat, hub_lon), dst_coords).await {
                Ok(route) => route,
                Err(_) => continue,
            };
            let direct = match self.router.route(src_coords, dst_coords).await {
                Ok(route) => route,
                Err(_) => continue,
            };

            let combined = existing.total_duration_s + last_mile.duration_s;
            if combined <= self.split_point_tolerance * direct.duration_s {
                info!(
                    "🔗 Split-point reuse via hub node {} (combined {:.0}s vs direct {:.0}s)",
                    hub_node, combined, direct.duration_s
                );
                let injected = self
                    .inject_route(&last_mile, Some(hub_node), None, dst_place_id, (hub_lat, hub_lon), dst_coords)
                    .await?;
                if injected {
                    return Ok(true);
                }
            }
        }

        // Fallback: inject the full direct route as a fresh chain.
        let direct = self.router.route(src_coords, dst_coords).await;
        match direct {
            Ok(route) => {
                self.inject_route(&route, None, Some(src_place_id), dst_place_id, src_coords, dst_coords)
                    .await
            }
            Err(e) => {
                warn!("external router unavailable for direct fetch: {e}");
                Ok(false)
            }
        }
    }

    /// Samples the polyline at ~1 point/km, map-matches or inserts nodes,
    /// links the endpoints, and inserts edges between consecutive samples.
    /// Returns `true` iff at least one edge was created.
    async fn inject_route(
        &self,
        raw_route: &RawRoute,
        anchor_node: Option<i64>,
        src_place_id: Option<i64>,
        dst_place_id: i64,
        src_coords: (f64, f64),
        dst_coords: (f64, f64),
    ) -> anyhow::Result<bool> {
        let samples = self.sample_polyline(raw_route, src_coords, dst_coords);
        if samples.is_empty() {
            return Ok(false);
        }

        let mut node_ids: Vec<i64> = Vec::with_capacity(samples.len());
        if let Some(anchor) = anchor_node {
            node_ids.push(anchor);
        }

        for &(lat, lon, _) in &samples {
            let candidate_hashes = geohash::candidate_hashes(lat, lon, geohash::PRECISION_NODE, true);
            let matched = self
                .relstore
                .nearest_node_within(lat, lon, self.map_match_threshold_m, &candidate_hashes)
                .await?;
            let node_id = match matched {
                Some(id) => id,
                None => {
                    let hash = geohash::encode(lat, lon, geohash::PRECISION_NODE);
                    let id = self.relstore.insert_node(lat, lon, &hash, NodeType::Waypoint).await?;
                    self.geo_node_cache.add(id, lat, lon).await?;
                    id
                }
            };
            node_ids.push(node_id);
        }

        // `samples` has no entry for a caller-supplied `anchor_node`, so the
        // distance-along-route axis has to shift by one when `node_ids` is
        // one longer than `samples`.
        let offset = node_ids.len() - samples.len();

        if let Some(first) = node_ids.first().copied() {
            if let Some(src_place) = src_place_id {
                self.relstore.link_node_to_place(first, src_place).await?;
            }
        }
        if let Some(last) = node_ids.last().copied() {
            self.relstore.link_node_to_place(last, dst_place_id).await?;
        }

        let mut edges_created = 0;
        for (i, pair) in node_ids.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let geoms = self.relstore.node_geometries(&[a, b]).await?;
            let by_id: HashMap<i64, (f64, f64)> = geoms.into_iter().map(|(id, lat, lon)| (id, (lat, lon))).collect();
            let (Some(&pa), Some(&pb)) = (by_id.get(&a), by_id.get(&b)) else {
                continue;
            };

            let distance_m = wkt::haversine_distance_m(pa, pb);
            let sample_idx = (i + 1).saturating_sub(offset).min(samples.len().saturating_sub(1));
            let distance_along_m = samples.get(sample_idx).map(|&(_, _, d)| d).unwrap_or(0.0);
            let speed = self.speed_at_distance(raw_route, distance_along_m);
            let duration_s = distance_m / (speed / 3.6);
            let geometry_wkt = format!("LINESTRING({} {}, {} {})", pa.1, pa.0, pb.1, pb.0);

            self.relstore
                .insert_edge_if_new(a, b, &geometry_wkt, distance_m, speed, duration_s, None)
                .await?;
            edges_created += 1;
        }

        self.link_intermediate_places(&samples, &node_ids, src_place_id, dst_place_id).await?;

        Ok(edges_created > 0)
    }

    /// Promotes cities/towns the injected polyline passes through (other
    /// than the two endpoints already linked above) into access nodes, so
    /// a later query ending at one of them is a GraphRouter hit instead of
    /// another GraphBuilder call.
    async fn link_intermediate_places(
        &self,
        samples: &[(f64, f64, f64)],
        node_ids: &[i64],
        src_place_id: Option<i64>,
        dst_place_id: i64,
    ) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for &(lat, lon, _) in samples {
            let candidates = self.relstore.places_containing(lat, lon).await?;
            for (place_id, ..) in candidates {
                if Some(place_id) == src_place_id || place_id == dst_place_id {
                    continue;
                }
                if !seen.insert(place_id) {
                    continue;
                }
                self.link_place_to_nearest_node(place_id, (lat, lon), node_ids, INTERMEDIATE_LINK_RADIUS_KM)
                    .await?;
            }
        }
        Ok(())
    }

    /// Maps a distance along the route to the road-class speed of whichever
    /// OSRM step encloses it, so a highway-then-residential injection gets
    /// two different speeds instead of one applied to every sample.
    fn speed_at_distance(&self, raw_route: &RawRoute, distance_along_m: f64) -> f64 {
        let mut cursor = 0.0;
        for step in &raw_route.steps {
            cursor += step.distance_m;
            if distance_along_m <= cursor {
                return road_speed_kmh(&step.road_name);
            }
        }
        raw_route
            .steps
            .last()
            .map(|s| road_speed_kmh(&s.road_name))
            .unwrap_or(ROAD_SPEED_DEFAULT_KMH)
    }

    /// Samples the polyline at ~1 point/`route_sample_interval_km`.
    /// Returns `(lat, lon, distance_along_route_m)` triples so callers can
    /// map each segment back to its enclosing OSRM step.
    fn sample_polyline(&self, raw_route: &RawRoute, src_coords: (f64, f64), dst_coords: (f64, f64)) -> Vec<(f64, f64, f64)> {
        if raw_route.coords.is_empty() {
            return vec![(src_coords.0, src_coords.1, 0.0), (dst_coords.0, dst_coords.1, 0.0)];
        }

        let as_lat_lon: Vec<(f64, f64)> = raw_route.coords.iter().map(|&(lon, lat)| (lat, lon)).collect();
        let mut samples = vec![(as_lat_lon[0].0, as_lat_lon[0].1, 0.0)];
        let mut accumulated_km = 0.0;
        let mut total_m = 0.0;

        for pair in as_lat_lon.windows(2) {
            let step_m = wkt::haversine_distance_m(pair[0], pair[1]);
            total_m += step_m;
            accumulated_km += step_m / 1000.0;
            if accumulated_km >= self.route_sample_interval_km {
                samples.push((pair[1].0, pair[1].1, total_m));
                accumulated_km = 0.0;
            }
        }

        let last = as_lat_lon.last().copied();
        if samples.last().map(|&(lat, lon, _)| (lat, lon)) != last {
            if let Some((lat, lon)) = last {
                samples.push((lat, lon, total_m));
            }
        }

        samples
    }

    /// Promotes the nearest unlinked node among a candidate set (e.g.
    /// nodes on a freshly injected route) into an access point for
    /// `place_id`, so future queries ending there become cache hits.
    pub async fn link_place_to_nearest_node(
        &self,
        place_id: i64,
        place_coords: (f64, f64),
        candidate_nodes: &[i64],
        max_km: f64,
    ) -> anyhow::Result<bool> {
        let Some(node_id) = self
            .relstore
            .nearest_unlinked_node(candidate_nodes, place_coords.0, place_coords.1, max_km)
            .await?
        else {
            return Ok(false);
        };
        self.relstore.link_node_to_place(node_id, place_id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn road_speed_table_matches_documented_values() {
        assert_eq!(road_speed_kmh("Motorway A1"), 100.0);
        assert_eq!(road_speed_kmh("residential street"), 30.0);
    }

    #[test]
    fn unknown_road_class_falls_back_to_default() {
        assert_eq!(road_speed_kmh("cattle track"), ROAD_SPEED_DEFAULT_KMH);
    }
}
