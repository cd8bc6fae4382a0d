//! GraphRouter
//!
//! Shortest path over the persisted graph between access-node sets of
//! two places, trying every access-node pair and keeping the cheapest.
//! Returning `None` is the cache-miss signal GraphBuilder and the
//! Orchestrator consume — not an error.

use crate::relstore::{PathStep, RelStore};

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub node_sequence: Vec<i64>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub geometry: Vec<(f64, f64)>,
    pub edge_details: Vec<PathStep>,
}

pub struct GraphRouter {
    relstore: RelStore,
}

impl GraphRouter {
    pub fn new(relstore: RelStore) -> Self {
        Self { relstore }
    }

    pub async fn find_route(&self, src_place_id: i64, dst_place_id: i64) -> anyhow::Result<Option<RouteResult>> {
        let src_nodes = self.relstore.access_nodes_of(src_place_id).await?;
        let dst_nodes = self.relstore.access_nodes_of(dst_place_id).await?;
        if src_nodes.is_empty() || dst_nodes.is_empty() {
            return Ok(None);
        }

        let mut best: Option<(i64, i64, Vec<PathStep>)> = None;

        for &s in &src_nodes {
            for &t in &dst_nodes {
                let Some(steps) = self.relstore.shortest_path(s, t).await? else {
                    continue;
                };
                let Some(last) = steps.last() else { continue };
                let total_cost = last.agg_cost;
                let total_distance: f64 = steps.iter().map(|st| st.distance_m).sum();

                let better = match &best {
                    None => true,
                    Some((best_s, _, best_steps)) => {
                        let best_last = best_steps.last().expect("non-empty path");
                        let best_cost = best_last.agg_cost;
                        let best_distance: f64 = best_steps.iter().map(|st| st.distance_m).sum();
                        (total_cost < best_cost)
                            || (total_cost == best_cost && total_distance < best_distance)
                            || (total_cost == best_cost && total_distance == best_distance && s < *best_s)
                    }
                };

                if better {
                    best = Some((s, t, steps));
                }
            }
        }

        let Some((_, _, steps)) = best else {
            return Ok(None);
        };

        let node_sequence: Vec<i64> = steps.iter().map(|s| s.node).collect();
        let node_ids: Vec<i64> = node_sequence.clone();
        let geometries = self.relstore.node_geometries(&node_ids).await?;
        let geometry: Vec<(f64, f64)> = geometries.into_iter().map(|(_, lat, lon)| (lat, lon)).collect();

        let total_distance_m = steps.iter().map(|s| s.distance_m).sum();
        let total_duration_s = steps.last().map(|s| s.agg_cost).unwrap_or(0.0);

        Ok(Some(RouteResult {
            node_sequence,
            total_distance_m,
            total_duration_s,
            geometry,
            edge_details: steps,
        }))
    }

    pub async fn check_path_exists(&self, src_place_id: i64, dst_place_id: i64) -> anyhow::Result<bool> {
        Ok(self.find_route(src_place_id, dst_place_id).await?.is_some())
    }
}
