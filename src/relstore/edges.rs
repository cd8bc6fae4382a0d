use super::{PathStep, RelStore};
use anyhow::Context;

impl RelStore {
    /// No-op on `(source_node, target_node)` conflict — edges are never
    /// updated after insert, so re-running a route injection is safe.
    pub async fn insert_edge_if_new(
        &self,
        source_node: i64,
        target_node: i64,
        geometry_wkt: &str,
        distance_m: f64,
        max_kmh: f64,
        duration_s: f64,
        road_type: Option<&str>,
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        client
            .execute(
                "INSERT INTO edges \
                 (source_node, target_node, geometry, distance_meters, max_speed_kmh, base_duration_seconds, road_type) \
                 VALUES ($1, $2, ST_GeomFromText($3, 4326), $4, $5, $6, $7) \
                 ON CONFLICT (source_node, target_node) DO NOTHING",
                &[
                    &source_node,
                    &target_node,
                    &geometry_wkt,
                    &distance_m,
                    &max_kmh,
                    &duration_s,
                    &road_type,
                ],
            )
            .await?;
        Ok(())
    }

    /// `pgr_dijkstra` shortest path between two nodes, costed on
    /// `base_duration_seconds`. Returns `None` when no path exists — the
    /// cache-miss signal consumed by the Orchestrator, not an error.
    pub async fn shortest_path(
        &self,
        src_node: i64,
        dst_node: i64,
    ) -> anyhow::Result<Option<Vec<PathStep>>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query(
                "SELECT d.seq, d.node, d.edge, d.cost, d.agg_cost, \
                        COALESCE(e.distance_meters, 0) AS distance_m, \
                        COALESCE(e.base_duration_seconds, 0) AS duration_s \
                 FROM pgr_dijkstra( \
                   'SELECT edge_id AS id, source_node AS source, target_node AS target, base_duration_seconds AS cost FROM edges', \
                   $1, $2, directed => true \
                 ) d \
                 LEFT JOIN edges e ON e.edge_id = d.edge \
                 ORDER BY d.seq",
                &[&src_node, &dst_node],
            )
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let steps = rows
            .iter()
            .map(|r| PathStep {
                seq: r.get(0),
                node: r.get(1),
                edge: {
                    let edge: i64 = r.get(2);
                    if edge < 0 { None } else { Some(edge) }
                },
                cost: r.get(3),
                agg_cost: r.get(4),
                distance_m: r.get(5),
                duration_s: r.get(6),
            })
            .collect();
        Ok(Some(steps))
    }

    /// Total edge count, for tests asserting how much graph a build added
    /// rather than inspecting generated geometry directly.
    pub async fn count_edges(&self) -> anyhow::Result<i64> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client.query_one("SELECT COUNT(*) FROM edges", &[]).await?;
        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use crate::relstore::Edge;

    #[test]
    fn duration_is_pure_function_of_distance_and_speed() {
        let distance = 12_000.0;
        let speed = 80.0;
        let duration = Edge::compute_duration_seconds(distance, speed);
        assert!((duration - 540.0).abs() < 1e-6);
    }
}
