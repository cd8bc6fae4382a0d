use super::{NodeType, RelStore};
use anyhow::Context;

impl RelStore {
    pub async fn access_nodes_of(&self, place_id: i64) -> anyhow::Result<Vec<i64>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query(
                "SELECT node_id FROM nodes WHERE linked_place_id = $1 AND node_type = 'access_point'",
                &[&place_id],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    /// Candidate-hash prefiltered nearest-node lookup: filter by geohash
    /// membership (B-tree) before the spatial distance ordering.
    pub async fn nearest_node_within(
        &self,
        lat: f64,
        lon: f64,
        threshold_m: f64,
        candidate_hashes: &[String],
    ) -> anyhow::Result<Option<i64>> {
        if candidate_hashes.is_empty() {
            return Ok(None);
        }
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client
            .query_opt(
                "SELECT node_id FROM nodes \
                 WHERE geohash = ANY($1) \
                 AND ST_DWithin(geometry::geography, ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography, $4) \
                 ORDER BY geometry::geography <-> ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography \
                 LIMIT 1",
                &[&candidate_hashes, &lat, &lon, &threshold_m],
            )
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    pub async fn insert_node(
        &self,
        lat: f64,
        lon: f64,
        geohash: &str,
        node_type: NodeType,
    ) -> anyhow::Result<i64> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let type_str = match node_type {
            NodeType::Waypoint => "waypoint",
            NodeType::AccessPoint => "access_point",
        };
        let row = client
            .query_one(
                "INSERT INTO nodes (geometry, geohash, node_type) \
                 VALUES (ST_SetSRID(ST_MakePoint($2, $1), 4326), $3, $4) \
                 RETURNING node_id",
                &[&lat, &lon, &geohash, &type_str],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn link_node_to_place(&self, node_id: i64, place_id: i64) -> anyhow::Result<()> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        client
            .execute(
                "UPDATE nodes SET linked_place_id = $2, node_type = 'access_point' WHERE node_id = $1",
                &[&node_id, &place_id],
            )
            .await?;
        Ok(())
    }

    /// Returns `(node_id, lat, lon)` preserving the input order.
    pub async fn node_geometries(&self, node_ids: &[i64]) -> anyhow::Result<Vec<(i64, f64, f64)>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query(
                "SELECT node_id, ST_Y(geometry) AS lat, ST_X(geometry) AS lon \
                 FROM nodes WHERE node_id = ANY($1) \
                 ORDER BY array_position($1::bigint[], node_id)",
                &[&node_ids],
            )
            .await?;
        Ok(rows.iter().map(|r| (r.get(0), r.get(1), r.get(2))).collect())
    }

    /// Nodes near a coordinate belonging to city/town places — used by
    /// GraphBuilder's split-point search.
    pub async fn find_nearest_hub_nodes(
        &self,
        lat: f64,
        lon: f64,
        max_distance_km: f64,
        limit: i64,
    ) -> anyhow::Result<Vec<(i64, i64, f64)>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query(
                "SELECT n.node_id, n.linked_place_id, \
                        ST_Distance(n.geometry::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography) / 1000.0 AS dist_km \
                 FROM nodes n \
                 JOIN places p ON p.place_id = n.linked_place_id \
                 WHERE p.place_type IN ('city', 'town') \
                 AND ST_DWithin(n.geometry::geography, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3 * 1000.0) \
                 ORDER BY dist_km ASC \
                 LIMIT $4",
                &[&lat, &lon, &max_distance_km, &limit],
            )
            .await?;
        Ok(rows.iter().map(|r| (r.get(0), r.get(1), r.get(2))).collect())
    }

    /// Every node's coordinates, for `GeoNodeCache`'s warm load at boot.
    pub async fn all_node_coords(&self) -> anyhow::Result<Vec<(i64, f64, f64)>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let rows = client
            .query("SELECT node_id, ST_Y(geometry) AS lat, ST_X(geometry) AS lon FROM nodes", &[])
            .await?;
        Ok(rows.iter().map(|r| (r.get(0), r.get(1), r.get(2))).collect())
    }

    /// Nearest unlinked node among a candidate set — used after a route
    /// injection to promote a passing-through city into a hub.
    pub async fn nearest_unlinked_node(
        &self,
        candidate_node_ids: &[i64],
        lat: f64,
        lon: f64,
        max_km: f64,
    ) -> anyhow::Result<Option<i64>> {
        if candidate_node_ids.is_empty() {
            return Ok(None);
        }
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client
            .query_opt(
                "SELECT node_id FROM nodes \
                 WHERE node_id = ANY($1) AND linked_place_id IS NULL \
                 AND ST_DWithin(geometry::geography, ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography, $4 * 1000.0) \
                 ORDER BY geometry::geography <-> ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography \
                 LIMIT 1",
                &[&candidate_node_ids, &lat, &lon, &max_km],
            )
            .await?;
        Ok(row.map(|r| r.get(0)))
    }
}
