//! RelStore
//!
//! Typed wrapper over the relational + spatial store: places, nodes,
//! edges, the weather and route-places durability tables, and
//! `pgr_dijkstra` shortest-path calls, all as parameterized
//! `tokio-postgres` queries behind a bounded `deadpool-postgres` pool.

mod edges;
mod nodes;
mod places;
mod types;
mod weather;

pub use types::*;

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;

#[derive(Clone)]
pub struct RelStore {
    pool: Pool,
}

impl RelStore {
    pub fn connect(database_url: &str, pool_min: usize, pool_max: usize) -> anyhow::Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(database_url.to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: pool_max,
            ..Default::default()
        });
        let _ = pool_min; // deadpool has no explicit floor; max_size is the bound that matters.
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.simple_query("SELECT 1").await.is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_invariant_holds_for_edge_construction() {
        let edge = Edge {
            edge_id: 1,
            source_node: 1,
            target_node: 2,
            geometry: vec![(51.0, 35.0), (51.1, 35.1)],
            distance_meters: 1000.0,
            max_speed_kmh: 60.0,
            base_duration_seconds: 1000.0 / (60.0 / 3.6),
            road_type: None,
        };
        let recomputed = edge.distance_meters / (edge.max_speed_kmh / 3.6);
        assert!((edge.base_duration_seconds - recomputed).abs() < 1e-3);
    }
}
