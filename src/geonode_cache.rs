//! GeoNodeCache
//!
//! Hot-loaded geospatial index of graph nodes for nearest-node queries,
//! backed by a Redis GEO set with a RelStore fallback and hit/miss
//! counters for observability.

use crate::kv::KvCache;
use crate::relstore::RelStore;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const NODES_KEY: &str = "geo:nodes";

#[derive(Debug, Default)]
pub struct GeoNodeCacheStats {
    pub nodes_loaded: u64,
    pub redis_hits: u64,
    pub postgres_fallbacks: u64,
}

pub struct GeoNodeCache {
    kv: KvCache,
    relstore: RelStore,
    redis_hits: AtomicU64,
    postgres_fallbacks: AtomicU64,
    nodes_loaded: AtomicU64,
}

impl GeoNodeCache {
    pub fn new(kv: KvCache, relstore: RelStore) -> Self {
        Self {
            kv,
            relstore,
            redis_hits: AtomicU64::new(0),
            postgres_fallbacks: AtomicU64::new(0),
            nodes_loaded: AtomicU64::new(0),
        }
    }

    /// Bulk-loads every node into the GEO set in pipelined batches.
    /// Called once after both pools are up and before any request is
    /// served.
    pub async fn load_all_nodes(&self, all_nodes: &[(i64, f64, f64)]) -> anyhow::Result<()> {
        const BATCH_SIZE: usize = 500;
        let mut loaded = 0u64;
        for chunk in all_nodes.chunks(BATCH_SIZE) {
            let members: Vec<(f64, f64, String)> = chunk
                .iter()
                .map(|(id, lat, lon)| (*lon, *lat, id.to_string()))
                .collect();
            self.kv.geoadd_many(NODES_KEY, &members).await?;
            loaded += chunk.len() as u64;
        }
        self.nodes_loaded.store(loaded, Ordering::Relaxed);
        info!("🌐 GeoNodeCache loaded {} nodes", loaded);
        Ok(())
    }

    /// Hot path: `GEORADIUS WITHDIST SORT ASC COUNT limit`. Cold path on
    /// KVCache miss/error: RelStore distance query with KNN ordering.
    pub async fn nearby(&self, lat: f64, lon: f64, radius_km: f64, limit: usize) -> anyhow::Result<Vec<(i64, f64)>> {
        match self.kv.georadius(NODES_KEY, lon, lat, radius_km, limit).await {
            Ok(results) if !results.is_empty() => {
                self.redis_hits.fetch_add(1, Ordering::Relaxed);
                Ok(results
                    .into_iter()
                    .filter_map(|(member, dist)| member.parse::<i64>().ok().map(|id| (id, dist)))
                    .collect())
            }
            _ => {
                self.postgres_fallbacks.fetch_add(1, Ordering::Relaxed);
                let hashes = crate::geo::geohash::candidate_hashes(lat, lon, crate::geo::geohash::PRECISION_NODE, true);
                let nearest = self
                    .relstore
                    .nearest_node_within(lat, lon, radius_km * 1000.0, &hashes)
                    .await?;
                Ok(nearest.into_iter().map(|id| (id, 0.0)).take(limit).collect())
            }
        }
    }

    pub async fn add(&self, node_id: i64, lat: f64, lon: f64) -> anyhow::Result<()> {
        self.kv.geoadd(NODES_KEY, lon, lat, &node_id.to_string()).await?;
        Ok(())
    }

    pub async fn remove(&self, node_id: i64) -> anyhow::Result<()> {
        self.kv.geo_remove(NODES_KEY, &node_id.to_string()).await?;
        Ok(())
    }

    pub fn stats(&self) -> GeoNodeCacheStats {
        GeoNodeCacheStats {
            nodes_loaded: self.nodes_loaded.load(Ordering::Relaxed),
            redis_hits: self.redis_hits.load(Ordering::Relaxed),
            postgres_fallbacks: self.postgres_fallbacks.load(Ordering::Relaxed),
        }
    }
}
