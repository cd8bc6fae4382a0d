//! RoutePlacesCache
//!
//! Per (src_place, dst_place) list of places along the route, with a
//! KVCache hot layer in front of the durable store.

use crate::relstore::{RelStore, RoutePlaceSummary};
use crate::kv::KvCache;

const ROUTE_PLACES_TTL_SECONDS: i64 = 24 * 3600;

pub struct RoutePlacesCache {
    kv: KvCache,
    relstore: RelStore,
}

impl RoutePlacesCache {
    pub fn new(kv: KvCache, relstore: RelStore) -> Self {
        Self { kv, relstore }
    }

    fn key(src: i64, dst: i64) -> String {
        format!("route:places:{src}:{dst}")
    }

    pub async fn get(&self, src: i64, dst: i64) -> anyhow::Result<Option<Vec<RoutePlaceSummary>>> {
        let key = Self::key(src, dst);
        if let Ok(Some(places)) = self.kv.get_json::<Vec<RoutePlaceSummary>>(&key).await {
            return Ok(Some(places));
        }

        if let Some(entry) = self.relstore.route_places_get(src, dst).await? {
            let _ = self
                .kv
                .setex_json(&key, ROUTE_PLACES_TTL_SECONDS, &entry.places)
                .await;
            return Ok(Some(entry.places));
        }

        Ok(None)
    }

    pub async fn set(&self, src: i64, dst: i64, places: &[RoutePlaceSummary]) -> anyhow::Result<()> {
        let key = Self::key(src, dst);
        self.kv.setex_json(&key, ROUTE_PLACES_TTL_SECONDS, &places).await?;
        self.relstore.route_places_upsert(src, dst, places).await?;
        Ok(())
    }

    pub async fn clear(&self, src: Option<i64>, dst: Option<i64>) -> anyhow::Result<()> {
        match (src, dst) {
            (Some(s), Some(d)) => {
                self.kv.del(&Self::key(s, d)).await?;
            }
            _ => {
                let keys = self.kv.scan_prefix("route:places:").await?;
                self.kv.del_many(&keys).await?;
            }
        }
        Ok(())
    }
}
