//! Seeder
//!
//! Resolves a place name to a `place_id` on demand, fetching its
//! administrative boundary from an OSM-compatible source when the fast
//! path misses. Uses the same per-key lease-registry shape as
//! `Singleflight` so two tasks never seed the same place twice.

use crate::clients::overpass::BoundaryProvider;
use crate::geo::{geohash, wkt};
use crate::normalize;
use crate::relstore::{PlaceType, RelStore};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Seeder {
    relstore: RelStore,
    boundary_provider: Arc<dyn BoundaryProvider>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl Seeder {
    pub fn new(relstore: RelStore, boundary_provider: Arc<dyn BoundaryProvider>) -> Self {
        Self {
            relstore,
            boundary_provider,
            inflight: DashMap::new(),
        }
    }

    pub async fn get_or_seed_place(
        &self,
        name: &str,
        country: Option<&str>,
        admin_level: u8,
    ) -> anyhow::Result<Option<i64>> {
        let normalized = normalize::normalize(name);
        if normalized.is_empty() {
            return Ok(None);
        }

        if let Some(place_id) = self.relstore.find_place(&normalized, None, country).await? {
            return Ok(Some(place_id));
        }

        let lock_key = format!("{normalized}:{}", country.unwrap_or(""));
        let lease = self
            .inflight
            .entry(lock_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lease.lock().await;

        // Another task may have completed the seed while we waited.
        if let Some(place_id) = self.relstore.find_place(&normalized, None, country).await? {
            self.inflight.remove(&lock_key);
            return Ok(Some(place_id));
        }

        let result = self.seed(&normalized, name, country, admin_level).await;
        self.inflight.remove(&lock_key);
        result
    }

    async fn seed(
        &self,
        normalized: &str,
        original_name: &str,
        country: Option<&str>,
        admin_level: u8,
    ) -> anyhow::Result<Option<i64>> {
        let boundary = match self.boundary_provider.fetch_boundary(original_name, admin_level).await {
            Ok(b) => b,
            Err(e) => {
                warn!("🌱 seeding {original_name} failed: boundary lookup error: {e}");
                return Ok(None);
            }
        };

        if boundary.outer_ring.is_empty() {
            return Ok(None);
        }

        let n = boundary.outer_ring.len() as f64;
        let centroid_lat = boundary.outer_ring.iter().map(|(lat, _)| lat).sum::<f64>() / n;
        let centroid_lon = boundary.outer_ring.iter().map(|(_, lon)| lon).sum::<f64>() / n;
        let hash = geohash::encode(centroid_lat, centroid_lon, geohash::PRECISION_PLACE);
        // outer_ring is (lat, lon); wkt_polygon wants WKT's native (lon, lat) order.
        let lon_lat_ring: Vec<(f64, f64)> = boundary.outer_ring.iter().map(|&(lat, lon)| (lon, lat)).collect();
        let boundary_wkt = wkt::wkt_polygon(&lon_lat_ring);

        let metadata = json!({
            "osm_id": boundary.osm_id,
            "admin_level": admin_level,
            "population": boundary.population,
        });

        let place_id = self
            .relstore
            .upsert_place(
                normalized,
                PlaceType::City,
                country,
                None,
                (centroid_lat, centroid_lon),
                Some(&boundary_wkt),
                &hash,
                metadata,
            )
            .await?;

        info!("🌱 seeded place {original_name} -> place_id {place_id}");
        Ok(Some(place_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_arithmetic_mean_of_vertices() {
        let ring = vec![(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)];
        let n = ring.len() as f64;
        let lat = ring.iter().map(|(lat, _)| lat).sum::<f64>() / n;
        let lon = ring.iter().map(|(_, lon)| lon).sum::<f64>() / n;
        assert!((lat - 1.0).abs() < 1e-9);
        assert!((lon - 1.0).abs() < 1e-9);
    }
}
