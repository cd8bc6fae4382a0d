//! WeatherCache
//!
//! Per (H3 cell, forecast hour, model run) cache with dynamic TTL,
//! stale-while-revalidate, and model-refresh invalidation, addressed by a
//! prefix-scannable key (`weather:{geohash7}_{hour}_{model_run}`) so a
//! model refresh can delete every prior entry for a geohash in one scan.

use crate::geo::geohash;
use crate::kv::KvCache;
use crate::relstore::RelStore;
use crate::tz::TzResolver;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherPayload {
    pub temperature_c: f64,
    pub weather_code: i32,
}

#[derive(Debug, Clone)]
pub struct WeatherReading {
    pub payload: WeatherPayload,
    pub stale: bool,
}

pub struct WeatherCache {
    kv: KvCache,
    relstore: RelStore,
    tz_resolver: Arc<dyn TzResolver>,
    max_stale_seconds: i64,
}

impl WeatherCache {
    pub fn new(kv: KvCache, relstore: RelStore, tz_resolver: Arc<dyn TzResolver>, max_stale_seconds: i64) -> Self {
        Self {
            kv,
            relstore,
            tz_resolver,
            max_stale_seconds,
        }
    }

    pub fn cache_key(lat: f64, lon: f64, forecast_time: DateTime<Utc>, model_run_tag: &str) -> String {
        let hash = geohash::encode(lat, lon, geohash::PRECISION_NODE);
        let hour_bucket = forecast_time.format("%Y%m%d%H").to_string();
        format!("weather:{hash}_{hour_bucket}_{model_run_tag}")
    }

    fn sanitize_model_run(model_run: Option<&str>) -> String {
        match model_run {
            Some(raw) if !raw.is_empty() => raw
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect(),
            _ => "unknown".to_string(),
        }
    }

    /// Expires at the top of the next local hour; minimum 60 seconds.
    pub fn calculate_dynamic_ttl(&self, lat: f64, lon: f64, now: DateTime<Utc>) -> i64 {
        let tz = self.tz_resolver.tz_of(lat, lon);
        let local_now = now.with_timezone(&tz);
        let top_of_this_hour = local_now
            .date_naive()
            .and_hms_opt(local_now.hour(), 0, 0)
            .unwrap_or_else(|| local_now.naive_local());
        let top_of_next_hour = top_of_this_hour + ChronoDuration::hours(1);
        let next_hour_utc = tz
            .from_local_datetime(&top_of_next_hour)
            .single()
            .unwrap_or(local_now)
            .with_timezone(&Utc);
        let ttl = (next_hour_utc - now).num_seconds();
        ttl.max(60)
    }

    pub async fn get(
        &self,
        lat: f64,
        lon: f64,
        forecast_time: DateTime<Utc>,
        allow_stale: bool,
    ) -> anyhow::Result<Option<WeatherReading>> {
        let hash = geohash::encode(lat, lon, geohash::PRECISION_NODE);
        let hour_bucket = forecast_time.format("%Y%m%d%H").to_string();
        let prefix = format!("weather:{hash}_{hour_bucket}_");

        if let Ok(keys) = self.kv.scan_prefix(&prefix).await {
            if let Some(key) = keys.first() {
                if let Ok(Some(row)) = self.kv.get_json::<StoredWeather>(key).await {
                    return Ok(Some(self.evaluate_freshness(row, allow_stale)));
                }
            }
        }

        // KVCache miss/error: fall back to RelStore, warming KVCache on hit.
        if let Ok(Some(row)) = self.relstore.weather_cache_get_by_prefix(&prefix).await {
            let stored = StoredWeather {
                payload: serde_json::from_value(row.payload)?,
                created_at: row.created_at,
                expires_at: row.expires_at,
            };
            let ttl = (stored.expires_at - Utc::now()).num_seconds().max(60);
            let _ = self.kv.setex_json(&row.cache_key, ttl, &stored).await;
            return Ok(Some(self.evaluate_freshness(stored, allow_stale)));
        }

        Ok(None)
    }

    fn evaluate_freshness(&self, row: StoredWeather, allow_stale: bool) -> WeatherReading {
        let now = Utc::now();
        if now <= row.expires_at {
            return WeatherReading {
                payload: row.payload,
                stale: false,
            };
        }
        let age_past_expiry = (now - row.expires_at).num_seconds();
        WeatherReading {
            payload: row.payload,
            stale: allow_stale && age_past_expiry <= self.max_stale_seconds,
        }
    }

    pub async fn set(
        &self,
        lat: f64,
        lon: f64,
        forecast_time: DateTime<Utc>,
        payload: WeatherPayload,
        model_run: Option<&str>,
    ) -> anyhow::Result<()> {
        let model_run_tag = Self::sanitize_model_run(model_run);
        let hash = geohash::encode(lat, lon, geohash::PRECISION_NODE);
        let key = Self::cache_key(lat, lon, forecast_time, &model_run_tag);

        self.check_model_refresh(&hash, model_run).await?;

        let now = Utc::now();
        let ttl = self.calculate_dynamic_ttl(lat, lon, now);
        let expires_at = now + ChronoDuration::seconds(ttl);

        let stored = StoredWeather {
            payload: payload.clone(),
            created_at: now,
            expires_at,
        };
        self.kv.setex_json(&key, ttl, &stored).await?;

        let _ = self
            .relstore
            .weather_cache_upsert(
                &key,
                &hash,
                forecast_time,
                model_run,
                &serde_json::to_value(&payload)?,
                expires_at,
            )
            .await;
        Ok(())
    }

    /// When a new model run supersedes the last one seen for this
    /// geohash, every entry for it is invalidated before the new value
    /// is stored.
    async fn check_model_refresh(&self, geohash: &str, model_run: Option<&str>) -> anyhow::Result<()> {
        let prefix = format!("weather:{geohash}_");
        let Some(latest) = self.relstore.weather_cache_get_by_prefix(&prefix).await? else {
            return Ok(());
        };
        if latest.model_run_time.as_deref() != model_run {
            self.relstore.weather_cache_invalidate_h3(geohash).await?;
            if let Ok(keys) = self.kv.scan_prefix(&prefix).await {
                let _ = self.kv.del_many(&keys).await;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredWeather {
    payload: WeatherPayload,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tz::ApproximateTzResolver;

    #[test]
    fn cache_key_matches_documented_shape() {
        let t = Utc::now();
        let key = WeatherCache::cache_key(35.6892, 51.3890, t, "unknown");
        assert!(key.starts_with("weather:"));
        assert!(key.ends_with("_unknown"));
    }

    #[test]
    fn sanitize_model_run_defaults_to_unknown() {
        assert_eq!(WeatherCache::sanitize_model_run(None), "unknown");
        assert_eq!(WeatherCache::sanitize_model_run(Some("")), "unknown");
        assert_eq!(WeatherCache::sanitize_model_run(Some("2024-01-01T00:00Z")), "2024_01_01T00_00Z");
    }

    #[tokio::test]
    async fn dynamic_ttl_never_below_sixty_seconds() {
        let kv = KvCache::new("redis://127.0.0.1:1/").unwrap();
        let relstore_url = "host=127.0.0.1 port=1 user=postgres dbname=nonexistent";
        let relstore = RelStore::connect(relstore_url, 1, 1).unwrap();
        let resolver: Arc<dyn TzResolver> = Arc::new(ApproximateTzResolver);
        let cache = WeatherCache::new(kv, relstore, resolver, 3600);
        let ttl = cache.calculate_dynamic_ttl(35.6892, 51.3890, Utc::now());
        assert!(ttl >= 60);
    }
}
