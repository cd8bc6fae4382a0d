use super::{RelStore, RoutePlaceSummary, RoutePlacesEntry, WeatherCacheRow};
use anyhow::Context;
use chrono::{DateTime, Utc};

impl RelStore {
    pub async fn weather_cache_get_by_prefix(&self, prefix: &str) -> anyhow::Result<Option<WeatherCacheRow>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let pattern = format!("{prefix}%");
        let row = client
            .query_opt(
                "SELECT cache_key, geohash, forecast_hour, model_run_time, weather_data, created_at, expires_at \
                 FROM weather_cache WHERE cache_key LIKE $1 \
                 ORDER BY created_at DESC LIMIT 1",
                &[&pattern],
            )
            .await?;
        Ok(row.map(|r| WeatherCacheRow {
            cache_key: r.get(0),
            h3_index: r.get(1),
            forecast_hour: r.get(2),
            model_run_time: r.get(3),
            payload: r.get(4),
            created_at: r.get(5),
            expires_at: r.get(6),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn weather_cache_upsert(
        &self,
        cache_key: &str,
        h3_index: &str,
        forecast_hour: DateTime<Utc>,
        model_run: Option<&str>,
        payload: &serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        client
            .execute(
                "INSERT INTO weather_cache \
                 (cache_key, geohash, forecast_hour, model_run_time, weather_data, expires_at, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, now()) \
                 ON CONFLICT (cache_key) DO UPDATE SET \
                   weather_data = EXCLUDED.weather_data, \
                   model_run_time = EXCLUDED.model_run_time, \
                   expires_at = EXCLUDED.expires_at, \
                   created_at = now()",
                &[&cache_key, &h3_index, &forecast_hour, &model_run, &payload, &expires_at],
            )
            .await?;
        Ok(())
    }

    pub async fn weather_cache_invalidate_h3(&self, h3_index: &str) -> anyhow::Result<u64> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let count = client
            .execute("DELETE FROM weather_cache WHERE geohash = $1", &[&h3_index])
            .await?;
        Ok(count)
    }

    pub async fn route_places_get(&self, src: i64, dst: i64) -> anyhow::Result<Option<RoutePlacesEntry>> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let row = client
            .query_opt(
                "SELECT source_place_id, target_place_id, places_data, total_places, updated_at \
                 FROM route_places_cache WHERE source_place_id = $1 AND target_place_id = $2",
                &[&src, &dst],
            )
            .await?;
        let Some(row) = row else { return Ok(None) };
        let places_json: serde_json::Value = row.get(2);
        let places: Vec<RoutePlaceSummary> = serde_json::from_value(places_json).unwrap_or_default();
        Ok(Some(RoutePlacesEntry {
            source_place_id: row.get(0),
            target_place_id: row.get(1),
            places,
            total_places: row.get::<_, i32>(3) as usize,
            updated_at: row.get(4),
        }))
    }

    pub async fn route_places_upsert(
        &self,
        src: i64,
        dst: i64,
        places: &[RoutePlaceSummary],
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await.context("acquiring pg connection")?;
        let places_json = serde_json::to_value(places)?;
        client
            .execute(
                "INSERT INTO route_places_cache \
                 (source_place_id, target_place_id, places_data, total_places, updated_at) \
                 VALUES ($1, $2, $3, $4, now()) \
                 ON CONFLICT (source_place_id, target_place_id) DO UPDATE SET \
                   places_data = EXCLUDED.places_data, \
                   total_places = EXCLUDED.total_places, \
                   updated_at = now()",
                &[&src, &dst, &places_json, &(places.len() as i32)],
            )
            .await?;
        Ok(())
    }
}
