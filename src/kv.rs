//! KVCache
//!
//! Thin typed façade over Redis: GET/MGET/SETEX/DEL/SCAN, atomic
//! `SET NX EX` (used as a distributed mutex), pipelines, and the GEO*
//! subcommands. Every method returns `Result<_, KvError>`; `CacheDegraded`
//! handling — falling back to RelStore on error — is the caller's job,
//! not this module's.

use crate::error::KvError;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Clone)]
pub struct KvCache {
    client: redis::Client,
}

impl KvCache {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, KvError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        match self.get_string(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn mget_strings(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        Ok(conn.mget(keys).await?)
    }

    pub async fn setex_json<T: Serialize>(
        &self,
        key: &str,
        ttl_seconds: i64,
        value: &T,
    ) -> Result<(), KvError> {
        let raw = serde_json::to_string(value)?;
        let mut conn = self.conn().await?;
        let ttl = ttl_seconds.max(1) as u64;
        let _: () = conn.set_ex(key, raw, ttl).await?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    pub async fn del_many(&self, keys: &[String]) -> Result<u64, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del(keys).await?)
    }

    /// Prefix scan via `SCAN` with a `MATCH prefix*` pattern. Returns
    /// matching keys; callers typically follow with an `MGET`.
    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn().await?;
        let pattern = format!("{prefix}*");
        let mut cursor = 0u64;
        let mut out = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            out.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(out)
    }

    /// Atomic create-if-absent with TTL. Used both as the singleflight
    /// distributed lease and (with a different key namespace) for any
    /// other mutex-on-a-key need.
    pub async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, KvError> {
        let mut conn = self.conn().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    // --- Geospatial subcommands ---

    pub async fn geoadd(&self, key: &str, lon: f64, lat: f64, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        let _: () = conn.geo_add(key, (lon, lat, member)).await?;
        Ok(())
    }

    pub async fn geoadd_many(&self, key: &str, members: &[(f64, f64, String)]) -> Result<(), KvError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let items: Vec<(f64, f64, String)> = members.to_vec();
        let _: () = conn.geo_add(key, items).await?;
        Ok(())
    }

    pub async fn geo_remove(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        let _: () = conn.zrem(key, member).await?;
        Ok(())
    }

    /// `GEORADIUS key lon lat radius_km km WITHDIST ASC COUNT limit`.
    pub async fn georadius(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, KvError> {
        let mut conn = self.conn().await?;
        let raw: Vec<(String, f64)> = redis::cmd("GEORADIUS")
            .arg(key)
            .arg(lon)
            .arg(lat)
            .arg(radius_km)
            .arg("km")
            .arg("WITHDIST")
            .arg("ASC")
            .arg("COUNT")
            .arg(limit)
            .query_async(&mut conn)
            .await?;
        Ok(raw)
    }

    pub async fn geopos(&self, key: &str, member: &str) -> Result<Option<(f64, f64)>, KvError> {
        let mut conn = self.conn().await?;
        let positions: Vec<Option<(f64, f64)>> = conn.geo_pos(key, member).await?;
        Ok(positions.into_iter().next().flatten())
    }

    pub async fn geodist_km(&self, key: &str, member_a: &str, member_b: &str) -> Result<Option<f64>, KvError> {
        let mut conn = self.conn().await?;
        let dist: Option<f64> = conn.geo_dist(key, member_a, member_b, redis::geo::Unit::Kilometers).await?;
        Ok(dist)
    }

    pub async fn ping(&self) -> bool {
        match self.conn().await {
            Ok(mut conn) => redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok(),
            Err(_) => false,
        }
    }
}
