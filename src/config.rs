//! Runtime configuration
//!
//! Loaded from environment variables with sensible defaults for every
//! knob, using plain `std::env::var(...).unwrap_or_else(...)` rather than
//! a config-file framework.

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub osrm_base_url: String,
    pub openmeteo_base_url: String,
    pub overpass_base_url: String,

    pub h3_resolution: u8,
    pub h3_weather_cache_ttl_seconds: i64,
    pub parallel_weather_requests: usize,
    pub max_stale_seconds: i64,
    pub split_point_tolerance: f64,
    pub map_match_threshold_m: f64,
    pub route_sample_interval_km: f64,
    pub overpass_batch_radius_m: f64,
    pub db_pool_min: usize,
    pub db_pool_max: usize,
    pub kv_pool_max: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:18100".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "host=localhost port=5432 user=postgres dbname=routing".to_string()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),
            osrm_base_url: std::env::var("OSRM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            openmeteo_base_url: std::env::var("OPENMETEO_BASE_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com".to_string()),
            overpass_base_url: std::env::var("OVERPASS_BASE_URL")
                .unwrap_or_else(|_| "https://overpass-api.de/api/interpreter".to_string()),

            h3_resolution: env_parse("H3_RESOLUTION", 7),
            h3_weather_cache_ttl_seconds: env_parse("H3_WEATHER_CACHE_TTL", 3600),
            parallel_weather_requests: env_parse("PARALLEL_WEATHER_REQUESTS", 40),
            max_stale_seconds: env_parse("MAX_STALE_SECONDS", 3600),
            split_point_tolerance: env_parse("SPLIT_POINT_TOLERANCE", 1.10),
            map_match_threshold_m: env_parse("MAP_MATCH_THRESHOLD_M", 50.0),
            route_sample_interval_km: env_parse("ROUTE_SAMPLE_INTERVAL_KM", 1.0),
            overpass_batch_radius_m: env_parse("OVERPASS_BATCH_RADIUS_M", 3000.0),
            db_pool_min: env_parse("DB_POOL_MIN", 5),
            db_pool_max: env_parse("DB_POOL_MAX", 20),
            kv_pool_max: env_parse("KV_POOL_MAX", 50),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
