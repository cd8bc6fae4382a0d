//! Weather-aware routing cache engine.
//!
//! Bootstraps the relational/spatial store, Redis, the graph and weather
//! components, and serves `PlanRoute` over HTTP — following
//! `sx9-cdn-data-fabric/src/main.rs`'s tracing-init / `AppState` /
//! `Router::new()...with_state()` / `axum::serve` shape.

use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weather_route_cache::api::{self, AppState};
use weather_route_cache::clients;
use weather_route_cache::clients::openmeteo::OpenMeteoClient;
use weather_route_cache::clients::osrm::OsrmClient;
use weather_route_cache::clients::overpass::OverpassClient;
use weather_route_cache::config::Config;
use weather_route_cache::geonode_cache::GeoNodeCache;
use weather_route_cache::graph_builder::GraphBuilder;
use weather_route_cache::graph_router::GraphRouter;
use weather_route_cache::kv::KvCache;
use weather_route_cache::orchestrator::Orchestrator;
use weather_route_cache::place_alerts::PlaceAlerts;
use weather_route_cache::relstore::RelStore;
use weather_route_cache::route_places_cache::RoutePlacesCache;
use weather_route_cache::seeder::Seeder;
use weather_route_cache::singleflight::Singleflight;
use weather_route_cache::tz;
use weather_route_cache::tz::ApproximateTzResolver;
use weather_route_cache::weather_cache::WeatherCache;
use weather_route_cache::weather_overlay::WeatherOverlay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🌦️  Starting weather-aware routing cache engine...");

    let config = Config::from_env();

    let relstore = RelStore::connect(&config.database_url, config.db_pool_min, config.db_pool_max)?;
    let kv = KvCache::new(&config.redis_url)?;

    let geo_node_cache = Arc::new(GeoNodeCache::new(kv.clone(), relstore.clone()));
    match relstore.all_node_coords().await {
        Ok(nodes) => geo_node_cache.load_all_nodes(&nodes).await?,
        Err(e) => info!("⚠️  skipping GeoNodeCache warm load: {e}"),
    }

    let osrm_client: Arc<dyn clients::osrm::RouteProvider> = Arc::new(OsrmClient::new(config.osrm_base_url.clone()));
    let openmeteo_client: Arc<dyn clients::openmeteo::ForecastProvider> =
        Arc::new(OpenMeteoClient::new(config.openmeteo_base_url.clone()));
    let overpass_client: Arc<dyn clients::overpass::BoundaryProvider> =
        Arc::new(OverpassClient::new(config.overpass_base_url.clone()));

    let tz_resolver: Arc<dyn tz::TzResolver> = Arc::new(ApproximateTzResolver);
    let weather_cache = Arc::new(WeatherCache::new(kv.clone(), relstore.clone(), tz_resolver, config.max_stale_seconds));
    let singleflight = Arc::new(Singleflight::new(kv.clone()));
    let route_places_cache = RoutePlacesCache::new(kv.clone(), relstore.clone());

    let graph_router = GraphRouter::new(relstore.clone());
    let graph_builder = GraphBuilder::new(
        relstore.clone(),
        osrm_client,
        geo_node_cache.clone(),
        config.split_point_tolerance,
        config.map_match_threshold_m,
        config.route_sample_interval_km,
    );
    let weather_overlay = WeatherOverlay::new(
        weather_cache.clone(),
        openmeteo_client,
        singleflight,
        config.parallel_weather_requests,
        config.h3_resolution,
    );
    let place_alerts = PlaceAlerts::new(relstore.clone(), weather_cache, route_places_cache);
    let seeder = Seeder::new(relstore.clone(), overpass_client);

    let orchestrator = Orchestrator::new(relstore.clone(), graph_router, graph_builder, weather_overlay, place_alerts, seeder);

    let state = Arc::new(AppState {
        orchestrator,
        geo_node_cache,
        relstore,
        kv,
    });

    let app = api::build_router(state);

    info!("🚀 listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
