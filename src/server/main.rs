//! Geo reference API server.
//!
//! Serves regions, airports and region geometries stored in Elasticsearch,
//! point/radius lookups, accommodation ingestion and IATA code resolution.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoapi::config::Config;
use geoapi::elasticsearch::{create_indices, EsClient, EsStore};
use geoapi::models::RegionType;
use geoapi::service::GeoService;

mod handlers;
use handlers::*;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Geo reference API server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Elasticsearch URL
    #[arg(long)]
    es_url: Option<String>,

    /// Prefix of the per-region-type indices
    #[arg(long)]
    index_prefix: Option<String>,

    /// Create missing indices before serving
    #[arg(long)]
    create_indices: bool,
}

impl Args {
    fn into_config(self) -> Result<(Config, bool)> {
        let mut config = match self.config {
            Some(ref path) => Config::load_from_file(path)?,
            None => Config::default(),
        };

        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(url) = self.es_url {
            config.elasticsearch.url = url;
        }
        if let Some(prefix) = self.index_prefix {
            config.elasticsearch.index_prefix = prefix;
        }

        Ok((config, self.create_indices))
    }
}

fn region_routes() -> Router<Arc<AppState>> {
    let mut router = Router::new();

    for &region_type in RegionType::all() {
        let Some(slug) = region_type.collection_slug() else {
            continue;
        };

        router = router
            .route(
                &format!("/v2/{}", slug),
                get(
                    move |state: State<Arc<AppState>>, params: Query<RegionListParams>| {
                        list_regions(region_type, state, params)
                    },
                ),
            )
            .route(
                &format!("/v2/{}/{{id}}", slug),
                get(move |state: State<Arc<AppState>>, id: Path<String>| {
                    get_region(region_type, state, id)
                }),
            );
    }

    router
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health-check", get(health_handler))
        .merge(region_routes())
        .route("/v2/airports", get(list_airports).post(create_airport).put(update_airport))
        .route("/v2/airports/{iata_code}", get(get_airport))
        .route("/v2/polygons", post(create_polygon).put(update_polygon))
        .route("/v2/polygons/{id}", get(get_polygon))
        .route("/v2/regions", post(create_region).put(update_region))
        .route("/v2/regions/nearby", get(nearby_regions))
        .route("/v2/intersections", get(intersections))
        .route("/v2/accommodations", post(insert_accommodation))
        .route("/intersections", get(intersections_by_type))
        .route("/entities", get(entities))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, create) = Args::parse().into_config()?;

    // Initialize logging; RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Geo API server");
    info!("Connecting to Elasticsearch at {}", config.elasticsearch.url);

    let es_client = EsClient::new(&config.elasticsearch.url)?;

    if !es_client.health_check().await? {
        anyhow::bail!("Elasticsearch cluster is not healthy");
    }

    let names = config.index_names();
    if create {
        create_indices(&es_client, &names, false).await?;
    }

    let polygons = es_client.doc_count(&names.polygons()).await.unwrap_or(0);
    info!("Connected, {} region geometries indexed", polygons);

    let store = Arc::new(EsStore::new(es_client, names));
    let state = Arc::new(AppState {
        service: GeoService::new(store.clone(), store),
    });

    let app = router(state);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
