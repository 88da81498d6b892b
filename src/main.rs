use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speedtest::api::{self, speedtest::garbage_chunk, AppState};
use speedtest::config::{Config, DatabaseBackend};
use speedtest::distance::Coordinates;
use speedtest::ids::IdGenerator;
use speedtest::isp::IspLookup;
use speedtest::redaction::Redactor;
use speedtest::render::{FontSet, ResultRenderer};
use speedtest::storage::{CachedStorage, PostgresStorage, RecordStore, SqliteStorage};
use speedtest::telemetry::TelemetryService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Fonts are loaded once; a missing font is a startup error
    let fonts = FontSet::load(&config.render.light_font, &config.render.bold_font)
        .context("failed to load result card fonts")?;
    info!(
        light = %config.render.light_font,
        bold = %config.render.bold_font,
        "Loaded result card fonts"
    );

    match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            let storage =
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?;
            run(storage, config, fonts).await
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            let storage =
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?;
            run(storage, config, fonts).await
        }
    }
}

async fn run<S: RecordStore + 'static>(storage: S, config: Config, fonts: FontSet) -> Result<()> {
    let storage = CachedStorage::new(storage, config.telemetry.cache_entries);

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let isp = if config.geo.ipinfo_enabled {
        Some(IspLookup::new(
            config.geo.ipinfo_url.clone(),
            config.geo.ipinfo_api_key.clone(),
        )?)
    } else {
        None
    };

    let server_location = resolve_server_location(&config, isp.as_ref()).await;

    if config.telemetry.redact_ip_addresses {
        info!("IP address redaction is enabled");
    }

    let telemetry = TelemetryService::new(
        Arc::new(storage),
        Arc::new(IdGenerator::new()),
        Redactor::new(config.telemetry.redact_ip_addresses),
        Arc::new(ResultRenderer::new(fonts, config.render.watermark.clone())),
    );

    let state = AppState {
        telemetry,
        isp,
        distance_unit: config.geo.distance_unit,
        server_location,
        garbage: garbage_chunk(),
        garbage_chunks: config.telemetry.garbage_chunks,
    };

    let static_dir = config.frontend.static_dir.as_ref().map(PathBuf::from);
    match &static_dir {
        Some(dir) => info!("Serving speedtest client from directory: {}", dir.display()),
        None => info!("No STATIC_DIR configured; only API endpoints are served"),
    }

    let router = api::create_router(state, static_dir, config.server.enable_cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Speedtest server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn resolve_server_location(config: &Config, isp: Option<&IspLookup>) -> Option<Coordinates> {
    if let Some(location) = config.geo.server_location {
        info!(lat = location.lat, lng = location.lng, "Using configured server location");
        return Some(location);
    }

    let location = isp?.server_location().await;
    match location {
        Some(location) => {
            info!(lat = location.lat, lng = location.lng, "Resolved server location")
        }
        None => warn!("Server location unknown; distances will be omitted"),
    }
    location
}
