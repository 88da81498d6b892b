use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::distance::{parse_location_or_origin, Coordinates, DistanceUnit};
use crate::isp::DEFAULT_IPINFO_URL;
use crate::render::DEFAULT_WATERMARK;

/// Upper bound on 1 MiB chunks a single `/garbage` response may stream.
pub const MAX_GARBAGE_CHUNKS: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub render: RenderConfig,
    pub geo: GeoConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Replace client addresses and hostnames before anything is stored.
    pub redact_ip_addresses: bool,
    /// Default number of 1 MiB chunks served by `/garbage`.
    pub garbage_chunks: usize,
    /// Stored records kept in memory for repeated result card requests.
    pub cache_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub light_font: String,
    pub bold_font: String,
    pub watermark: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub distance_unit: DistanceUnit,
    /// Fixed server coordinates; looked up at startup when absent and
    /// ipinfo lookups are enabled.
    pub server_location: Option<Coordinates>,
    pub ipinfo_enabled: bool,
    pub ipinfo_url: String,
    pub ipinfo_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Path to directory containing the speedtest web client
    pub static_dir: Option<String>,
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let backend = match get("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };
        let database_url = get("DATABASE_URL", "sqlite://./speedtest.db");
        let max_connections = get("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = get("LISTEN_HOST", "0.0.0.0");
        let port = get("LISTEN_PORT", "8989")
            .parse::<u16>()
            .context("LISTEN_PORT must be a valid port number")?;
        let enable_cors = var("ENABLE_CORS").is_some_and(|v| parse_flag(&v));

        let redact_ip_addresses = var("REDACT_IP_ADDRESSES").is_some_and(|v| parse_flag(&v));
        let garbage_chunks = get("CHUNKS", "4")
            .parse::<usize>()
            .context("CHUNKS must be a positive integer")?;
        if garbage_chunks > MAX_GARBAGE_CHUNKS {
            anyhow::bail!("CHUNKS can't be more than {MAX_GARBAGE_CHUNKS}");
        }
        let cache_entries = get("RESULT_CACHE_ENTRIES", "1000")
            .parse::<u64>()
            .context("RESULT_CACHE_ENTRIES must be a positive integer")?;

        let distance_unit = match var("DISTANCE_UNIT") {
            None => DistanceUnit::default(),
            Some(unit) => unit.parse().unwrap_or_else(|err| {
                tracing::warn!("{err}, falling back to miles. Supported values: mi, km, NM");
                DistanceUnit::default()
            }),
        };
        let server_location = var("SERVER_LOCATION").map(|loc| parse_location_or_origin(&loc));
        let ipinfo_enabled = var("IPINFO_ENABLED").is_some_and(|v| parse_flag(&v));
        let ipinfo_url = get("IPINFO_URL", DEFAULT_IPINFO_URL);
        let ipinfo_api_key = var("IPINFO_API_KEY").filter(|k| !k.is_empty());

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig {
                host,
                port,
                enable_cors,
            },
            telemetry: TelemetryConfig {
                redact_ip_addresses,
                garbage_chunks,
                cache_entries,
            },
            render: RenderConfig {
                light_font: get("FONT_LIGHT_PATH", "assets/NotoSansDisplay-Light.ttf"),
                bold_font: get("FONT_BOLD_PATH", "assets/NotoSansDisplay-Medium.ttf"),
                watermark: get("WATERMARK", DEFAULT_WATERMARK),
            },
            geo: GeoConfig {
                distance_unit,
                server_location,
                ipinfo_enabled,
                ipinfo_url,
                ipinfo_api_key,
            },
            frontend: FrontendConfig {
                static_dir: var("STATIC_DIR"),
            },
        })
    }
}
