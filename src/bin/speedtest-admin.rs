use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use speedtest::config::{Config, DatabaseBackend};
use speedtest::ids::created_at;
use speedtest::render::{FontSet, ResultRenderer};
use speedtest::storage::{PostgresStorage, RecordStore, SqliteStorage};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "speedtest-admin")]
#[command(about = "Speedtest results management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a stored test result
    Show {
        /// Result identifier (26-character ULID)
        id: String,
    },
    /// Render the result card for a stored test result
    Render {
        /// Result identifier (26-character ULID)
        id: String,
        /// Output PNG file
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn RecordStore> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Show { id } => {
            let record = storage
                .fetch_by_id(&id)
                .await
                .with_context(|| format!("could not load result '{id}'"))?;

            let created = created_at(&record.id)
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());

            println!("{:<12} {}", "ID", record.id);
            println!("{:<12} {}", "Created", created);
            println!("{:<12} {}", "IP", record.ip_address);
            println!("{:<12} {}", "User agent", record.user_agent);
            println!("{:<12} {}", "Language", record.language);
            println!("{}", "-".repeat(60));
            println!("{:<12} {} Mbps", "Download", record.download);
            println!("{:<12} {} Mbps", "Upload", record.upload);
            println!("{:<12} {} ms", "Ping", record.ping);
            println!("{:<12} {} ms", "Jitter", record.jitter);
            if !record.isp_info.is_empty() {
                println!("{}", "-".repeat(60));
                println!("ISP info: {}", record.isp_info);
            }
            if !record.extra.is_empty() {
                println!("Extra: {}", record.extra);
            }
            if !record.log.is_empty() {
                println!("Log:\n{}", record.log);
            }
        }
        Commands::Render { id, out } => {
            let record = storage
                .fetch_by_id(&id)
                .await
                .with_context(|| format!("could not load result '{id}'"))?;
            let fonts = FontSet::load(&config.render.light_font, &config.render.bold_font)?;
            let renderer = ResultRenderer::new(fonts, config.render.watermark.clone());

            let png = renderer.render(&record)?;
            tokio::fs::write(&out, &png)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("✓ Wrote result card for '{}' to {}", id, out.display());
        }
    }

    Ok(())
}
