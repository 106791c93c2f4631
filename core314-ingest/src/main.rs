//! core314-ingest - Signal ingestion service
//!
//! Receives vendor webhooks (Slack, Monday) with HMAC verification and runs
//! operator-triggered pollers (Monday, QuickBooks), turning raw vendor
//! signals into normalized integration events.

use anyhow::Result;
use clap::Parser;
use core314_common::config::{database_path, load_module_config, resolve_root_folder};
use core314_common::db::init::get_setting;
use core314_ingest::poller::{monday::MondayClient, quickbooks::QuickBooksClient};
use core314_ingest::{build_router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "core314-ingest", about = "Core314 signal ingestion service")]
struct Cli {
    /// Root data folder (overrides CORE314_ROOT and config file)
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Core314 Ingest (core314-ingest) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();
    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), "CORE314_ROOT")?;
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = core314_common::db::init_database(&db_path).await?;

    let timeout_secs = get_setting(&pool, "vendor_request_timeout_seconds", "30")
        .await?
        .parse::<u64>()
        .unwrap_or(30);
    let monday = MondayClient::new(timeout_secs)
        .map_err(|e| anyhow::anyhow!("Failed to construct Monday client: {}", e))?;
    let quickbooks = QuickBooksClient::new(timeout_secs)
        .map_err(|e| anyhow::anyhow!("Failed to construct QuickBooks client: {}", e))?;

    let config = load_module_config(&pool, "signal-ingest").await?;
    let state = AppState::new(pool, monday, quickbooks);
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("core314-ingest listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
