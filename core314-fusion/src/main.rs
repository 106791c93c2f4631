//! core314-fusion - Fusion metric and learning-state service
//!
//! Computes weighted fusion scores from raw integration counters, derives
//! display-only learning state from the append-only history, and serves
//! the dashboard status API.

use anyhow::Result;
use clap::Parser;
use core314_common::api::auth::load_api_token;
use core314_common::config::{database_path, load_module_config, resolve_root_folder};
use core314_common::db::init::get_setting;
use core314_fusion::engine::select_engine;
use core314_fusion::{build_router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "core314-fusion", about = "Core314 fusion metric service")]
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
        "Starting Core314 Fusion (core314-fusion) v{} [{}] built {} ({})",
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

    let api_token = load_api_token(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load API token: {}", e))?;
    if api_token.is_empty() {
        info!("Dashboard API authentication disabled (empty token)");
    } else {
        info!("✓ Loaded dashboard API token");
    }

    let engine_url = get_setting(&pool, "fusion_engine_url", "").await?;
    let engine = select_engine(&engine_url)
        .map_err(|e| anyhow::anyhow!("Failed to construct engine adapter: {}", e))?;
    info!("Fusion engine adapter: {}", engine.engine_id());

    let config = load_module_config(&pool, "fusion-metrics").await?;
    let state = AppState::new(pool, api_token, engine);
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("core314-fusion listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
