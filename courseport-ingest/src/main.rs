//! courseport-ingest - Content Import Service
//!
//! Synchronizes tabular course content (course, lesson and question sheets)
//! into the content graph. Imports run as re-entrant background jobs driven
//! by an external scheduler through the HTTP API.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use courseport_common::config::ServiceConfig;
use courseport_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting courseport-ingest (content import) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::resolve();
    config
        .ensure_data_folder()
        .map_err(|e| anyhow::anyhow!("Failed to initialize data folder: {}", e))?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = courseport_ingest::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db_pool, config);
    let app = courseport_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
