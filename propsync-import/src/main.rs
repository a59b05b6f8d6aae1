//! propsync-import - WordPress property import microservice
//!
//! Reads a legacy WPL SQL export, maps each listing into the review catalog
//! and tracks progress in a resumable checkpoint. Exposes HTTP REST + SSE
//! for operators.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use propsync_common::events::EventBus;
use propsync_import::AppState;

#[derive(Debug, Parser)]
#[command(name = "propsync-import", version, about = "WPL property import service")]
struct Args {
    /// Root folder for the database (overrides env and config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to listen on
    #[arg(long, default_value_t = 5740, env = "PROPSYNC_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting propsync-import microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder (CLI → env → TOML → OS default)
    let root_folder = propsync_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "PROPSYNC_ROOT_FOLDER",
    )?;
    propsync_common::config::ensure_root_folder(&root_folder)?;
    info!("Root folder: {}", root_folder.display());

    // Step 2: Open or create the database
    let db_path = propsync_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = propsync_import::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 3: Resolve service settings (Database → ENV → TOML)
    let toml_config = propsync_common::config::default_config_path()
        .and_then(|path| propsync_common::config::load_toml_config(&path))
        .unwrap_or_default();
    let import_config = propsync_import::config::resolve_import_config(&db_pool, &toml_config).await?;
    info!(
        batch_size = import_config.batch_size,
        legacy_photo_host = %import_config.legacy_photo_host,
        "Import configuration resolved"
    );

    // Step 4: Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let state = AppState::new(db_pool, event_bus, import_config);
    let app = propsync_import::build_router(state);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
