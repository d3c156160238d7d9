use std::sync::Arc;

use clap::Parser;
use netwatch::{
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    monitor::{IcmpProber, LifecycleController, SubscriberRegistry},
    storage::{DeviceStore, MemoryDirectory},
};
use tracing::{info, instrument, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("netwatch", LevelFilter::DEBUG),
        ("netwatch_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    }
    .apply_env()?;
    config.validate()?;

    let store = open_store(config.storage.clone().unwrap_or_default()).await?;

    let registry = Arc::new(SubscriberRegistry::new());
    let lifecycle = Arc::new(LifecycleController::new(
        store.clone(),
        Arc::new(IcmpProber::from_config(&config.monitor)),
        registry.clone(),
        config.monitor.clone(),
    ));

    let api_config: ApiConfig = config.api.clone().unwrap_or_default().into();
    let addr = spawn_api_server(api_config, ApiState::new(store, lifecycle.clone())).await?;
    info!("NetWatch listening on http://{addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    lifecycle.shutdown().await;
    let closed = registry.close_all().await;
    info!("closed {closed} subscriber(s)");

    Ok(())
}

#[instrument(skip_all)]
async fn open_store(storage: StorageConfig) -> anyhow::Result<Arc<dyn DeviceStore>> {
    match storage {
        StorageConfig::None => {
            warn!("no storage backend configured, devices are kept in memory only");
            Ok(Arc::new(MemoryDirectory::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let directory = netwatch::storage::sqlite::SqliteDirectory::new(&path).await?;
            info!("using SQLite storage at {}", directory.db_path());
            Ok(Arc::new(directory))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("SQLite storage requested but the storage-sqlite feature is disabled")
        }
    }
}
