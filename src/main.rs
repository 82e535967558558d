use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::model::Event;
use retention::{
    DeviceChange, DeviceInfoCache, DirectoryHandler, EventPurger, EventStore, InMemoryEventStore,
    LocalDeviceInfoCache, LocalDeviceStore, PurgeMetrics, PurgeScheduler, seed_device_info_cache,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "eventkeeper")]
#[command(about = "Eventkeeper - keeps device event storage bounded by retention policy")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, help = "JSON lines file of device directory changes applied at startup")]
    directory_feed: Option<PathBuf>,

    #[arg(long, help = "JSON lines file of events ingested at startup")]
    events: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for Commands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

/// Reads one JSON document per non-empty line. Malformed lines are logged
/// and skipped.
async fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut items = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping malformed line"
            ),
        }
    }
    Ok(items)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    let command = cli.command.unwrap_or_default();
    let Commands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    tracing::info!("Starting Eventkeeper");

    let device_infos = Arc::new(LocalDeviceInfoCache::default());
    let devices = Arc::new(LocalDeviceStore::default());
    let store = Arc::new(InMemoryEventStore::new(device_infos.clone()));
    let seeded = seed_device_info_cache(device_infos.as_ref(), store.as_ref())
        .await
        .context("Failed to seed device info cache")?;
    tracing::info!(device_infos = seeded, "Seeded device info cache");

    let cancel = CancellationToken::new();

    if let Some(path) = &cli.events {
        let events: Vec<Event> = read_json_lines(path).await?;
        let count = events.len();
        for event in events {
            store.add_event(event);
        }
        tracing::info!(
            events = count,
            readings = store.reading_count(),
            device_infos = device_infos.len(),
            "Ingested startup events"
        );
        for info in store.device_infos().await? {
            tracing::debug!(
                device_name = %info.device_name,
                source_name = %info.source_name,
                resource_name = %info.resource_name,
                readings = store.reading_count_by_device_info(info.id),
                "Channel readings"
            );
        }
    }

    let directory = DirectoryHandler::new(
        devices.clone(),
        device_infos.clone(),
        store.clone(),
        config.directory.purge_on_delete,
    );
    if let Some(path) = &cli.directory_feed {
        let changes: Vec<DeviceChange> = read_json_lines(path).await?;
        directory
            .run(futures::stream::iter(changes), cancel.clone())
            .await;
    }

    let purger = Arc::new(EventPurger::new(
        store.clone(),
        device_infos.clone(),
        devices.clone(),
        config.retention.clone(),
        PurgeMetrics::new(),
    ));
    let scheduler = PurgeScheduler::new(purger);

    if let Err(e) = scheduler.start(cancel.clone()) {
        tracing::error!(error = %e, "Event retention not started, continuing without it");
    }

    tracing::info!(retention_running = scheduler.is_running(), "Eventkeeper started");

    wait_for_shutdown_signal().await?;

    tracing::info!("Shutting down Eventkeeper");
    cancel.cancel();
    if let Some(handle) = scheduler.take_handle() {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Event retention loop did not exit cleanly");
        }
    }

    tracing::info!("Eventkeeper stopped");
    Ok(())
}
