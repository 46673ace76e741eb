use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use drinks_printer::{HotplugWatcher, PrintError};
use drinks_worker::orders::FirestoreOrderStore;
use drinks_worker::{
    BackgroundTasks, Config, MemoryOrderStore, OrderStore, StoreKind, UsbDeviceLayer, Worker,
    WorkerOptions, print_banner, setup_environment,
};
use tokio::sync::mpsc;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn OrderStore>> {
    let store: Arc<dyn OrderStore> = match config.store {
        StoreKind::Firestore => Arc::new(
            FirestoreOrderStore::connect(config.firestore.clone())
                .context("failed to configure Firestore order store")?,
        ),
        StoreKind::Memory => {
            let store = match &config.memory_seed_file {
                Some(path) => MemoryOrderStore::from_json_file(path)?,
                None => {
                    tracing::warn!("Using an empty in-memory order store");
                    MemoryOrderStore::new()
                }
            };
            Arc::new(store)
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. dotenv, config, logging
    let config = setup_environment()?;
    print_banner();

    tracing::info!(
        environment = %config.environment,
        store = ?config.store,
        "🍹 Drinks worker starting..."
    );

    // 2. Order store and USB device layer
    let store = build_store(&config)?;
    let devices = Arc::new(UsbDeviceLayer::new(
        config.extra_vendor_ids.clone(),
        config.write_timeout,
    ));
    let worker = Worker::new(WorkerOptions::from(&config), store, devices);

    // 3. Hotplug notifications (optional)
    let (hotplug_tx, hotplug_rx) = mpsc::unbounded_channel();
    let (watcher, hotplug_rx) = match HotplugWatcher::spawn(hotplug_tx) {
        Ok(watcher) => (Some(watcher), Some(hotplug_rx)),
        Err(PrintError::HotplugUnsupported) => {
            tracing::warn!(
                "USB hotplug not supported on this platform; set RECONCILE_INTERVAL_SECS to pick up late printers"
            );
            (None, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to start USB hotplug watcher");
            (None, None)
        }
    };

    // 4. Startup discovery and catch-up
    if let Some(report) = worker.startup().await {
        tracing::info!(?report, "Startup reconciliation done");
    }

    // 5. Background tasks
    let mut tasks = BackgroundTasks::new();
    worker.spawn(&mut tasks, hotplug_rx);
    tasks.log_summary();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutdown requested");

    tasks.shutdown(SHUTDOWN_GRACE).await;
    if let Some(watcher) = watcher {
        watcher.stop();
    }

    tracing::info!("Drinks worker stopped");
    Ok(())
}
