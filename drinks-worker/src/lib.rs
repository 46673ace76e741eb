//! Drinks Worker - prints drink orders on a USB thermal printer
//!
//! # Overview
//!
//! Watches the shared order queue and prints a receipt for every pending
//! order on the attached USB receipt printer. Orders that arrive while no
//! printer is attached stay `pending` and are printed once one shows up.
//!
//! - **Orders** (`orders`): order model, `OrderStore` seam, Firestore and
//!   in-memory backends
//! - **Printing** (`printing`): device layer, discovery, printer session,
//!   receipt rendering, print job executor
//! - **Worker** (`worker`): finalize path, reconciler, live listener,
//!   hotplug monitor
//!
//! # Layout
//!
//! ```text
//! drinks-worker/src/
//! ├── core/          # config, background tasks
//! ├── orders/        # order queue
//! ├── printing/      # printer availability and print jobs
//! ├── worker/        # order processing
//! └── utils/         # logging, time
//! ```

pub mod core;
pub mod orders;
pub mod printing;
pub mod utils;
pub mod worker;

pub use core::{BackgroundTasks, Config, ConfigError, StoreKind, TaskKind};
pub use orders::{MemoryOrderStore, Order, OrderStatus, OrderStore, StoreError};
pub use printing::{PrintJobError, PrintJobExecutor, PrinterSession, UsbDeviceLayer};
pub use worker::{ReconcileReport, Worker, WorkerOptions};

pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, read the configuration and initialize logging
pub fn setup_environment() -> anyhow::Result<Config> {
    let _ = dotenv::dotenv();

    let config = Config::from_env()?;
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
     _      _       _
  __| |_ __(_)_ __ | | _____
 / _` | '__| | '_ \| |/ / __|
| (_| | |  | | | | |   <\__ \
 \__,_|_|  |_|_| |_|_|\_\___/
    "#
    );
}
