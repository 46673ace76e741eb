//! Worker core: configuration and background task management

pub mod config;
pub mod tasks;

pub use config::{Config, ConfigError, StoreKind};
pub use tasks::{BackgroundTasks, TaskKind};
