use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use drinks_printer::CodePage;
use thiserror::Error;

use crate::orders::FirestoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Firestore bills per read; polling faster than this gains nothing
const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Narrowest paper that still fits a double-size drink name
const MIN_PAPER_WIDTH: usize = 16;

/// Which order store backend the worker talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Firestore,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreKind::Firestore),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("expected firestore or memory, got {}", other)),
        }
    }
}

/// Worker configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ENVIRONMENT | development | development \| staging \| production |
/// | LOG_LEVEL | info | default log filter when `RUST_LOG` is unset |
/// | LOG_JSON | false (true in production) | JSON console logs |
/// | LOG_DIR | - | directory for rotating log files |
/// | ORDER_STORE | firestore | firestore \| memory |
/// | FIREBASE_PROJECT_ID | from credentials | Firestore project |
/// | GOOGLE_APPLICATION_CREDENTIALS | ./serviceAccountKey.json | service account key file |
/// | FIRESTORE_EMULATOR_HOST | - | `host:port` of a local emulator |
/// | ORDERS_COLLECTION | orders | collection holding orders |
/// | ORDER_POLL_INTERVAL_MS | 2000 | change-stream poll interval, at least 100 |
/// | MEMORY_SEED_FILE | - | JSON array of orders for the memory store |
/// | PRINTER_SETTLE_DELAY_MS | 1000 | wait after a USB attach before re-probing |
/// | PRINTER_PAPER_WIDTH | 48 | characters per line (32 for 58mm paper), at least 16 |
/// | PRINTER_CODE_PAGE | wpc1252 | wpc1252 \| gbk |
/// | PRINTER_WRITE_TIMEOUT_MS | 5000 | USB bulk write timeout |
/// | PRINTER_EXTRA_VENDOR_IDS | - | extra printer vendor ids, comma-separated hex |
/// | RECEIPT_PLACEHOLDER_NAME | Guest | printed when an order has no client name |
/// | RECONCILE_INTERVAL_SECS | 0 | periodic reconciliation, 0 disables |
/// | FINALIZE_RETRIES | 3 | attempts to record `done` after a print |
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,

    pub store: StoreKind,
    pub firestore: FirestoreConfig,
    pub memory_seed_file: Option<PathBuf>,

    pub settle_delay: Duration,
    pub paper_width: usize,
    pub code_page: CodePage,
    pub write_timeout: Duration,
    pub extra_vendor_ids: Vec<u16>,
    pub placeholder_name: String,

    /// `None` disables the periodic reconciliation pass
    pub reconcile_interval: Option<Duration>,
    pub finalize_retries: u32,
}

/// Environment lookup, injectable for tests
trait Source {
    fn get(&self, name: &str) -> Option<String>;
}

struct ProcessEnv;

impl Source for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

fn parse_or<T: FromStr>(
    src: &dyn Source,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match src.get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Like [`parse_or`], rejecting values below `min`
fn parse_at_least<T>(
    src: &dyn Source,
    name: &'static str,
    default: T,
    min: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let value = parse_or(src, name, default)?;
    if value < min {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be at least {}", min),
        });
    }
    Ok(value)
}

fn parse_vendor_ids(src: &dyn Source) -> Result<Vec<u16>, ConfigError> {
    let Some(raw) = src.get("PRINTER_EXTRA_VENDOR_IDS") else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let hex = s.trim_start_matches("0x").trim_start_matches("0X");
            u16::from_str_radix(hex, 16).map_err(|e| ConfigError::Invalid {
                name: "PRINTER_EXTRA_VENDOR_IDS",
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    fn from_source(src: &dyn Source) -> Result<Self, ConfigError> {
        let environment = src.get("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let production = environment == "production";

        let reconcile_secs: u64 = parse_or(src, "RECONCILE_INTERVAL_SECS", 0)?;

        Ok(Self {
            log_level: src.get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: parse_or(src, "LOG_JSON", production)?,
            log_dir: src.get("LOG_DIR"),

            store: parse_or(src, "ORDER_STORE", StoreKind::Firestore)?,
            firestore: FirestoreConfig {
                project_id: src.get("FIREBASE_PROJECT_ID"),
                collection: src
                    .get("ORDERS_COLLECTION")
                    .unwrap_or_else(|| "orders".into()),
                credentials_path: src
                    .get("GOOGLE_APPLICATION_CREDENTIALS")
                    .unwrap_or_else(|| "./serviceAccountKey.json".into())
                    .into(),
                emulator_host: src.get("FIRESTORE_EMULATOR_HOST"),
                poll_interval: Duration::from_millis(parse_at_least(
                    src,
                    "ORDER_POLL_INTERVAL_MS",
                    2000,
                    MIN_POLL_INTERVAL_MS,
                )?),
            },
            memory_seed_file: src.get("MEMORY_SEED_FILE").map(PathBuf::from),

            settle_delay: Duration::from_millis(parse_or(src, "PRINTER_SETTLE_DELAY_MS", 1000)?),
            paper_width: parse_at_least(src, "PRINTER_PAPER_WIDTH", 48, MIN_PAPER_WIDTH)?,
            code_page: parse_or(src, "PRINTER_CODE_PAGE", CodePage::Wpc1252)?,
            write_timeout: Duration::from_millis(parse_or(
                src,
                "PRINTER_WRITE_TIMEOUT_MS",
                5000,
            )?),
            extra_vendor_ids: parse_vendor_ids(src)?,
            placeholder_name: src
                .get("RECEIPT_PLACEHOLDER_NAME")
                .unwrap_or_else(|| "Guest".into()),

            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            finalize_retries: parse_or(src, "FINALIZE_RETRIES", 3)?,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<&'static str, &'static str>);

    impl Source for MapSource {
        fn get(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|v| v.to_string())
        }
    }

    fn load(vars: &[(&'static str, &'static str)]) -> Result<Config, ConfigError> {
        Config::from_source(&MapSource(vars.iter().copied().collect()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.store, StoreKind::Firestore);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.paper_width, 48);
        assert_eq!(config.code_page, CodePage::Wpc1252);
        assert_eq!(config.placeholder_name, "Guest");
        assert_eq!(config.firestore.collection, "orders");
        assert_eq!(config.reconcile_interval, None);
        assert_eq!(config.finalize_retries, 3);
        assert!(!config.log_json);
    }

    #[test]
    fn test_production_defaults_to_json_logs() {
        let config = load(&[("ENVIRONMENT", "production")]).unwrap();
        assert!(config.is_production());
        assert!(config.log_json);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ORDER_STORE", "memory"),
            ("PRINTER_SETTLE_DELAY_MS", "250"),
            ("PRINTER_CODE_PAGE", "gbk"),
            ("PRINTER_EXTRA_VENDOR_IDS", "0x1fc9, 28e9"),
            ("RECONCILE_INTERVAL_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.settle_delay, Duration::from_millis(250));
        assert_eq!(config.code_page, CodePage::Gbk);
        assert_eq!(config.extra_vendor_ids, vec![0x1fc9, 0x28e9]);
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("PRINTER_PAPER_WIDTH", "wide")]).is_err());
        assert!(load(&[("ORDER_STORE", "postgres")]).is_err());
        assert!(load(&[("PRINTER_EXTRA_VENDOR_IDS", "zz")]).is_err());
    }

    #[test]
    fn test_values_below_minimum() {
        for vars in [
            [("ORDER_POLL_INTERVAL_MS", "0")],
            [("ORDER_POLL_INTERVAL_MS", "50")],
            [("PRINTER_PAPER_WIDTH", "0")],
            [("PRINTER_PAPER_WIDTH", "1")],
        ] {
            assert!(
                matches!(load(&vars), Err(ConfigError::Invalid { .. })),
                "{:?}",
                vars
            );
        }

        let config = load(&[
            ("ORDER_POLL_INTERVAL_MS", "100"),
            ("PRINTER_PAPER_WIDTH", "32"),
        ])
        .unwrap();
        assert_eq!(config.firestore.poll_interval, Duration::from_millis(100));
        assert_eq!(config.paper_width, 32);
    }
}
