//! Runtime configuration read from the environment (and `.env`).

use crate::catalog::SnapshotPolicy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub catalog: CatalogConfig,
    pub telemetry: TelemetryConfig,
}

/// Where the rate catalog lives and how fresh a snapshot must be.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub dir: PathBuf,
    pub max_snapshot_age: Option<Duration>,
}

impl CatalogConfig {
    pub fn snapshot_policy(&self) -> SnapshotPolicy {
        SnapshotPolicy {
            max_age: self.max_snapshot_age,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PAY_BIND_ADDR must be a socket address such as 127.0.0.1:3000, got '{value}'")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("PAY_SNAPSHOT_MAX_AGE_SECS must be a whole number of seconds, got '{value}'")]
    InvalidSnapshotAge {
        value: String,
        source: std::num::ParseIntError,
    },
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let dir = env::var("PAY_CATALOG_DIR").unwrap_or_else(|_| "rate_catalog".to_string());

        let bind_addr = env::var("PAY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr.clone(),
                source,
            })?;

        let max_snapshot_age = match env::var("PAY_SNAPSHOT_MAX_AGE_SECS") {
            Ok(value) => Some(Duration::from_secs(value.trim().parse::<u64>().map_err(
                |source| ConfigError::InvalidSnapshotAge {
                    value: value.clone(),
                    source,
                },
            )?)),
            Err(_) => None,
        };

        let log_level = env::var("PAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            bind_addr,
            catalog: CatalogConfig {
                dir: PathBuf::from(dir),
                max_snapshot_age,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("PAY_CATALOG_DIR");
        env::remove_var("PAY_BIND_ADDR");
        env::remove_var("PAY_SNAPSHOT_MAX_AGE_SECS");
        env::remove_var("PAY_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(
            config.bind_addr,
            "127.0.0.1:3000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.catalog.dir, PathBuf::from("rate_catalog"));
        assert!(config.catalog.max_snapshot_age.is_none());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_snapshot_age_and_rejects_garbage() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PAY_SNAPSHOT_MAX_AGE_SECS", "900");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.catalog.snapshot_policy().max_age,
            Some(Duration::from_secs(900))
        );

        env::set_var("PAY_SNAPSHOT_MAX_AGE_SECS", "soon");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidSnapshotAge { .. })
        ));
        reset_env();
    }
}
