use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;

use crate::carry_forward::background::parse_cron;
use crate::carry_forward::parse_utc_offset;

/// Application-level constants
pub const APP_NAME: &str = "ClinicSchedule";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Daily at 10:22, five-field form.
pub const DEFAULT_CARRY_FORWARD_CRON: &str = "22 10 * * *";

pub const DEFAULT_UTC_OFFSET: &str = "+00:00";

/// Default log filter, used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,clinic_schedule=debug,tower_http=info"
}

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Get the application data directory
/// ~/ClinicSchedule/ unless `CLINIC_DATA_DIR` says otherwise
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// A setting that is present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid UTC offset: {0:?}")]
    InvalidUtcOffset(String),

    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub carry_forward_cron: String,
    pub utc_offset: FixedOffset,
    pub carry_forward_enabled: bool,
}

impl AppConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get("CLINIC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let db_path = get("CLINIC_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("clinic.db"));

        let bind = get("CLINIC_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "CLINIC_BIND_ADDR",
                value: bind.clone(),
            })?;

        let carry_forward_cron = get("CARRY_FORWARD_CRON")
            .unwrap_or_else(|| DEFAULT_CARRY_FORWARD_CRON.to_string());
        parse_cron(&carry_forward_cron)?;

        let utc_offset = parse_utc_offset(
            &get("CARRY_FORWARD_UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string()),
        )?;

        let carry_forward_enabled = match get("CARRY_FORWARD_ENABLED") {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                key: "CARRY_FORWARD_ENABLED",
                value: v.clone(),
            })?,
        };

        Ok(Self {
            data_dir,
            db_path,
            bind_addr,
            carry_forward_cron,
            utc_offset,
            carry_forward_enabled,
        })
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            db_path = %self.db_path.display(),
            bind_addr = %self.bind_addr,
            cron = %self.carry_forward_cron,
            utc_offset = %self.utc_offset,
            carry_forward_enabled = self.carry_forward_enabled,
            "Config loaded"
        );
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
