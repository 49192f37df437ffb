//! Application configuration
//!
//! Loaded from TOML. Every section falls back to its defaults, so a
//! partial file (or none at all) is a valid configuration.
//!
//! ```toml
//! [server]
//! api_port = 8080
//!
//! [payment]
//! server_key = "SB-Mid-server-xxxx"
//! expiry_duration = 5
//! expiry_unit = "minute"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// `~/.config/ferry-booking/config.toml`, or `./config.toml` when no
/// config directory can be determined
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("ferry-booking").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub logging: LoggingConfig,
    pub payment: PaymentConfig,
    pub booking: BookingConfig,
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Write the config, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./ferry.db?mode=rwc".to_string(),
            max_connections: 10,
        }
    }
}

impl DatabaseSection {
    pub fn connection_url(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error (or any EnvFilter directive)
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryUnit {
    Minute,
    Hour,
}

impl ExpiryUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }
}

/// Midtrans credentials, endpoints and reconciliation timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub server_key: String,
    pub client_key: String,
    pub is_production: bool,
    pub sandbox_snap_url: String,
    pub production_snap_url: String,
    pub sandbox_api_url: String,
    pub production_api_url: String,
    /// Payment window length in `expiry_unit`s; also the booking hold time
    pub expiry_duration: u32,
    pub expiry_unit: ExpiryUnit,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            client_key: String::new(),
            is_production: false,
            sandbox_snap_url: "https://app.sandbox.midtrans.com".to_string(),
            production_snap_url: "https://app.midtrans.com".to_string(),
            sandbox_api_url: "https://api.sandbox.midtrans.com".to_string(),
            production_api_url: "https://api.midtrans.com".to_string(),
            expiry_duration: 5,
            expiry_unit: ExpiryUnit::Minute,
            request_timeout_secs: 10,
            poll_interval_secs: 60,
            max_poll_attempts: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl PaymentConfig {
    /// Booking hold time. Bookings and the gateway session share it.
    pub fn expiry_window(&self) -> chrono::Duration {
        let n = i64::from(self.expiry_duration);
        match self.expiry_unit {
            ExpiryUnit::Minute => chrono::Duration::minutes(n),
            ExpiryUnit::Hour => chrono::Duration::hours(n),
        }
    }

    pub fn snap_base_url(&self) -> &str {
        if self.is_production {
            &self.production_snap_url
        } else {
            &self.sandbox_snap_url
        }
    }

    pub fn api_base_url(&self) -> &str {
        if self.is_production {
            &self.production_api_url
        } else {
            &self.sandbox_api_url
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub full_refund_marks_booking_refunded: bool,
    pub code_prefix: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            full_refund_marks_booking_refunded: true,
            code_prefix: "FRY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub interval_secs: u64,
    pub batch_size: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_size: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            api_port = 9090

            [payment]
            server_key = "SB-Mid-server-abc"
            expiry_duration = 2
            expiry_unit = "hour"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.api_port, 9090);
        assert_eq!(cfg.server.api_host, "0.0.0.0");
        assert_eq!(cfg.payment.server_key, "SB-Mid-server-abc");
        assert_eq!(cfg.payment.expiry_window(), chrono::Duration::hours(2));
        assert_eq!(cfg.payment.max_poll_attempts, 10);
        assert_eq!(cfg.booking.code_prefix, "FRY");
        assert_eq!(cfg.database.url, "sqlite://./ferry.db?mode=rwc");
    }

    #[test]
    fn default_expiry_is_five_minutes_in_sandbox() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.payment.expiry_window(), chrono::Duration::minutes(5));
        assert_eq!(cfg.payment.api_base_url(), "https://api.sandbox.midtrans.com");
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("ferry-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.sweeper.batch_size = 50;
        cfg.logging.format = "json".into();
        cfg.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.sweeper.batch_size, 50);
        assert_eq!(loaded.logging.format, "json");
        std::fs::remove_dir_all(&dir).ok();
    }
}
