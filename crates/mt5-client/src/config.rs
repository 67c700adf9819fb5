//! Bridge configuration.
//!
//! Loaded from TOML. Every section is optional:
//!
//! ```toml
//! retry_count = 3
//!
//! [connection]
//! login = 123456
//! password = "..."
//! server = "Broker-Demo"
//!
//! [trading]
//! filling_mode = "IOC"
//! time_mode = "GTC"
//! deviation = 10
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use mt5_core::{ConnectionConfig, Mt5Error, Mt5Result, OrderFilling, OrderTime};

const CONFIG_ENV: &str = "MT5_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mt5.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Mt5Config {
    /// Terminal connection parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Connection retries after the first failed attempt.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Defaults for generated orders.
    #[serde(default)]
    pub trading: TradingConfig,
}

fn default_retry_count() -> u32 {
    3
}

impl Default for Mt5Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            retry_count: default_retry_count(),
            trading: TradingConfig::default(),
        }
    }
}

/// Order defaults applied by the trading layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TradingConfig {
    /// Filling policy for market and closing orders.
    #[serde(default)]
    pub filling_mode: OrderFilling,

    /// Lifetime policy for market and closing orders.
    #[serde(default)]
    pub time_mode: OrderTime,

    /// Maximum price deviation in points.
    #[serde(default)]
    pub deviation: Option<i64>,

    /// Expert identifier stamped on generated orders.
    #[serde(default)]
    pub magic: Option<i64>,
}

impl Mt5Config {
    /// Load from `$MT5_CONFIG`, falling back to `config/mt5.toml`.
    pub fn load() -> Mt5Result<Self> {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_or_default(config_path)
    }

    /// Load from `path`, or use defaults when no file exists there.
    pub fn load_or_default(path: impl AsRef<Path>) -> Mt5Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Mt5Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Mt5Error::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Mt5Result<Self> {
        toml::from_str(content).map_err(|e| Mt5Error::Config(format!("Failed to parse config: {e}")))
    }
}
