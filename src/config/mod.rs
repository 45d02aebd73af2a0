use crate::core::money;
use crate::core::{AppError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

pub mod database;
pub mod server;

pub use database::{DatabaseConfig, StoreBackend};
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Tax rate applied to invoices created without one
    pub default_tax_rate: Decimal,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(AppError::Configuration(format!("Invalid LOG_FORMAT: {}", s))),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT")
                    .unwrap_or_else(|_| "pretty".to_string())
                    .parse()?,
                default_tax_rate: env::var("DEFAULT_TAX_RATE")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .map_err(|_| AppError::Configuration("Invalid DEFAULT_TAX_RATE".to_string()))?,
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        money::validate_tax_rate(self.app.default_tax_rate).map_err(|e| {
            AppError::Configuration(format!("DEFAULT_TAX_RATE rejected: {}", e))
        })?;

        self.database.validate()?;
        self.server.validate()?;

        Ok(())
    }
}
