//! Configuration management for the item correction service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with ICM_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::LedgerAccounts;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Ledger accounts the GL corrections post to
    pub accounts: LedgerAccounts,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("ICM_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let accounts = LedgerAccounts::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("accounts.stock_in_hand", accounts.stock_in_hand)?
            .set_default(
                "accounts.stock_received_not_billed",
                accounts.stock_received_not_billed,
            )?
            .set_default(
                "accounts.asset_received_not_billed",
                accounts.asset_received_not_billed,
            )?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ICM_ prefix)
            .add_source(
                Environment::with_prefix("ICM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject account setups the GL planner cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        shared::validate_ledger_accounts(&self.accounts)
            .map_err(|msg| ConfigError::Message(format!("accounts: {}", msg)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(accounts: LedgerAccounts) -> Config {
        Config {
            environment: "test".into(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/icm_test".into(),
                max_connections: 1,
                min_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
            },
            accounts,
        }
    }

    #[test]
    fn default_accounts_pass_validation() {
        assert!(config_with(LedgerAccounts::default()).validate().is_ok());
    }

    #[test]
    fn accounts_without_company_suffix_fail_validation() {
        let accounts = LedgerAccounts {
            stock_in_hand: "Stock In Hand".into(),
            ..LedgerAccounts::default()
        };
        let err = config_with(accounts).validate().unwrap_err();
        assert!(err.to_string().contains("accounts"));
    }
}
