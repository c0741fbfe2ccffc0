//! # Service Configuration
//!
//! Configuration for the API server.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPDESK_PORT=8080                                                 │
//! │     SHOPDESK_JWT_SECRET=...                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/shopdesk/shopdesk.toml (Linux)                           │
//! │     ~/Library/Application Support/com.shopdesk.shopdesk/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "./shopdesk.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_lifetime_secs = 43200
//!
//! [business]
//! credit_term_days = 30
//! storefront_delivery_fee_cents = 250
//!
//! [logging]
//! filter = "info,shopdesk=debug,sqlx=warn"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shopdesk_core::validation::{MAX_AMOUNT_CENTS, MAX_UNIT_QUANTITY};
use shopdesk_core::{BusinessRules, DEFAULT_CREDIT_TERM_DAYS, MAX_LINE_QUANTITY, MAX_SALE_LINES};
use tracing::{debug, info};

/// Used when neither the file nor the environment sets a secret.
const DEV_JWT_SECRET: &str = "shopdesk-dev-secret-change-in-production";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file; created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: PathBuf::from("./shopdesk.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 12 hours).
    pub token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: 12 * 3600,
        }
    }
}

/// Business limits handed to the repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessConfig {
    pub credit_term_days: i64,
    pub storefront_delivery_fee_cents: i64,
    pub max_sale_lines: usize,
    pub max_line_quantity: i64,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        BusinessConfig {
            credit_term_days: DEFAULT_CREDIT_TERM_DAYS,
            storefront_delivery_fee_cents: 0,
            max_sale_lines: MAX_SALE_LINES,
            max_line_quantity: MAX_LINE_QUANTITY,
        }
    }
}

impl BusinessConfig {
    pub fn rules(&self) -> BusinessRules {
        BusinessRules {
            credit_term_days: self.credit_term_days,
            storefront_delivery_fee_cents: self.storefront_delivery_fee_cents,
            max_sale_lines: self.max_sale_lines,
            max_line_quantity: self.max_line_quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info,shopdesk=debug,sqlx=warn".to_string(),
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Complete API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub auth: AuthConfig,
    pub business: BusinessConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from TOML file (if it exists)
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file; missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies `SHOPDESK_*` overrides read through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(addr) = var("SHOPDESK_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = var("SHOPDESK_PORT") {
            self.server.port = parse_env("SHOPDESK_PORT", &port)?;
        }
        if let Some(path) = var("SHOPDESK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = var("SHOPDESK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(days) = var("SHOPDESK_CREDIT_TERM_DAYS") {
            self.business.credit_term_days = parse_env("SHOPDESK_CREDIT_TERM_DAYS", &days)?;
        }
        if let Some(fee) = var("SHOPDESK_DELIVERY_FEE_CENTS") {
            self.business.storefront_delivery_fee_cents = parse_env("SHOPDESK_DELIVERY_FEE_CENTS", &fee)?;
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.token_lifetime_secs".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue("server.port".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }
        if !(1..=365).contains(&self.business.credit_term_days) {
            return Err(ConfigError::InvalidValue("business.credit_term_days".to_string()));
        }
        if !(0..=MAX_AMOUNT_CENTS).contains(&self.business.storefront_delivery_fee_cents) {
            return Err(ConfigError::InvalidValue(
                "business.storefront_delivery_fee_cents".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.business.max_sale_lines) {
            return Err(ConfigError::InvalidValue("business.max_sale_lines".to_string()));
        }
        if !(1..=MAX_UNIT_QUANTITY).contains(&self.business.max_line_quantity) {
            return Err(ConfigError::InvalidValue("business.max_line_quantity".to_string()));
        }
        Ok(())
    }

    /// True when the built-in development secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }

    /// `bind_addr:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopdesk", "shopdesk")
            .map(|dirs| dirs.config_dir().join("shopdesk.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.business.credit_term_days, 30);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [business]
            storefront_delivery_fee_cents = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.business.storefront_delivery_fee_cents, 250);
        assert_eq!(config.business.rules().storefront_delivery_fee_cents, 250);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHOPDESK_PORT", "9100"),
            ("SHOPDESK_DB_PATH", "/tmp/shop.db"),
            ("SHOPDESK_JWT_SECRET", "s3cret"),
            ("SHOPDESK_CREDIT_TERM_DAYS", "14"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.business.credit_term_days, 14);
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = ServiceConfig::default();
        let result = config.apply_env_overrides(|key| (key == "SHOPDESK_PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "SHOPDESK_PORT"));
    }

    #[test]
    fn test_validation() {
        let mut config = ServiceConfig::default();
        config.auth.jwt_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));

        let mut config = ServiceConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.business.credit_term_days = 400;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.business.max_line_quantity = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(key)) if key == "business.max_line_quantity"));

        let mut config = ServiceConfig::default();
        config.business.storefront_delivery_fee_cents = MAX_AMOUNT_CENTS + 1;
        assert!(config.validate().is_err());
    }
}
