use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Runtime environment ("development", "production", "test")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level filter passed to tracing (e.g. "info", "quoteflow=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON (production) instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Maximum number of database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Quote-specific defaults (currency, validity window)
    #[validate]
    #[serde(default)]
    pub quotes: QuoteDefaults,
}

/// Defaults applied when a caller creates a quote without overriding them.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct QuoteDefaults {
    /// Currency pinned on new quotes when the caller does not pass one
    #[validate(length(min = 3, max = 3, message = "Currency code must be 3 characters"))]
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Validity window (days) for new and duplicated quotes
    #[validate(range(min = 1, max = 365))]
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,

    /// Currencies a quote may be denominated in
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencyConfig>,
}

/// A currency the quoting core knows how to render.
#[derive(Clone, Debug, Deserialize)]
pub struct CurrencyConfig {
    pub code: String,
    pub symbol: String,
}

impl Default for QuoteDefaults {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            validity_days: default_validity_days(),
            currencies: default_currencies(),
        }
    }
}

impl QuoteDefaults {
    /// Looks up the display symbol for a currency code, if known.
    pub fn symbol_for(&self, code: &str) -> Option<&str> {
        self.currencies
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .map(|c| c.symbol.as_str())
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_validity_days() -> i64 {
    DEFAULT_VALIDITY_DAYS
}

fn default_currencies() -> Vec<CurrencyConfig> {
    vec![
        CurrencyConfig {
            code: "EUR".to_string(),
            symbol: "€".to_string(),
        },
        CurrencyConfig {
            code: "USD".to_string(),
            symbol: "$".to_string(),
        },
        CurrencyConfig {
            code: "GBP".to_string(),
            symbol: "£".to_string(),
        },
        CurrencyConfig {
            code: "CHF".to_string(),
            symbol: "CHF".to_string(),
        },
    ]
}

impl AppConfig {
    /// Loads configuration from `config/default.toml`, an environment-specific
    /// overlay, and `APP_`-prefixed environment variables (highest priority).
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config: AppConfig = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(config)
    }

    /// Builds a minimal configuration programmatically (tests, embedding).
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            quotes: QuoteDefaults::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::new("sqlite::memory:", "test");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.quotes.default_currency, "EUR");
        assert_eq!(cfg.quotes.validity_days, 30);
    }

    #[test]
    fn symbol_lookup_is_case_insensitive() {
        let defaults = QuoteDefaults::default();
        assert_eq!(defaults.symbol_for("eur"), Some("€"));
        assert_eq!(defaults.symbol_for("USD"), Some("$"));
        assert_eq!(defaults.symbol_for("XXX"), None);
    }
}
