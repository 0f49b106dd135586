//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

use crate::payments::types::ProcessorName;
use crate::refunds::PolicyTable;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` when running with `SKIP_EXTERNALS`
    pub database: Option<DatabaseConfig>,
    pub cache: Option<CacheConfig>,
    pub logging: LoggingConfig,
    pub processor: ProcessorConfig,
    pub refund: RefundConfig,
    pub skip_externals: bool,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
    pub idle_timeout: u64,       // seconds
    pub run_migrations: bool,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub default_ttl: u64, // seconds
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Refund processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub mode: ProcessorName,
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Refund policy and presentation settings
#[derive(Debug, Clone)]
pub struct RefundConfig {
    pub policy: PolicyTable,
    pub currency: String,
    pub currency_symbol: String,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let skip_externals = env_flag("SKIP_EXTERNALS");
        let (database, cache) = if skip_externals {
            (None, None)
        } else {
            (
                Some(DatabaseConfig::from_env()?),
                Some(CacheConfig::from_env()?),
            )
        };

        let mut processor = ProcessorConfig::from_env()?;
        if skip_externals {
            processor.mode = ProcessorName::Sandbox;
        }

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database,
            cache,
            logging: LoggingConfig::from_env()?,
            processor,
            refund: RefundConfig::from_env()?,
            skip_externals,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if let Some(cache) = &self.cache {
            cache.validate()?;
        }
        self.logging.validate()?;
        self.processor.validate()?;
        self.refund.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("SERVER_PORT", "8000")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env_parse("DB_MAX_CONNECTIONS", "20")?,
            min_connections: env_parse("DB_MIN_CONNECTIONS", "5")?,
            connection_timeout: env_parse("DB_CONNECTION_TIMEOUT", "30")?,
            idle_timeout: env_parse("DB_IDLE_TIMEOUT", "600")?,
            run_migrations: env::var("DB_RUN_MIGRATIONS").is_err() || env_flag("DB_RUN_MIGRATIONS"),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CacheConfig {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            default_ttl: env_parse("CACHE_DEFAULT_TTL", "60")?,
            max_connections: env_parse("CACHE_MAX_CONNECTIONS", "10")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::InvalidValue("REDIS_URL".to_string()));
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(ConfigError::InvalidValue(
                "REDIS_URL must start with redis:// or rediss://".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = env::var("PROCESSOR_MODE")
            .unwrap_or_else(|_| "sandbox".to_string())
            .parse::<ProcessorName>()
            .map_err(|_| ConfigError::InvalidValue("PROCESSOR_MODE".to_string()))?;

        Ok(ProcessorConfig {
            mode,
            base_url: env::var("PROCESSOR_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4010".to_string()),
            secret_key: env::var("PROCESSOR_SECRET_KEY").unwrap_or_default(),
            webhook_secret: env::var("PROCESSOR_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_secs: env_parse("PROCESSOR_TIMEOUT_SECS", "15")?,
            max_retries: env_parse("PROCESSOR_MAX_RETRIES", "2")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PROCESSOR_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.mode == ProcessorName::Http {
            if self.secret_key.trim().is_empty() {
                return Err(ConfigError::MissingVariable(
                    "PROCESSOR_SECRET_KEY".to_string(),
                ));
            }
            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "PROCESSOR_BASE_URL must be a valid URL".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            mode: ProcessorName::Sandbox,
            base_url: "http://localhost:4010".to_string(),
            secret_key: String::new(),
            webhook_secret: None,
            timeout_secs: 15,
            max_retries: 2,
        }
    }
}

impl RefundConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let policy = match env::var("REFUND_POLICY_TIERS") {
            Ok(raw) if !raw.trim().is_empty() => PolicyTable::parse(&raw).map_err(|e| {
                ConfigError::ValidationFailed(format!("REFUND_POLICY_TIERS: {}", e))
            })?,
            _ => PolicyTable::default(),
        };

        Ok(RefundConfig {
            policy,
            currency: env::var("REFUND_CURRENCY").unwrap_or_else(|_| "PHP".to_string()),
            currency_symbol: env::var("REFUND_CURRENCY_SYMBOL")
                .unwrap_or_else(|_| "₱".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::InvalidValue(
                "REFUND_CURRENCY must be a 3-letter ISO code".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            policy: PolicyTable::default(),
            currency: "PHP".to_string(),
            currency_symbol: "₱".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
