//! # Configuration Management for PolyStore
//!
//! This crate provides the configuration structures read once when a
//! connection is opened: which backend engine to use, where it lives, the
//! credentials, pool sizing and the integer narrowing policy.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{BackendKind, DatabaseConfig};
//!
//! let embedded = DatabaseConfig::embedded("data/cms.db");
//! assert_eq!(embedded.backend, BackendKind::Embedded);
//!
//! let server = DatabaseConfig::server(
//!     BackendKind::ServerB,
//!     "localhost".to_string(), 5432, "cms".to_string(),
//!     "postgres".to_string(), "password".to_string(),
//! );
//! assert_eq!(server.port, Some(5432));
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [database]
//! backend = "mysql"
//! host = "localhost"
//! port = 3306
//! database = "cms"
//! username = "cms"
//! password = "password"
//! min_connections = 1
//! max_connections = 10
//! connection_timeout_seconds = 30
//! idle_timeout_seconds = 600
//! max_lifetime_seconds = 3600
//! narrowing = "reject"
//! schema_file = "sql/schema_mysql.sql"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from polystore.toml (or the file named by POLYSTORE_CONFIG)
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

mod bundle;

pub use bundle::SchemaBundle;

use serde::{Deserialize, Serialize};
use std::{env, fmt, path::Path, str::FromStr};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./polystore.toml";
const CONFIG_PATH_VAR: &str = "POLYSTORE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The SQL engine selected for a deployment.
///
/// Embedded is SQLite, ServerA is MySQL, ServerB is PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "sqlite", alias = "embedded")]
    Embedded,
    #[serde(rename = "mysql")]
    ServerA,
    #[serde(rename = "postgres", alias = "postgresql")]
    ServerB,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Embedded,
        BackendKind::ServerA,
        BackendKind::ServerB,
    ];

    /// Canonical driver name, as written in configuration files
    pub fn driver_name(&self) -> &'static str {
        match self {
            BackendKind::Embedded => "sqlite",
            BackendKind::ServerA => "mysql",
            BackendKind::ServerB => "postgres",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            BackendKind::Embedded => None,
            BackendKind::ServerA => Some(3306),
            BackendKind::ServerB => Some(5432),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, BackendKind::Embedded)
    }

    /// Positional bind placeholder for the `n`th parameter (1-based)
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            BackendKind::Embedded | BackendKind::ServerA => "?".to_string(),
            BackendKind::ServerB => format!("${}", n),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "embedded" => Ok(BackendKind::Embedded),
            "mysql" => Ok(BackendKind::ServerA),
            "postgres" | "postgresql" | "psql" => Ok(BackendKind::ServerB),
            other => Err(ConfigError::Invalid(format!(
                "Unknown backend '{}': expected sqlite, mysql or postgres",
                other
            ))),
        }
    }
}

/// What to do when a 64-bit canonical integer does not fit a 32-bit engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrowingPolicy {
    /// Fail the write with an overflow error
    #[default]
    Reject,
    /// Keep the low 32 bits (two's complement wrap)
    Truncate,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: BackendKind,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Database file for the embedded engine; `:memory:` opens a private in-memory database
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_seconds: u64,
    #[serde(default)]
    pub narrowing: NarrowingPolicy,
    /// Bootstrap schema applied once at open
    #[serde(default)]
    pub schema_file: Option<String>,
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    3600
}

impl AppConfig {
    /// Load configuration from the TOML file named in the environment (or `.env`), or the default path
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified as {} (environment or .env) or in {} file",
                CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.database.validate()?;
        Ok(config)
    }
}

impl DatabaseConfig {
    /// Configuration for the embedded engine backed by `file_path`
    pub fn embedded(file_path: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Embedded,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            file_path: Some(file_path.into()),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            max_lifetime_seconds: default_max_lifetime(),
            narrowing: NarrowingPolicy::default(),
            schema_file: None,
        }
    }

    /// Configuration for one of the client/server engines
    pub fn server(
        backend: BackendKind,
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            backend,
            host: Some(host),
            port: Some(port),
            database: Some(database),
            username: Some(username),
            password: Some(password),
            file_path: None,
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            max_lifetime_seconds: default_max_lifetime(),
            narrowing: NarrowingPolicy::default(),
            schema_file: None,
        }
    }

    pub fn with_narrowing(mut self, narrowing: NarrowingPolicy) -> Self {
        self.narrowing = narrowing;
        self
    }

    pub fn with_schema_file(mut self, path: impl Into<String>) -> Self {
        self.schema_file = Some(path.into());
        self
    }

    /// Port to dial, falling back to the engine default
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.backend.default_port())
    }

    /// Human readable target for logs; never contains the password
    pub fn target(&self) -> String {
        match self.backend {
            BackendKind::Embedded => format!(
                "sqlite:{}",
                self.file_path.as_deref().unwrap_or("<unset>")
            ),
            kind => format!(
                "{}://{}@{}:{}/{}",
                kind,
                self.username.as_deref().unwrap_or(""),
                self.host.as_deref().unwrap_or("<unset>"),
                self.effective_port().unwrap_or_default(),
                self.database.as_deref().unwrap_or("")
            ),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            BackendKind::Embedded => {
                if self.file_path.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(
                        "Embedded backend requires file_path".to_string(),
                    ));
                }
            }
            kind => {
                if self.host.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(format!(
                        "Backend {} requires host",
                        kind
                    )));
                }
                if self.port == Some(0) {
                    return Err(ConfigError::Invalid(
                        "Database port cannot be zero".to_string(),
                    ));
                }
                if self.database.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(format!(
                        "Backend {} requires a database name",
                        kind
                    )));
                }
            }
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Invalid(
                "Database min_connections cannot be greater than max_connections".to_string(),
            ));
        }
        if self.connection_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Database connection_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
