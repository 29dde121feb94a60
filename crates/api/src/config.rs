//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use thiserror::Error;

use tallyerp_observability::{LogFormat, LoggingConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_DEFAULT_JWT_SECRET: &str = "dev-secret";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES is enabled")]
    Missing(&'static str),
}

/// Where domain data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl ApiConfig {
    /// Read configuration from process environment variables.
    ///
    /// | variable | default |
    /// |----------|---------|
    /// | `BIND_ADDR` | `0.0.0.0:8080` |
    /// | `JWT_SECRET` | insecure dev secret |
    /// | `USE_PERSISTENT_STORES` | `false` |
    /// | `DATABASE_URL` | required when persistent |
    /// | `DATABASE_MAX_CONNECTIONS` | `10` |
    /// | `LOG_FORMAT` | `json` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let jwt_secret =
            get("JWT_SECRET").unwrap_or_else(|| DEV_DEFAULT_JWT_SECRET.to_string());

        let persistent = match get("USE_PERSISTENT_STORES")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "USE_PERSISTENT_STORES",
                    reason: format!("expected true or false, got '{other}'"),
                });
            }
        };

        let storage = if persistent {
            let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
                None => DEFAULT_MAX_CONNECTIONS,
                Some(raw) => raw
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ConfigError::Invalid {
                        name: "DATABASE_MAX_CONNECTIONS",
                        reason: format!("expected a positive integer, got '{raw}'"),
                    })?,
            };
            StorageConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageConfig::InMemory
        };

        let format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse::<LogFormat>().map_err(|reason| ConfigError::Invalid {
                name: "LOG_FORMAT",
                reason,
            })?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            storage,
            logging: LoggingConfig {
                format,
                ..LoggingConfig::default()
            },
        })
    }

    /// Whether the insecure built-in signing secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_DEFAULT_JWT_SECRET
    }

    /// In-memory configuration with the given signing secret (tests, local runs).
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            storage: StorageConfig::InMemory,
            logging: LoggingConfig::default(),
        }
    }
}
