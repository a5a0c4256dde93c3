//! Data Provider Configuration Settings
//!
//! Configuration types for the data provider, loaded from environment variables.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::domain::session::{CaCertificate, Credentials};

/// Broker environment (simulation vs production).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Simulated trading against the broker's sandbox.
    #[default]
    Simulation,
    /// Production trading.
    Production,
}

impl Environment {
    /// Parse from the `BROKER_SIMULATION` flag. Anything other than an
    /// explicit false value keeps simulation mode.
    #[must_use]
    pub fn from_simulation_flag(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "false" | "0" | "no" => Self::Production,
            _ => Self::Simulation,
        }
    }

    /// Check if this is the simulation environment.
    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        matches!(self, Self::Simulation)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Production => "production",
        }
    }
}

/// Broker gateway connection settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Base URL of the broker session gateway.
    pub gateway_url: String,
    /// Timeout for a single gateway request.
    pub request_timeout: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Historical data settings.
#[derive(Debug, Clone)]
pub struct HistoricalSettings {
    /// Longest wait for one symbol's kbar callback.
    pub kbars_timeout: Duration,
    /// Offset used to assign ticks to trading dates.
    pub market_offset: FixedOffset,
}

impl Default for HistoricalSettings {
    fn default() -> Self {
        Self {
            kbars_timeout: Duration::from_secs(30),
            market_offset: Utc.fix(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP API port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

/// Complete data provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Broker environment.
    pub environment: Environment,
    /// API key pair.
    pub credentials: Credentials,
    /// Client certificate, when both path and password are configured.
    pub certificate: Option<CaCertificate>,
    /// Broker gateway settings.
    pub broker: BrokerSettings,
    /// Historical data settings.
    pub historical: HistoricalSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
}

impl ProviderConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or a value is out of
    /// range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "API_KEY")?;
        let secret_key = required(&lookup, "SECRET_KEY")?;

        let certificate = CaCertificate::from_parts(lookup("CA_CERT_PATH"), lookup("CA_PASSWORD"));

        let environment = lookup("BROKER_SIMULATION")
            .map(|s| Environment::from_simulation_flag(&s))
            .unwrap_or_default();

        let broker = BrokerSettings {
            gateway_url: lookup("BROKER_GATEWAY_URL")
                .filter(|url| !url.is_empty())
                .map_or_else(
                    || BrokerSettings::default().gateway_url,
                    |url| url.trim_end_matches('/').to_string(),
                ),
            request_timeout: parse_duration_secs(
                &lookup,
                "BROKER_REQUEST_TIMEOUT_SECS",
                BrokerSettings::default().request_timeout,
            ),
        };

        let offset_secs = parse_or(&lookup, "MARKET_UTC_OFFSET_SECS", 0_i32);
        let market_offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "MARKET_UTC_OFFSET_SECS".to_string(),
                value: offset_secs.to_string(),
            }
        })?;

        let historical = HistoricalSettings {
            kbars_timeout: parse_duration_secs(
                &lookup,
                "KBARS_TIMEOUT_SECS",
                HistoricalSettings::default().kbars_timeout,
            ),
            market_offset,
        };

        let server = ServerSettings {
            port: parse_or(&lookup, "DATA_PROVIDER_PORT", ServerSettings::default().port),
        };

        Ok(Self {
            environment,
            credentials: Credentials::new(api_key, secret_key),
            certificate,
            broker,
            historical,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set to an unusable value.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}
