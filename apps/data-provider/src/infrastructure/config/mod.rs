//! Configuration Module
//!
//! Configuration loading for the data provider service.

mod settings;

pub use settings::{
    BrokerSettings, ConfigError, Environment, HistoricalSettings, ProviderConfig, ServerSettings,
};
