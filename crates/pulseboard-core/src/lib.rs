//! Shared domain types and configuration for Pulseboard.

pub mod app_config;
pub mod config;
pub mod integration;
pub mod platform;

pub use app_config::{AppConfig, Environment, OAuthClientCredentials};
pub use config::{load_app_config, load_app_config_from_env};
pub use integration::{IntegrationConfig, IntegrationData, PlatformMetrics, MAX_SYNC_RANGE_DAYS};
pub use platform::{PlatformType, StreamStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("unsupported platform type: {0}")]
    UnsupportedPlatform(String),

    #[error("unknown stream status: {0}")]
    UnknownStreamStatus(String),
}
