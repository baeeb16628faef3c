use crate::app_config::{AppConfig, Environment, OAuthClientCredentials};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings count as unset so a blank line in `.env` does not
    // register a provider with an empty key.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let oauth_pair = |id_var: &str,
                      secret_var: &str|
     -> Result<Option<OAuthClientCredentials>, ConfigError> {
        match (optional(id_var), optional(secret_var)) {
            (Some(client_id), Some(client_secret)) => Ok(Some(OAuthClientCredentials {
                client_id,
                client_secret,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar(secret_var.to_string())),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar(id_var.to_string())),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("PULSEBOARD_ENV", "development"))?;

    let bind_addr = parse_addr("PULSEBOARD_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("PULSEBOARD_LOG_LEVEL", "info");
    let public_url = or_default("PULSEBOARD_PUBLIC_URL", "http://localhost:3000")
        .trim_end_matches('/')
        .to_string();

    let db_max_connections = parse_u32("PULSEBOARD_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PULSEBOARD_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PULSEBOARD_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "PULSEBOARD_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    let http_timeout_secs = parse_u64("PULSEBOARD_HTTP_TIMEOUT_SECS", "30")?;
    let sync_lookback_days = parse_u32("PULSEBOARD_SYNC_LOOKBACK_DAYS", "1")?;
    if sync_lookback_days == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PULSEBOARD_SYNC_LOOKBACK_DAYS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let rate_limit_per_minute = parse_u32("PULSEBOARD_RATE_LIMIT_PER_MINUTE", "120")?;
    if rate_limit_per_minute == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PULSEBOARD_RATE_LIMIT_PER_MINUTE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let meta_oauth = oauth_pair("META_APP_ID", "META_APP_SECRET")?;
    let linkedin_oauth = oauth_pair("LINKEDIN_CLIENT_ID", "LINKEDIN_CLIENT_SECRET")?;
    let google_oauth = oauth_pair("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        public_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        sync_lookback_days,
        rate_limit_per_minute,
        meta_oauth,
        linkedin_oauth,
        google_oauth,
        openai_api_key: optional("OPENAI_API_KEY"),
        anthropic_api_key: optional("ANTHROPIC_API_KEY"),
        google_ai_api_key: optional("GOOGLE_AI_API_KEY"),
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PULSEBOARD_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
