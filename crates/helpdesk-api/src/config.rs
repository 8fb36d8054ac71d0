//! Helpdesk API configuration.
//!
//! Configuration is loaded from environment variables. The identity provider
//! settings (issuer, audience, JWKS URL) are required; everything else has a
//! sensible default.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default signature algorithm, matching the provider's realm default.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Default JWKS cache TTL in seconds (10 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 600;

/// Default cap on JWKS fetches per rolling minute.
pub const DEFAULT_JWKS_FETCHES_PER_MINUTE: u32 = 10;

/// Default bound on cached signing keys.
pub const DEFAULT_JWKS_MAX_KEYS: usize = 32;

/// Helpdesk API configuration.
///
/// Loaded from environment variables; see `from_vars` for the full list.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Issuer URL tokens must carry (realm URL of the identity provider).
    pub issuer: String,

    /// Audience that must appear among a token's audiences.
    pub audience: String,

    /// URL of the provider's JWKS discovery endpoint.
    pub jwks_url: String,

    /// The single signature algorithm this deployment accepts.
    pub allowed_algorithm: Algorithm,

    /// Clock skew tolerance in seconds for expiry/not-before validation.
    pub clock_skew_seconds: i64,

    /// JWKS cache TTL in seconds.
    pub jwks_cache_ttl_seconds: u64,

    /// Cap on JWKS fetches per rolling minute.
    pub jwks_fetches_per_minute: u32,

    /// Bound on cached signing keys.
    pub jwks_max_keys: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signature algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// fails validation.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer = require(vars, "OIDC_ISSUER")?;
        let audience = require(vars, "OIDC_AUDIENCE")?;
        let jwks_url = require(vars, "OIDC_JWKS_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let allowed_algorithm = match vars.get("OIDC_ALGORITHM").map(String::as_str) {
            None => DEFAULT_ALGORITHM,
            Some("RS256") => Algorithm::RS256,
            Some("RS384") => Algorithm::RS384,
            Some("RS512") => Algorithm::RS512,
            Some("EdDSA") => Algorithm::EdDSA,
            Some(other) => {
                return Err(ConfigError::InvalidAlgorithm(format!(
                    "OIDC_ALGORITHM must be one of RS256, RS384, RS512, EdDSA; got '{other}'"
                )))
            }
        };

        // Parse clock skew with validation
        let clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {value}"
                )));
            }

            #[allow(clippy::cast_possible_wrap)]
            let max = MAX_CLOCK_SKEW.as_secs() as i64;
            if value > max {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {max} seconds, got {value}"
                )));
            }

            value
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let default = DEFAULT_CLOCK_SKEW.as_secs() as i64;
            default
        };

        let jwks_cache_ttl_seconds = parse_or(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?;

        let jwks_fetches_per_minute: u32 = parse_or(
            vars,
            "JWKS_FETCHES_PER_MINUTE",
            DEFAULT_JWKS_FETCHES_PER_MINUTE,
        )?;
        if jwks_fetches_per_minute == 0 {
            return Err(ConfigError::InvalidJwksCache(
                "JWKS_FETCHES_PER_MINUTE must be greater than 0".to_string(),
            ));
        }

        let jwks_max_keys: usize = parse_or(vars, "JWKS_MAX_KEYS", DEFAULT_JWKS_MAX_KEYS)?;
        if jwks_max_keys == 0 {
            return Err(ConfigError::InvalidJwksCache(
                "JWKS_MAX_KEYS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            issuer,
            audience,
            jwks_url,
            allowed_algorithm,
            clock_skew_seconds,
            jwks_cache_ttl_seconds,
            jwks_fetches_per_minute,
            jwks_max_keys,
        })
    }
}

fn require(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(value_str) => value_str.parse().map_err(|e| {
            ConfigError::InvalidJwksCache(format!(
                "{name} must be a valid positive integer, got '{value_str}': {e}"
            ))
        }),
    }
}
