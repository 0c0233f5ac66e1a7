use std::env;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_SHORT_CODE_LENGTH: usize = 10;
const DEFAULT_LINK_CACHE_SIZE: usize = 1024;

/// Short codes live in a VARCHAR(20) column.
pub const MAX_SHORT_CODE_LENGTH: usize = 20;
const MIN_SHORT_CODE_LENGTH: usize = 6;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub url: String,
    pub bind_address: String,
    pub short_code_length: usize,
    pub link_cache_size: NonZeroUsize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let url = lookup("SERVER_URL").ok_or(ConfigError::Missing("SERVER_URL"))?;
        let url = url.trim_end_matches('/').to_string();

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let short_code_length: usize =
            parse_or(&lookup, "SHORT_CODE_LENGTH", DEFAULT_SHORT_CODE_LENGTH)?;
        if !(MIN_SHORT_CODE_LENGTH..=MAX_SHORT_CODE_LENGTH).contains(&short_code_length) {
            return Err(ConfigError::Invalid {
                key: "SHORT_CODE_LENGTH",
                value: short_code_length.to_string(),
                reason: format!(
                    "must be between {} and {}",
                    MIN_SHORT_CODE_LENGTH, MAX_SHORT_CODE_LENGTH
                ),
            });
        }

        let cache_size: usize = parse_or(&lookup, "LINK_CACHE_SIZE", DEFAULT_LINK_CACHE_SIZE)?;
        let link_cache_size = NonZeroUsize::new(cache_size).ok_or(ConfigError::Invalid {
            key: "LINK_CACHE_SIZE",
            value: cache_size.to_string(),
            reason: "must not be zero".to_string(),
        })?;

        Ok(ServerConfig {
            database_url,
            url,
            bind_address,
            short_code_length,
            link_cache_size,
        })
    }

    /// Where a recipe lives on the public site.
    pub fn recipe_url(&self, recipe_id: i32) -> String {
        format!("{}/recipes/{}", self.url, recipe_id)
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/s/{}", self.url, code)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
