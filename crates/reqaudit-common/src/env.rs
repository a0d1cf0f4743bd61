//! Typed environment variable lookups
//!
//! Unset variables fall back to a default. A variable that is set but fails to
//! parse is an error rather than a silent fallback, so a typo in deployment
//! configuration is caught at startup.

use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Read `key` and parse it, returning `default` when the variable is unset.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

/// Read `key` and parse it, returning `None` when the variable is unset or blank.
pub fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CommonError::invalid_env(key, &raw, e)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(CommonError::invalid_env(key, "<non-unicode>", "not valid UTF-8"))
        },
    }
}

/// Read a comma separated list, trimming entries and dropping empty ones.
pub fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
