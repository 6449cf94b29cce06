//! Environment configuration.

use std::path::PathBuf;
use thiserror::Error;
use crate::import::{DuplicatePolicy, ImportOptions};
use crate::import::driver::DEFAULT_PROGRESS_EVERY;

pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// In-memory stores are used when unset.
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub import: ImportOptions,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value `{value}`: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let progress_every = parse_or(get("IMPORT_PROGRESS_EVERY"), "IMPORT_PROGRESS_EVERY", DEFAULT_PROGRESS_EVERY)?;
        if progress_every == 0 {
            return Err(ConfigError::Invalid { key: "IMPORT_PROGRESS_EVERY", value: "0".into(), reason: "must be greater than zero".into() });
        }
        let policy = match get("IMPORT_DUPLICATE_POLICY") {
            Some(v) => v.parse::<DuplicatePolicy>()
                .map_err(|reason| ConfigError::Invalid { key: "IMPORT_DUPLICATE_POLICY", value: v.clone(), reason })?,
            None => DuplicatePolicy::default(),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./uploads")),
            max_upload_bytes: parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            import: ImportOptions { policy, progress_every },
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string(), value: v }),
        None => Ok(default),
    }
}
