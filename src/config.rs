// ABOUTME: Configuration loading and validation for the witness binary.
// ABOUTME: Reads REGION and a JSON CONFIG blob from the environment, plus optional pool tuning.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use witness_store::PoolConfig;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REGION must be set")]
    MissingRegion,

    #[error("CONFIG must be set")]
    MissingConfig,

    #[error("CONFIG is not valid JSON: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("database_url must be set in CONFIG")]
    MissingDatabaseUrl,

    #[error("witness key for region {0} must be set in CONFIG")]
    MissingWitnessKey(String),

    #[error("{name} is not a valid number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Shape of the CONFIG JSON document.
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    database_url: String,
    #[serde(default)]
    keys: HashMap<String, String>,
}

/// Runtime configuration for one regional witness.
#[derive(Clone)]
pub struct WitnessConfig {
    pub region: String,
    pub database_url: String,
    /// Signing key for this region, handed to the witness engine as-is.
    pub witness_key: String,
    pub pool: PoolConfig,
}

impl std::fmt::Debug for WitnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitnessConfig")
            .field("region", &self.region)
            .field("database_url", &self.database_url)
            .field("witness_key", &"<redacted>")
            .field("pool", &self.pool)
            .finish()
    }
}

impl WitnessConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - REGION: region this witness serves (required)
    /// - CONFIG: JSON `{"database_url": ..., "keys": {"<region>": ...}}` (required)
    /// - WITNESS_POOL_SIZE: maximum database connections (default: 8)
    /// - WITNESS_ACQUIRE_TIMEOUT_MS: wait for a free connection (default: 5000)
    /// - WITNESS_BUSY_TIMEOUT_MS: SQLite busy timeout (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let region = get("REGION").ok_or(ConfigError::MissingRegion)?;
        let raw = get("CONFIG").ok_or(ConfigError::MissingConfig)?;
        let doc: ConfigDocument = serde_json::from_str(&raw)?;

        if doc.database_url.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let witness_key = doc
            .keys
            .get(&region)
            .filter(|k| !k.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingWitnessKey(region.clone()))?;

        let defaults = PoolConfig::default();
        let pool = PoolConfig {
            max_size: parse_number(get("WITNESS_POOL_SIZE"), "WITNESS_POOL_SIZE")?
                .map(|n| n as usize)
                .unwrap_or(defaults.max_size),
            acquire_timeout: parse_number(
                get("WITNESS_ACQUIRE_TIMEOUT_MS"),
                "WITNESS_ACQUIRE_TIMEOUT_MS",
            )?
            .map(Duration::from_millis)
            .unwrap_or(defaults.acquire_timeout),
            busy_timeout: parse_number(get("WITNESS_BUSY_TIMEOUT_MS"), "WITNESS_BUSY_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
        };

        Ok(Self {
            region,
            database_url: doc.database_url,
            witness_key,
            pool,
        })
    }

    /// Name embedded in a signed-note private key
    /// (`PRIVATE+KEY+<name>+<hash>+<key>`). Safe to log.
    pub fn key_name(&self) -> Option<&str> {
        let mut parts = self.witness_key.split('+');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("PRIVATE"), Some("KEY"), Some(name)) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

fn parse_number(value: Option<String>, name: &'static str) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { name, value: v })
        })
        .transpose()
}
