//! TOML configuration shared by the binaries.
//!
//! Every field has a default, so a missing section (or a missing file) gives
//! the stock setup: a local sled store and batches of 1000 records.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Records per committed batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub build: BuildConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/placephone.sled"),
        }
    }
}

/// What to do with a source record that fails structural checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log it, count it, continue
    #[default]
    Skip,
    /// Fail the run
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuildConfig {
    pub batch_size: usize,
    pub malformed_policy: MalformedPolicy,
    /// Clear existing code indices before building. When false, a build
    /// refuses to run against non-empty indices.
    pub truncate_before_build: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            malformed_policy: MalformedPolicy::Skip,
            truncate_before_build: true,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub malformed_policy: MalformedPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            malformed_policy: MalformedPolicy::Skip,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub listen: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.build.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.build.malformed_policy, MalformedPolicy::Skip);
        assert!(config.build.truncate_before_build);
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.store.path, PathBuf::from("data/placephone.sled"));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [store]
            path = "/var/lib/placephone"

            [build]
            batch_size = 2500
            malformed_policy = "abort"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/placephone"));
        assert_eq!(config.build.batch_size, 2500);
        assert_eq!(config.build.malformed_policy, MalformedPolicy::Abort);
        assert!(config.build.truncate_before_build);
        assert_eq!(config.query.listen, "0.0.0.0:3000");
    }

    #[test]
    fn test_zero_batch_size_invalid() {
        let config = BuildConfig {
            batch_size: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::Builder::new()
            .prefix("placephone-config-")
            .tempdir()
            .unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ingest]\nbatch_size = 10\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.ingest.batch_size, 10);
        assert!(Config::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
