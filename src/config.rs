//! Configuration file support.
//!
//! Loads optional `weft.toml` from the data directory. Embedders override
//! values programmatically. If no config file exists, defaults are used.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WeftConfig {
    pub store: StoreConfig,
}

/// Store configuration section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
    /// Capacity of each predicate memoization cache
    pub cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: "./weft-data".into(),
            cache_size: crate::constants::DEFAULT_CACHE_SIZE,
        }
    }
}

impl WeftConfig {
    /// Read `weft.toml` from `data_dir`. A missing or malformed file
    /// yields the defaults; a malformed one is logged rather than
    /// aborting startup.
    pub fn load(data_dir: &Path) -> Self {
        Self::parse_file(&data_dir.join("weft.toml")).unwrap_or_default()
    }

    fn parse_file(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        let parsed = toml::from_str::<Self>(&raw)
            .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file"))
            .ok()?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Some(parsed)
    }
}
