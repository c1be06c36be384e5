//! Application configuration loaded from a TOML file.
//!
//! All sections have usable defaults; a partial file only overrides what it
//! names. Validation happens once at construction so every component can
//! trust the values it is handed.

use std::path::Path;

use serde::Deserialize;

use crate::error_handling::types::ConfigError;

use super::types::{ApiSettings, CaptureSettings, StoreSettings, UploaderSettings};

/// Complete runtime configuration.
///
/// # Fields Overview
///
/// - `store`: local SQLite chunk store location, byte quota and retention
/// - `uploader`: concurrency bound, retry budget, backoff shape, timeouts
/// - `capture`: admission threshold and signature verification toggle
/// - `api`: presign endpoint and optional bearer credential
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreSettings,
    pub uploader: UploaderSettings,
    pub capture: CaptureSettings,
    pub api: ApiSettings,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section for values that would misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uploader.max_concurrent < 1 || self.uploader.max_concurrent > 32 {
            return Err(ConfigError::NotInRange(format!(
                "uploader.max_concurrent must be within 1..=32, got {}",
                self.uploader.max_concurrent
            )));
        }
        if self.uploader.max_retries < 1 || self.uploader.max_retries > 20 {
            return Err(ConfigError::NotInRange(format!(
                "uploader.max_retries must be within 1..=20, got {}",
                self.uploader.max_retries
            )));
        }
        if self.uploader.base_delay_ms < 1 {
            return Err(ConfigError::NotInRange(
                "uploader.base_delay_ms must be at least 1".to_string(),
            ));
        }
        if self.uploader.max_delay_ms < self.uploader.base_delay_ms {
            return Err(ConfigError::NotInRange(format!(
                "uploader.max_delay_ms ({}) must not be below uploader.base_delay_ms ({})",
                self.uploader.max_delay_ms, self.uploader.base_delay_ms
            )));
        }
        if self.uploader.transmit_timeout_secs < 1 || self.uploader.transmit_timeout_secs > 300 {
            return Err(ConfigError::NotInRange(format!(
                "uploader.transmit_timeout_secs must be within 1..=300, got {}",
                self.uploader.transmit_timeout_secs
            )));
        }
        if self.capture.min_chunk_bytes < 1 {
            return Err(ConfigError::NotInRange(
                "capture.min_chunk_bytes must be at least 1".to_string(),
            ));
        }
        if self.store.max_store_bytes < 1 {
            return Err(ConfigError::NotInRange(
                "store.max_store_bytes must be at least 1".to_string(),
            ));
        }
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::DirectoryDoesNotExist(format!(
                    "store.db_path parent directory {:?} does not exist",
                    parent
                )));
            }
        }
        if !self.api.presign_endpoint.starts_with("http://")
            && !self.api.presign_endpoint.starts_with("https://")
        {
            return Err(ConfigError::BadEndpoint(format!(
                "api.presign_endpoint must be an http(s) URL, got {:?}",
                self.api.presign_endpoint
            )));
        }
        Ok(())
    }
}
