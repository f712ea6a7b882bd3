//! Config loading and validation.

use super::model::LockConfig;
use crate::error::{LockfileError, Result};
use std::path::Path;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(LockConfig)` - Successfully loaded and validated config
    /// * `Err(LockfileError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockfileError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LockfileError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockfileError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `heartbeat_ms` must be positive
    /// - `stale_ms` must exceed `heartbeat_ms`, or live claims would look abandoned
    /// - `sync_retries` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_ms == 0 {
            return Err(LockfileError::Config(
                "heartbeat_ms must be greater than 0".to_string(),
            ));
        }

        if self.stale_ms <= self.heartbeat_ms {
            return Err(LockfileError::Config(format!(
                "stale_ms ({}) must be greater than heartbeat_ms ({})",
                self.stale_ms, self.heartbeat_ms
            )));
        }

        if self.sync_retries == 0 {
            return Err(LockfileError::Config(
                "sync_retries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
