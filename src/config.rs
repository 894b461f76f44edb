//! Configuration for the coordination core.
//!
//! Loaded from a YAML file. Unknown fields are ignored for forward
//! compatibility, and every field has a default so a missing or empty file
//! yields a working configuration.

use crate::error::{PlankError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for lock expiry and the client-side queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a lock may be held before the sweeper reclaims it, measured
    /// from acquisition and never refreshed.
    pub lock_ttl_secs: u64,

    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,

    /// Directory holding the client's offline queue log.
    pub queue_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_ttl_secs: 120,
            sweep_interval_secs: 30,
            queue_dir: ".plank/queue".to_string(),
        }
    }
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlankError::Storage(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string. Unknown fields are ignored.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PlankError::Validation(format!("failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| PlankError::Internal(format!("failed to serialize config: {}", e)))
    }

    /// Validate config values.
    ///
    /// Rules: both durations must be positive, and the sweep interval must
    /// be shorter than the TTL (a sweeper that ticks slower than locks
    /// expire would let abandoned locks linger well past their deadline).
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl_secs == 0 {
            return Err(PlankError::Validation(
                "lock_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(PlankError::Validation(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval_secs >= self.lock_ttl_secs {
            return Err(PlankError::Validation(format!(
                "sweep_interval_secs ({}) must be shorter than lock_ttl_secs ({})",
                self.sweep_interval_secs, self.lock_ttl_secs
            )));
        }
        Ok(())
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn queue_dir(&self) -> PathBuf {
        PathBuf::from(&self.queue_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_values() {
        let config = Config::default();
        assert_eq!(config.lock_ttl_secs, 120);
        assert_eq!(config.sweep_interval_secs, 30);
        assert_eq!(config.queue_dir(), PathBuf::from(".plank/queue"));
        config.validate().unwrap();
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.lock_ttl_secs, 120);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let yaml = "lock_ttl_secs: 60\nsweep_interval_secs: 10\nfuture_knob: true\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.lock_ttl_secs, 60);
        assert_eq!(config.sweep_interval_secs, 10);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = Config::from_yaml("lock_ttl_secs: 0\n").unwrap_err();
        assert!(matches!(err, PlankError::Validation(_)));
    }

    #[test]
    fn sweep_interval_must_be_shorter_than_ttl() {
        let yaml = "lock_ttl_secs: 30\nsweep_interval_secs: 30\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        let PlankError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("shorter"));
    }

    #[test]
    fn yaml_roundtrip_preserves_values() {
        let mut config = Config::default();
        config.lock_ttl_secs = 300;
        config.sweep_interval_secs = 60;

        let yaml = config.to_yaml().unwrap();
        let back = Config::from_yaml(&yaml).unwrap();
        assert_eq!(back.lock_ttl_secs, 300);
        assert_eq!(back.sweep_interval_secs, 60);
    }

    #[test]
    fn durations_convert_to_std() {
        let config = Config::default();
        assert_eq!(config.lock_ttl(), Duration::from_secs(120));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "lock_ttl_secs: 90\nsweep_interval_secs: 15\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.lock_ttl_secs, 90);
        assert_eq!(config.sweep_interval_secs, 15);
    }
}
