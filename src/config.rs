//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tunables for the player core. Every field has a default, so a config file
/// only needs the keys it changes:
///
/// ```toml
/// ramp_ms = 50
/// debounce_ms = 750
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyser transform size; the snapshot has half as many bins.
    pub fft_size: usize,
    /// Analyser temporal smoothing, 0.0..=1.0.
    pub smoothing: f32,
    /// Length of a gain ramp.
    pub ramp_ms: u64,
    /// Quiet period before a volume change is persisted.
    pub debounce_ms: u64,
    /// Blocks rendered ahead of the output device.
    pub latency_blocks: usize,
    /// Key the gain is persisted under.
    pub volume_key: String,
    /// Gain used when nothing was persisted.
    pub default_gain: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            ramp_ms: 100,
            debounce_ms: 500,
            latency_blocks: 32,
            volume_key: "user_volume".into(),
            default_gain: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn ramp(&self) -> Duration {
        Duration::from_millis(self.ramp_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str("ramp_ms = 50\nvolume_key = \"gain\"").unwrap();
        assert_eq!(config.ramp(), Duration::from_millis(50));
        assert_eq!(config.volume_key, "gain");
        assert_eq!(config.fft_size, 256);
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let err = EngineConfig::from_toml_str("fft_size = \"big\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
