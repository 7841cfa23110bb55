// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{self, AspectRatioPolicy};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Engine tuning
///
/// Desired settings are never persisted here; this only controls how the
/// engine negotiates with the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between attaching a stream and starting playback
    pub settle_delay_ms: u64,
    /// Frame rate commanded on selection when none is set
    pub default_frame_rate: f64,
    /// How aspect ratio changes reach the device
    pub aspect_ratio_policy: AspectRatioPolicy,
    /// Carry desired settings over when switching devices
    pub carry_settings_across_devices: bool,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settle_delay_ms: constants::timing::SETTLE_DELAY_MS,
            default_frame_rate: constants::DEFAULT_FRAME_RATE,
            aspect_ratio_policy: AspectRatioPolicy::default(),
            carry_settings_across_devices: true,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// `<config dir>/camera-controls/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::config_paths::APP_DIR)
                .join(constants::config_paths::CONFIG_FILE)
        })
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"aspect_ratio_policy": "restart", "settle_delay_ms": 0}"#)
                .unwrap();
        assert_eq!(config.aspect_ratio_policy, AspectRatioPolicy::Restart);
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.default_frame_rate, 30.0);
        assert!(config.carry_settings_across_devices);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/camera-controls.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
