// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};

/// Frame rate commanded on selection when the user has not chosen one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// How an aspect ratio change is applied to a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectRatioPolicy {
    /// Apply to the running track, restart the stream only if rejected
    #[default]
    InPlaceFirst,
    /// Always re-acquire the stream so the device picks a matching resolution
    Restart,
}

/// Resolution thresholds for labels
pub mod resolution_thresholds {
    /// 4K resolution threshold (3840 pixels wide)
    pub const THRESHOLD_4K: u32 = 3840;

    /// HD/1080p resolution threshold (1920 pixels wide)
    pub const THRESHOLD_HD: u32 = 1920;

    /// 720p resolution threshold (1280 pixels wide)
    pub const THRESHOLD_720P: u32 = 1280;
}

/// Get a short resolution label for a frame width
pub fn get_resolution_label(width: u32) -> Option<&'static str> {
    use resolution_thresholds::*;
    if width >= THRESHOLD_4K {
        Some("4K")
    } else if width >= THRESHOLD_HD {
        Some("HD")
    } else if width >= THRESHOLD_720P {
        Some("720p")
    } else if width >= 640 {
        Some("SD")
    } else {
        None
    }
}

/// Timing constants
pub mod timing {
    /// Delay between attaching a stream to the sink and starting playback
    pub const SETTLE_DELAY_MS: u64 = 100;
}

/// Snapshot output
pub mod capture {
    /// Folder under the user's pictures directory
    pub const DEFAULT_SAVE_FOLDER: &str = "Camera Controls";

    /// File name prefix for snapshots
    pub const SNAPSHOT_PREFIX: &str = "IMG";

    /// Extension of saved snapshots
    pub const SNAPSHOT_EXTENSION: &str = "png";
}

/// Configuration file location
pub mod config_paths {
    /// Directory under the user's config directory
    pub const APP_DIR: &str = "camera-controls";

    pub const CONFIG_FILE: &str = "config.json";
}
