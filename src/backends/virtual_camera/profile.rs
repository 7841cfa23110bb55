// SPDX-License-Identifier: GPL-3.0-only

//! Virtual device profiles
//!
//! A profile describes one simulated device: its identity as returned by
//! enumeration and the raw capability object its tracks report. Profiles can
//! be loaded from a JSON array so vendor quirks (missing bounds, odd mode
//! strings) can be reproduced without hardware.

use crate::backends::camera::{CameraDevice, DeviceKind, RawCapabilities};
use crate::errors::{AppResult, ConfigError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub device_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub capabilities: RawCapabilities,
}

impl DeviceProfile {
    /// Enumeration entry; the label is hidden until permission is granted
    pub fn device(&self, permission_granted: bool) -> CameraDevice {
        CameraDevice {
            device_id: self.device_id.clone(),
            label: if permission_granted {
                self.label.clone()
            } else {
                String::new()
            },
            group_id: self.group_id.clone(),
            kind: self.kind,
        }
    }

    /// Load a JSON array of profiles
    pub fn load_all(path: &Path) -> AppResult<Vec<DeviceProfile>> {
        let text = std::fs::read_to_string(path)?;
        let profiles = serde_json::from_str(&text).map_err(ConfigError::from)?;
        Ok(profiles)
    }

    /// Two cameras with different capability sets plus a microphone
    pub fn builtin() -> Vec<DeviceProfile> {
        vec![
            Self::new(
                "virtual-front",
                "Virtual Front Camera",
                "virtual-front-group",
                DeviceKind::VideoInput,
                json!({
                    "deviceId": "virtual-front",
                    "groupId": "virtual-front-group",
                    "width": {"min": 320, "max": 1920},
                    "height": {"min": 240, "max": 1080},
                    "aspectRatio": {"min": 0.5, "max": 3.5},
                    "frameRate": {"min": 15, "max": 30},
                    "resizeMode": ["none", "crop-and-scale"],
                    "exposureMode": ["continuous", "manual"],
                    "exposureTime": {"min": 1, "max": 1000, "step": 1},
                    "iso": {"min": 100, "max": 3200, "step": 100},
                    "exposureCompensation": {"min": -2, "max": 2, "step": 0.5},
                    "focusMode": ["continuous", "manual"],
                    "focusDistance": {"min": 0, "max": 1, "step": 0.01},
                    "whiteBalanceMode": ["continuous", "manual"],
                    "colorTemperature": {"min": 2500, "max": 7500, "step": 100},
                    "zoom": {"min": 1, "max": 4, "step": 0.1},
                    "torch": false,
                    "brightness": {"min": 0, "max": 255, "step": 1},
                    "contrast": {"min": 0, "max": 255, "step": 1},
                    "saturation": {"min": 0, "max": 255, "step": 1},
                    "sharpness": {"min": 0, "max": 7, "step": 1}
                }),
            ),
            Self::new(
                "virtual-rear",
                "Virtual Rear Camera",
                "virtual-rear-group",
                DeviceKind::VideoInput,
                json!({
                    "deviceId": "virtual-rear",
                    "groupId": "virtual-rear-group",
                    "width": {"min": 640, "max": 3840},
                    "height": {"min": 480, "max": 2160},
                    "aspectRatio": {"min": 1.0, "max": 2.0},
                    "frameRate": {"min": 1, "max": 60},
                    "focusMode": ["single-shot", "continuous"],
                    "zoom": {"min": 1, "max": 8, "step": 0.1},
                    "torch": true
                }),
            ),
            Self::new(
                "virtual-mic",
                "Virtual Microphone",
                "virtual-front-group",
                DeviceKind::AudioInput,
                json!({}),
            ),
        ]
    }

    pub fn new(
        device_id: &str,
        label: &str,
        group_id: &str,
        kind: DeviceKind,
        capabilities: Value,
    ) -> DeviceProfile {
        DeviceProfile {
            device_id: device_id.to_string(),
            label: label.to_string(),
            group_id: group_id.to_string(),
            kind,
            capabilities: match capabilities {
                Value::Object(map) => map,
                _ => RawCapabilities::new(),
            },
        }
    }
}
