// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::errors::FailureCategory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Loosely-typed capability object as reported by a track (`getCapabilities()`)
pub type RawCapabilities = serde_json::Map<String, serde_json::Value>;

/// Loosely-typed settings object as reported by a track (`getSettings()`)
pub type RawSettings = serde_json::Map<String, serde_json::Value>;

/// Kind of a media device entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeviceKind {
    #[default]
    #[serde(rename = "videoinput")]
    VideoInput,
    #[serde(rename = "audioinput")]
    AudioInput,
    #[serde(rename = "audiooutput")]
    AudioOutput,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::VideoInput => write!(f, "videoinput"),
            DeviceKind::AudioInput => write!(f, "audioinput"),
            DeviceKind::AudioOutput => write!(f, "audiooutput"),
        }
    }
}

/// Represents a camera device
///
/// The list returned by enumeration is a snapshot. Labels are only populated
/// once the user has granted camera permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDevice {
    pub device_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub kind: DeviceKind,
}

impl CameraDevice {
    /// Label for display, falling back to the device id before permission is granted
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.device_id
        } else {
            &self.label
        }
    }
}

/// Track ready state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Live,
    Ended,
}

/// Playback state of the sink a stream is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Playing,
    Paused,
    Ended,
    /// Not enough data buffered to render the current position
    Starved,
}

impl PlaybackState {
    /// Whether playback needs to be resumed
    pub fn is_stalled(&self) -> bool {
        !matches!(self, PlaybackState::Playing)
    }
}

/// Error reported by the host platform (a DOMException in browsers)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct MediaError {
    /// Platform error name, e.g. `NotAllowedError`
    pub name: String,
    /// Diagnostic message supplied by the platform
    pub message: String,
}

impl MediaError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new("NotAllowedError", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFoundError", message)
    }

    pub fn not_readable(message: impl Into<String>) -> Self {
        Self::new("NotReadableError", message)
    }

    /// Constraint rejection naming the offending constraint
    pub fn overconstrained(constraint: &str) -> Self {
        Self::new(
            "OverconstrainedError",
            format!("Constraint '{}' cannot be satisfied", constraint),
        )
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new("AbortError", message)
    }

    /// Categorize by platform error name
    ///
    /// Legacy names still emitted by some engines map to the same categories.
    pub fn category(&self) -> FailureCategory {
        match self.name.as_str() {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => {
                FailureCategory::AccessDenied
            }
            "NotFoundError" | "DevicesNotFoundError" => FailureCategory::DeviceUnavailable,
            "NotReadableError" | "TrackStartError" | "AbortError" => FailureCategory::DeviceBusy,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                FailureCategory::ConstraintUnsatisfiable
            }
            _ => FailureCategory::Unknown,
        }
    }

    /// A play request interrupted by a newer one; not a real failure
    pub fn is_superseded_request(&self) -> bool {
        self.name == "AbortError"
    }
}

/// A single RGBA frame rendered by a sink
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels
    pub data: Arc<[u8]>,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when the frame was rendered
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Size in bytes of a tightly packed RGBA frame with these dimensions
    pub fn packed_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
