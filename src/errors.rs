// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera controls engine

use serde::Serialize;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Session lifecycle errors
    #[error("Camera error: {0}")]
    Supervisor(#[from] SupervisorError),
    /// Snapshot errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Filesystem errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// Image encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

/// Categorized cause of a failed acquisition or constraint application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureCategory {
    /// Permission declined by the user or blocked by policy
    AccessDenied,
    /// No matching device (e.g. unplugged after enumeration)
    DeviceUnavailable,
    /// Device held by another consumer
    DeviceBusy,
    /// Requested settings combination not supported by the device
    ConstraintUnsatisfiable,
    /// Anything else
    Unknown,
}

impl FailureCategory {
    /// Get display name for UI
    pub fn display_name(self) -> &'static str {
        match self {
            FailureCategory::AccessDenied => "Camera access denied",
            FailureCategory::DeviceUnavailable => "Camera not found",
            FailureCategory::DeviceBusy => "Camera is in use",
            FailureCategory::ConstraintUnsatisfiable => "Settings not supported",
            FailureCategory::Unknown => "Camera error",
        }
    }

    /// Whether retrying later without user action outside the app can succeed
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureCategory::AccessDenied)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Display-ready failure: category plus the platform's diagnostic detail
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{category}: {detail}")]
pub struct AcquisitionFailure {
    pub category: FailureCategory,
    pub detail: String,
}

impl From<crate::backends::camera::MediaError> for AcquisitionFailure {
    fn from(err: crate::backends::camera::MediaError) -> Self {
        Self {
            category: err.category(),
            detail: err.to_string(),
        }
    }
}

/// Errors from applying a settings change to a live session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// The change was rejected; the session is running with its previous settings
    #[error("Settings rejected, previous settings restored: {cause}")]
    Reverted { cause: AcquisitionFailure },
    /// The change was rejected and the previous settings could not be restored
    #[error("Session lost while applying settings: {cause}")]
    SessionLost { cause: AcquisitionFailure },
    /// The session was torn down or superseded while the change was in flight
    #[error("Session was abandoned")]
    Abandoned,
}

/// Still-frame snapshot errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No live session to capture from
    #[error("No live camera session")]
    NoSession,
    /// The sink has not rendered a frame yet
    #[error("No frame available for capture")]
    NoFrame,
    /// The rendered frame buffer does not match its dimensions
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
}

/// Session lifecycle errors surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// Acquisition failed; the session is in the `Failed` state
    #[error("{0}")]
    Acquisition(#[from] AcquisitionFailure),
    /// A settings change failed
    #[error("{0}")]
    Settings(#[from] SettingsError),
    /// A snapshot failed
    #[error("{0}")]
    Capture(#[from] CaptureError),
    /// A newer selection or a teardown took over while this one was in flight
    #[error("Superseded by a newer camera request")]
    Superseded,
    /// The operation needs a live session
    #[error("No live camera session")]
    NoSession,
    /// Enumeration returned no video input devices
    #[error("No camera devices found")]
    NoDevices,
    /// Switching needs at least two devices
    #[error("No other camera to switch to")]
    NoOtherDevice,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::MediaError;

    #[test]
    fn test_failure_from_media_error() {
        let failure =
            AcquisitionFailure::from(MediaError::not_readable("Could not start video source"));
        assert_eq!(failure.category, FailureCategory::DeviceBusy);
        assert!(failure.detail.contains("Could not start video source"));
        assert_eq!(
            failure.to_string(),
            "Camera is in use: NotReadableError: Could not start video source"
        );
    }

    #[test]
    fn test_access_denied_not_retryable() {
        assert!(!FailureCategory::AccessDenied.is_retryable());
        assert!(FailureCategory::DeviceBusy.is_retryable());
    }
}
