// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Inspecting capabilities
//! - Applying settings
//! - Taking snapshots
//!
//! All commands run against the virtual camera backend.

use camera_controls::backends::camera::CameraDevice;
use camera_controls::backends::virtual_camera::{DeviceProfile, VirtualMediaDevices, VirtualSink};
use camera_controls::constants::{capture::DEFAULT_SAVE_FOLDER, get_resolution_label};
use camera_controls::pipelines::photo::save_snapshot;
use camera_controls::{AppError, AppResult, Config, SessionSupervisor, SettingsDelta};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Supervisor wired to the virtual backend
pub struct Context {
    pub supervisor: SessionSupervisor,
}

impl Context {
    pub fn new(profile: Option<&Path>, config: Config) -> AppResult<Self> {
        let profiles = match profile {
            Some(path) => DeviceProfile::load_all(path)?,
            None => DeviceProfile::builtin(),
        };
        let devices = Arc::new(VirtualMediaDevices::new(profiles));
        let sink = Arc::new(VirtualSink::new());
        Ok(Self {
            supervisor: SessionSupervisor::new(devices, sink, config),
        })
    }

    async fn open_camera(&self, camera_index: usize) -> AppResult<CameraDevice> {
        let cameras = self.supervisor.list_devices().await?;
        if cameras.is_empty() {
            return Err("No cameras found".into());
        }
        let camera = cameras.get(camera_index).cloned().ok_or_else(|| {
            AppError::Other(format!(
                "Camera index {} out of range (0-{})",
                camera_index,
                cameras.len() - 1
            ))
        })?;

        self.supervisor.select_device(&camera.device_id).await?;
        Ok(camera)
    }
}

/// List all available cameras
pub async fn list_cameras(context: &Context) -> CliResult {
    let cameras = context.supervisor.list_devices().await?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.display_name());
        if !camera.group_id.is_empty() {
            println!("      Group: {}", camera.group_id);
        }
    }

    Ok(())
}

/// Print the normalized capabilities and default settings of a camera
pub async fn show_capabilities(context: &Context, camera_index: usize) -> CliResult {
    let camera = context.open_camera(camera_index).await?;
    println!("Using camera: {}", camera.display_name());

    let capabilities = context
        .supervisor
        .capabilities()
        .ok_or("Camera has no live session")?;
    println!("Capabilities:");
    println!("{}", serde_json::to_string_pretty(&capabilities)?);

    if let Some(settings) = context.supervisor.settings() {
        println!("Default settings:");
        println!("{}", serde_json::to_string_pretty(&settings)?);
    }
    if !capabilities.has_any_manual_controls() {
        println!("No manual exposure, focus or white balance controls.");
    }
    Ok(())
}

/// Apply settings and print commanded and applied settings
pub async fn apply_settings(context: &Context, camera_index: usize, sets: &[String]) -> CliResult {
    let delta = parse_assignments(sets)?;
    let camera = context.open_camera(camera_index).await?;
    println!("Using camera: {}", camera.display_name());

    let settings = context.supervisor.apply_settings(&delta).await?;
    println!("Commanded settings:");
    println!("{}", serde_json::to_string_pretty(&settings)?);

    if let Some(applied) = context.supervisor.applied_settings().await {
        println!("Track settings:");
        println!("{}", serde_json::to_string_pretty(&applied)?);
    }
    Ok(())
}

/// Take a snapshot using the specified camera
pub async fn take_snapshot(
    context: &Context,
    camera_index: usize,
    output: Option<PathBuf>,
    sets: &[String],
) -> CliResult {
    let delta = parse_assignments(sets)?;
    let camera = context.open_camera(camera_index).await?;
    println!("Using camera: {}", camera.display_name());

    if !delta.is_empty() {
        context.supervisor.apply_settings(&delta).await?;
    }

    println!("Capturing...");
    let image = context.supervisor.capture_frame()?;
    let label = get_resolution_label(image.width())
        .map(|label| format!(" ({})", label))
        .unwrap_or_default();
    println!("Capture size: {}x{}{}", image.width(), image.height(), label);

    let output = match output {
        Some(output) => output,
        None => {
            let dir = get_default_photo_dir();
            std::fs::create_dir_all(&dir)?;
            dir
        }
    };
    let path = save_snapshot(image, &output).await?;
    println!("Snapshot saved: {}", path.display());
    Ok(())
}

/// Build a settings delta from `key=value` arguments
///
/// Values are read as JSON when possible (`30`, `true`, `null`), otherwise as
/// strings (`manual`).
pub fn parse_assignments(sets: &[String]) -> AppResult<SettingsDelta> {
    let mut fields = Map::new();
    for set in sets {
        let (key, value) = set
            .split_once('=')
            .ok_or_else(|| AppError::Other(format!("Expected KEY=VALUE, got '{}'", set)))?;
        let value = serde_json::from_str::<Value>(value.trim())
            .unwrap_or_else(|_| Value::String(value.trim().to_string()));
        fields.insert(key.trim().to_string(), value);
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::Other(format!("Invalid settings: {}", e)))
}

fn get_default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SAVE_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_controls::{MeteringMode, Patch};

    #[test]
    fn test_parse_assignments() {
        let delta = parse_assignments(&[
            "focusMode=manual".to_string(),
            "zoom=2".to_string(),
            "iso=null".to_string(),
        ])
        .unwrap();
        assert_eq!(delta.focus_mode, Patch::Set(MeteringMode::Manual));
        assert_eq!(delta.zoom, Patch::Set(2.0));
        assert_eq!(delta.iso, Patch::Clear);
    }

    #[test]
    fn test_parse_assignments_rejects_garbage() {
        assert!(parse_assignments(&["zoom".to_string()]).is_err());
        assert!(parse_assignments(&["warpDrive=1".to_string()]).is_err());
    }
}
