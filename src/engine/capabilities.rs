// SPDX-License-Identifier: GPL-3.0-only

//! Capability descriptor normalization
//!
//! Tracks report their capabilities as a loosely-typed object whose fields may
//! be missing, partially populated, or of the wrong type depending on the
//! vendor. [`CapabilityDescriptor::from_raw`] keeps only what is fully valid:
//! a range needs both bounds, mode lists need to be arrays of strings, and
//! nothing is ever synthesized. Every accessor is optional.

use crate::backends::camera::RawCapabilities;
use crate::engine::settings::{Dimension, ModeGroup};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Metering mode shared by exposure, focus and white balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeteringMode {
    None,
    Manual,
    SingleShot,
    Continuous,
}

impl MeteringMode {
    /// Lenient parse of a platform mode string
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Some(MeteringMode::None),
            "manual" => Some(MeteringMode::Manual),
            "single-shot" => Some(MeteringMode::SingleShot),
            "continuous" => Some(MeteringMode::Continuous),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeteringMode::None => "none",
            MeteringMode::Manual => "manual",
            MeteringMode::SingleShot => "single-shot",
            MeteringMode::Continuous => "continuous",
        }
    }
}

impl std::fmt::Display for MeteringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the platform may derive the delivered resolution from the native one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    None,
    CropAndScale,
}

impl ResizeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Some(ResizeMode::None),
            "crop-and-scale" => Some(ResizeMode::CropAndScale),
            _ => None,
        }
    }
}

/// A numeric capability with both bounds known
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl NumericRange {
    pub fn new(min: f64, max: f64, step: Option<f64>) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Normalized capabilities of one device, fetched once per (re)selection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<Vec<ResizeMode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_mode: Option<Vec<MeteringMode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_compensation: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<Vec<MeteringMode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_distance: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance_mode: Option<Vec<MeteringMode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<NumericRange>,
}

impl CapabilityDescriptor {
    /// Normalize a raw capability object
    ///
    /// Never fails: malformed fields are dropped and the descriptor shrinks.
    pub fn from_raw(raw: &RawCapabilities) -> Self {
        Self {
            device_id: text_field(raw, "deviceId"),
            group_id: text_field(raw, "groupId"),
            frame_rate: range_field(raw, "frameRate"),
            width: range_field(raw, "width"),
            height: range_field(raw, "height"),
            aspect_ratio: range_field(raw, "aspectRatio"),
            resize_mode: list_field(raw, "resizeMode", ResizeMode::parse),
            exposure_mode: list_field(raw, "exposureMode", MeteringMode::parse),
            exposure_time: range_field(raw, "exposureTime"),
            iso: range_field(raw, "iso"),
            exposure_compensation: range_field(raw, "exposureCompensation"),
            focus_mode: list_field(raw, "focusMode", MeteringMode::parse),
            focus_distance: range_field(raw, "focusDistance"),
            white_balance_mode: list_field(raw, "whiteBalanceMode", MeteringMode::parse),
            color_temperature: range_field(raw, "colorTemperature"),
            zoom: range_field(raw, "zoom"),
            torch: flag_field(raw, "torch"),
            brightness: range_field(raw, "brightness"),
            contrast: range_field(raw, "contrast"),
            saturation: range_field(raw, "saturation"),
            sharpness: range_field(raw, "sharpness"),
        }
    }

    /// Range for a numeric dimension, if the device reports one
    pub fn range(&self, dimension: Dimension) -> Option<&NumericRange> {
        match dimension {
            Dimension::FrameRate => self.frame_rate.as_ref(),
            Dimension::Width => self.width.as_ref(),
            Dimension::Height => self.height.as_ref(),
            Dimension::AspectRatio => self.aspect_ratio.as_ref(),
            Dimension::ExposureTime => self.exposure_time.as_ref(),
            Dimension::Iso => self.iso.as_ref(),
            Dimension::ExposureCompensation => self.exposure_compensation.as_ref(),
            Dimension::FocusDistance => self.focus_distance.as_ref(),
            Dimension::ColorTemperature => self.color_temperature.as_ref(),
            Dimension::Zoom => self.zoom.as_ref(),
            Dimension::Brightness => self.brightness.as_ref(),
            Dimension::Contrast => self.contrast.as_ref(),
            Dimension::Saturation => self.saturation.as_ref(),
            Dimension::Sharpness => self.sharpness.as_ref(),
            Dimension::ResizeMode
            | Dimension::ExposureMode
            | Dimension::FocusMode
            | Dimension::WhiteBalanceMode
            | Dimension::Torch => None,
        }
    }

    /// Modes reported for a mode group
    pub fn modes(&self, group: ModeGroup) -> Option<&[MeteringMode]> {
        match group {
            ModeGroup::Exposure => self.exposure_mode.as_deref(),
            ModeGroup::Focus => self.focus_mode.as_deref(),
            ModeGroup::WhiteBalance => self.white_balance_mode.as_deref(),
        }
    }

    pub fn supports_mode(&self, group: ModeGroup, mode: MeteringMode) -> bool {
        self.modes(group).is_some_and(|modes| modes.contains(&mode))
    }

    /// Whether the device reports the dimension at all
    pub fn supports(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::ResizeMode => self.resize_mode.is_some(),
            Dimension::ExposureMode => self.exposure_mode.is_some(),
            Dimension::FocusMode => self.focus_mode.is_some(),
            Dimension::WhiteBalanceMode => self.white_balance_mode.is_some(),
            Dimension::Torch => self.torch == Some(true),
            other => self.range(other).is_some(),
        }
    }

    /// Check if any manual exposure, focus or white balance control is available
    pub fn has_any_manual_controls(&self) -> bool {
        ModeGroup::ALL
            .iter()
            .any(|group| self.supports_mode(*group, MeteringMode::Manual))
    }
}

fn text_field(raw: &RawCapabilities, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn range_field(raw: &RawCapabilities, key: &str) -> Option<NumericRange> {
    let Value::Object(range) = raw.get(key)? else {
        debug!(field = key, "Dropping capability: not a range object");
        return None;
    };

    let min = range.get("min").and_then(Value::as_f64).filter(|v| v.is_finite());
    let max = range.get("max").and_then(Value::as_f64).filter(|v| v.is_finite());
    let (Some(min), Some(max)) = (min, max) else {
        debug!(field = key, "Dropping capability: range is missing a bound");
        return None;
    };
    if min > max {
        debug!(field = key, min, max, "Dropping capability: inverted range");
        return None;
    }

    let step = range
        .get("step")
        .and_then(Value::as_f64)
        .filter(|step| step.is_finite() && *step > 0.0);

    Some(NumericRange { min, max, step })
}

fn list_field<T: PartialEq>(
    raw: &RawCapabilities,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Option<Vec<T>> {
    let Value::Array(items) = raw.get(key)? else {
        debug!(field = key, "Dropping capability: not a list");
        return None;
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str().and_then(parse) {
            Some(value) if !parsed.contains(&value) => parsed.push(value),
            Some(_) => {}
            None => debug!(field = key, value = %item, "Ignoring unrecognised mode"),
        }
    }
    Some(parsed)
}

fn flag_field(raw: &RawCapabilities, key: &str) -> Option<bool> {
    match raw.get(key)? {
        Value::Bool(flag) => Some(*flag),
        // Some engines report the set of settable values instead of a flag
        Value::Array(values) => Some(values.iter().any(|v| v.as_bool() == Some(true))),
        _ => None,
    }
}
