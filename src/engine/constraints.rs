// SPDX-License-Identifier: GPL-3.0-only

//! Constraint building
//!
//! The platform accepts two constraint shapes: basic constraints when a stream
//! is acquired, and advanced constraints on a running track. Only frame rate,
//! resolution and device selection are requested at acquisition; everything
//! else goes through the track. Absent settings are never serialized, so an
//! omitted field leaves the device default in place.

use crate::engine::capabilities::{CapabilityDescriptor, MeteringMode, ResizeMode};
use crate::engine::settings::{DesiredSettings, Dimension, ModeGroup};
use serde::Serialize;

/// A constraint value, either required or preferred
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstrainValue<T> {
    Exact(T),
    Ideal(T),
}

impl<T: Copy> ConstrainValue<T> {
    pub fn value(&self) -> T {
        match self {
            ConstrainValue::Exact(value) | ConstrainValue::Ideal(value) => *value,
        }
    }
}

/// Constraints passed to `getUserMedia`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<ConstrainValue<String>>,
    #[serde(flatten)]
    pub video: VideoFields,
}

/// Acquisition-time video fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstrainValue<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstrainValue<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<ConstrainValue<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<ConstrainValue<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<ResizeMode>,
}

impl StreamConstraints {
    /// Requested device, if any
    pub fn device(&self) -> Option<&str> {
        match &self.device_id {
            Some(ConstrainValue::Exact(id)) | Some(ConstrainValue::Ideal(id)) => Some(id.as_str()),
            None => None,
        }
    }
}

/// Advanced per-track constraint set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_mode: Option<MeteringMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_compensation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<MeteringMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance_mode: Option<MeteringMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<f64>,
}

impl AdvancedConstraints {
    pub fn is_empty(&self) -> bool {
        self == &AdvancedConstraints::default()
    }

    /// Numeric value requested for a dimension
    pub fn number(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::ExposureTime => self.exposure_time,
            Dimension::Iso => self.iso,
            Dimension::ExposureCompensation => self.exposure_compensation,
            Dimension::FocusDistance => self.focus_distance,
            Dimension::ColorTemperature => self.color_temperature,
            Dimension::Zoom => self.zoom,
            Dimension::Brightness => self.brightness,
            Dimension::Contrast => self.contrast,
            Dimension::Saturation => self.saturation,
            Dimension::Sharpness => self.sharpness,
            _ => None,
        }
    }

    /// Mode requested for a mode group
    pub fn mode(&self, group: ModeGroup) -> Option<MeteringMode> {
        match group {
            ModeGroup::Exposure => self.exposure_mode,
            ModeGroup::Focus => self.focus_mode,
            ModeGroup::WhiteBalance => self.white_balance_mode,
        }
    }
}

/// Constraints passed to `applyConstraints` on a running track
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<ResizeMode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advanced: Vec<AdvancedConstraints>,
}

impl TrackConstraints {
    pub fn is_empty(&self) -> bool {
        self.aspect_ratio.is_none() && self.resize_mode.is_none() && self.advanced.is_empty()
    }

    /// Drop everything the device does not report
    ///
    /// Numeric values are kept even when out of range; the platform clamps or
    /// rejects them.
    pub fn retain_supported(mut self, capabilities: &CapabilityDescriptor) -> Self {
        if !capabilities.supports(Dimension::AspectRatio) {
            self.aspect_ratio = None;
        }
        let supported_resize = capabilities.resize_mode.as_deref().unwrap_or_default();
        if self
            .resize_mode
            .is_some_and(|mode| !supported_resize.contains(&mode))
        {
            self.resize_mode = None;
        }

        for set in &mut self.advanced {
            retain_mode(&mut set.exposure_mode, ModeGroup::Exposure, capabilities);
            retain_mode(&mut set.focus_mode, ModeGroup::Focus, capabilities);
            retain_mode(&mut set.white_balance_mode, ModeGroup::WhiteBalance, capabilities);

            retain_number(&mut set.exposure_time, Dimension::ExposureTime, capabilities);
            retain_number(&mut set.iso, Dimension::Iso, capabilities);
            retain_number(
                &mut set.exposure_compensation,
                Dimension::ExposureCompensation,
                capabilities,
            );
            retain_number(&mut set.focus_distance, Dimension::FocusDistance, capabilities);
            retain_number(&mut set.color_temperature, Dimension::ColorTemperature, capabilities);
            retain_number(&mut set.zoom, Dimension::Zoom, capabilities);
            retain_number(&mut set.brightness, Dimension::Brightness, capabilities);
            retain_number(&mut set.contrast, Dimension::Contrast, capabilities);
            retain_number(&mut set.saturation, Dimension::Saturation, capabilities);
            retain_number(&mut set.sharpness, Dimension::Sharpness, capabilities);

            if !capabilities.supports(Dimension::Torch) {
                set.torch = None;
            }
        }
        self.advanced.retain(|set| !set.is_empty());
        self
    }
}

fn retain_mode(slot: &mut Option<MeteringMode>, group: ModeGroup, caps: &CapabilityDescriptor) {
    if slot.is_some_and(|mode| !caps.supports_mode(group, mode)) {
        *slot = None;
    }
}

fn retain_number(slot: &mut Option<f64>, dimension: Dimension, caps: &CapabilityDescriptor) {
    if !caps.supports(dimension) {
        *slot = None;
    }
}

/// Builds platform constraints from desired settings
///
/// Pure: nothing here touches a live track.
pub struct ConstraintBuilder;

impl ConstraintBuilder {
    /// Constraints for a fresh acquisition
    pub fn acquisition(settings: &DesiredSettings) -> StreamConstraints {
        StreamConstraints {
            device_id: settings.device_id.clone().map(ConstrainValue::Exact),
            video: VideoFields {
                width: settings.width.map(ConstrainValue::Ideal),
                height: settings.height.map(ConstrainValue::Ideal),
                frame_rate: settings.frame_rate.map(ConstrainValue::Ideal),
                aspect_ratio: None,
                resize_mode: None,
            },
        }
    }

    /// Constraints for re-acquiring a stream after an in-place change failed
    ///
    /// Also requests aspect ratio and resize mode, which some devices only
    /// honor when choosing the capture resolution.
    pub fn restart(settings: &DesiredSettings) -> StreamConstraints {
        let mut constraints = Self::acquisition(settings);
        constraints.video.aspect_ratio = settings.aspect_ratio.map(ConstrainValue::Ideal);
        constraints.video.resize_mode = settings.resize_mode;
        constraints
    }

    /// Constraints applied to a running track
    pub fn track(settings: &DesiredSettings) -> TrackConstraints {
        let advanced = AdvancedConstraints {
            exposure_mode: settings.exposure_mode,
            exposure_time: settings.exposure_time,
            iso: settings.iso,
            exposure_compensation: settings.exposure_compensation,
            focus_mode: settings.focus_mode,
            focus_distance: settings.focus_distance,
            white_balance_mode: settings.white_balance_mode,
            color_temperature: settings.color_temperature,
            zoom: settings.zoom,
            torch: settings.torch,
            brightness: settings.brightness,
            contrast: settings.contrast,
            saturation: settings.saturation,
            sharpness: settings.sharpness,
        };

        TrackConstraints {
            aspect_ratio: settings.aspect_ratio,
            resize_mode: settings.resize_mode,
            advanced: if advanced.is_empty() {
                Vec::new()
            } else {
                vec![advanced]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capabilities::NumericRange;
    use serde_json::json;

    #[test]
    fn test_absent_fields_are_omitted() {
        let settings = DesiredSettings {
            device_id: Some("cam".into()),
            frame_rate: Some(30.0),
            ..Default::default()
        };
        let stream = serde_json::to_value(ConstraintBuilder::acquisition(&settings)).unwrap();
        assert_eq!(
            stream,
            json!({"deviceId": {"exact": "cam"}, "frameRate": {"ideal": 30.0}})
        );

        let track = serde_json::to_value(ConstraintBuilder::track(&settings)).unwrap();
        assert_eq!(track, json!({}));
        assert!(ConstraintBuilder::track(&settings).is_empty());
    }

    #[test]
    fn test_split_between_stages() {
        let settings = DesiredSettings {
            width: Some(1280),
            height: Some(720),
            aspect_ratio: Some(16.0 / 9.0),
            focus_mode: Some(MeteringMode::Manual),
            focus_distance: Some(0.25),
            torch: Some(false),
            ..Default::default()
        };

        let stream = ConstraintBuilder::acquisition(&settings);
        assert_eq!(stream.device(), None);
        assert_eq!(stream.video.width, Some(ConstrainValue::Ideal(1280)));
        assert_eq!(stream.video.aspect_ratio, None);

        let restart = ConstraintBuilder::restart(&settings);
        assert_eq!(
            restart.video.aspect_ratio.map(|v| v.value()),
            Some(16.0 / 9.0)
        );

        let track = ConstraintBuilder::track(&settings);
        assert_eq!(track.aspect_ratio, Some(16.0 / 9.0));
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(
            json["advanced"],
            json!([{"focusMode": "manual", "focusDistance": 0.25, "torch": false}])
        );
    }

    #[test]
    fn test_retain_supported_drops_unreported_dimensions() {
        let caps = CapabilityDescriptor {
            focus_mode: Some(vec![MeteringMode::Continuous]),
            zoom: Some(NumericRange::new(1.0, 4.0, None)),
            torch: Some(false),
            ..Default::default()
        };
        let settings = DesiredSettings {
            aspect_ratio: Some(1.5),
            focus_mode: Some(MeteringMode::Manual),
            zoom: Some(8.0),
            iso: Some(100.0),
            torch: Some(true),
            ..Default::default()
        };
        let track = ConstraintBuilder::track(&settings).retain_supported(&caps);
        assert_eq!(track.aspect_ratio, None);
        assert_eq!(track.advanced.len(), 1);
        assert_eq!(track.advanced[0].zoom, Some(8.0));
        assert_eq!(track.advanced[0].focus_mode, None);
        assert_eq!(track.advanced[0].iso, None);
        assert_eq!(track.advanced[0].torch, None);

        let nothing = ConstraintBuilder::track(&DesiredSettings {
            iso: Some(100.0),
            ..Default::default()
        })
        .retain_supported(&caps);
        assert!(nothing.is_empty());
    }
}
