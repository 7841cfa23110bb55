// SPDX-License-Identifier: GPL-3.0-only

//! Desired settings and mode-group reconciliation
//!
//! [`DesiredSettings`] is the commanded state of a session, not the achieved
//! one. It is only mutated through [`DesiredSettings::merge`], which keeps every
//! mode group consistent: an explicit manual value always comes with the
//! group's mode set to `manual`, and the mode only returns to `continuous`
//! once the last manual value of the group is cleared.

use crate::engine::capabilities::{CapabilityDescriptor, MeteringMode, ResizeMode};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Controllable dimension of a video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    FrameRate,
    Width,
    Height,
    AspectRatio,
    ResizeMode,
    ExposureMode,
    ExposureTime,
    Iso,
    ExposureCompensation,
    FocusMode,
    FocusDistance,
    WhiteBalanceMode,
    ColorTemperature,
    Zoom,
    Torch,
    Brightness,
    Contrast,
    Saturation,
    Sharpness,
}

/// When a dimension can be requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStage {
    /// Only when acquiring a stream
    Acquisition,
    /// On a running track
    Track,
}

impl Dimension {
    pub const ALL: [Dimension; 19] = [
        Dimension::FrameRate,
        Dimension::Width,
        Dimension::Height,
        Dimension::AspectRatio,
        Dimension::ResizeMode,
        Dimension::ExposureMode,
        Dimension::ExposureTime,
        Dimension::Iso,
        Dimension::ExposureCompensation,
        Dimension::FocusMode,
        Dimension::FocusDistance,
        Dimension::WhiteBalanceMode,
        Dimension::ColorTemperature,
        Dimension::Zoom,
        Dimension::Torch,
        Dimension::Brightness,
        Dimension::Contrast,
        Dimension::Saturation,
        Dimension::Sharpness,
    ];

    pub fn stage(self) -> ConstraintStage {
        match self {
            Dimension::FrameRate | Dimension::Width | Dimension::Height => {
                ConstraintStage::Acquisition
            }
            _ => ConstraintStage::Track,
        }
    }

    /// Platform constraint name
    pub fn key(self) -> &'static str {
        match self {
            Dimension::FrameRate => "frameRate",
            Dimension::Width => "width",
            Dimension::Height => "height",
            Dimension::AspectRatio => "aspectRatio",
            Dimension::ResizeMode => "resizeMode",
            Dimension::ExposureMode => "exposureMode",
            Dimension::ExposureTime => "exposureTime",
            Dimension::Iso => "iso",
            Dimension::ExposureCompensation => "exposureCompensation",
            Dimension::FocusMode => "focusMode",
            Dimension::FocusDistance => "focusDistance",
            Dimension::WhiteBalanceMode => "whiteBalanceMode",
            Dimension::ColorTemperature => "colorTemperature",
            Dimension::Zoom => "zoom",
            Dimension::Torch => "torch",
            Dimension::Brightness => "brightness",
            Dimension::Contrast => "contrast",
            Dimension::Saturation => "saturation",
            Dimension::Sharpness => "sharpness",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A mode dimension together with the manual values that depend on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeGroup {
    Exposure,
    Focus,
    WhiteBalance,
}

impl ModeGroup {
    pub const ALL: [ModeGroup; 3] = [
        ModeGroup::Exposure,
        ModeGroup::Focus,
        ModeGroup::WhiteBalance,
    ];

    pub fn mode_dimension(self) -> Dimension {
        match self {
            ModeGroup::Exposure => Dimension::ExposureMode,
            ModeGroup::Focus => Dimension::FocusMode,
            ModeGroup::WhiteBalance => Dimension::WhiteBalanceMode,
        }
    }

    /// Values that only take effect in manual mode
    pub fn manual_dimensions(self) -> &'static [Dimension] {
        match self {
            ModeGroup::Exposure => &[
                Dimension::ExposureTime,
                Dimension::Iso,
                Dimension::ExposureCompensation,
            ],
            ModeGroup::Focus => &[Dimension::FocusDistance],
            ModeGroup::WhiteBalance => &[Dimension::ColorTemperature],
        }
    }
}

/// Value of a single dimension, used for comparisons
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Number(f64),
    Pixels(u32),
    Mode(MeteringMode),
    Resize(ResizeMode),
    Flag(bool),
}

/// Currently commanded settings of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesiredSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<ResizeMode>,
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

/// How a settings record is adopted by a newly opened session
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsSeed {
    /// Fresh selection: carry values forward, recompute mode defaults
    CarryForward(DesiredSettings),
    /// Recovery: reuse the settings exactly as they were
    Restore(DesiredSettings),
}

impl DesiredSettings {
    pub fn value(&self, dimension: Dimension) -> Option<SettingValue> {
        use SettingValue::*;
        match dimension {
            Dimension::FrameRate => self.frame_rate.map(Number),
            Dimension::Width => self.width.map(Pixels),
            Dimension::Height => self.height.map(Pixels),
            Dimension::AspectRatio => self.aspect_ratio.map(Number),
            Dimension::ResizeMode => self.resize_mode.map(Resize),
            Dimension::ExposureMode => self.exposure_mode.map(Mode),
            Dimension::ExposureTime => self.exposure_time.map(Number),
            Dimension::Iso => self.iso.map(Number),
            Dimension::ExposureCompensation => self.exposure_compensation.map(Number),
            Dimension::FocusMode => self.focus_mode.map(Mode),
            Dimension::FocusDistance => self.focus_distance.map(Number),
            Dimension::WhiteBalanceMode => self.white_balance_mode.map(Mode),
            Dimension::ColorTemperature => self.color_temperature.map(Number),
            Dimension::Zoom => self.zoom.map(Number),
            Dimension::Torch => self.torch.map(Flag),
            Dimension::Brightness => self.brightness.map(Number),
            Dimension::Contrast => self.contrast.map(Number),
            Dimension::Saturation => self.saturation.map(Number),
            Dimension::Sharpness => self.sharpness.map(Number),
        }
    }

    pub fn mode(&self, group: ModeGroup) -> Option<MeteringMode> {
        match group {
            ModeGroup::Exposure => self.exposure_mode,
            ModeGroup::Focus => self.focus_mode,
            ModeGroup::WhiteBalance => self.white_balance_mode,
        }
    }

    fn set_mode(&mut self, group: ModeGroup, mode: Option<MeteringMode>) {
        match group {
            ModeGroup::Exposure => self.exposure_mode = mode,
            ModeGroup::Focus => self.focus_mode = mode,
            ModeGroup::WhiteBalance => self.white_balance_mode = mode,
        }
    }

    fn clear_manual_values(&mut self, group: ModeGroup) {
        match group {
            ModeGroup::Exposure => {
                self.exposure_time = None;
                self.iso = None;
                self.exposure_compensation = None;
            }
            ModeGroup::Focus => self.focus_distance = None,
            ModeGroup::WhiteBalance => self.color_temperature = None,
        }
    }

    /// Whether any manual-only value of the group is set
    pub fn has_manual_value(&self, group: ModeGroup) -> bool {
        group
            .manual_dimensions()
            .iter()
            .any(|dimension| self.value(*dimension).is_some())
    }

    /// Dimensions whose value differs between `self` and `other`
    pub fn diff(&self, other: &DesiredSettings) -> BTreeSet<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|dimension| self.value(*dimension) != other.value(*dimension))
            .collect()
    }

    /// Merge a delta into a copy of these settings, reconciling mode groups
    ///
    /// `capabilities` decides whether a group can fall back to `continuous`
    /// once its last manual value is cleared.
    pub fn merge(
        &self,
        delta: &SettingsDelta,
        capabilities: Option<&CapabilityDescriptor>,
    ) -> DesiredSettings {
        let mut next = self.clone();
        let touched = next.patch(delta);
        next.reconcile_modes(&touched, capabilities);
        next
    }

    fn patch(&mut self, delta: &SettingsDelta) -> BTreeSet<Dimension> {
        let mut touched = BTreeSet::new();
        let mut track = |changed: bool, dimension: Dimension| {
            if changed {
                touched.insert(dimension);
            }
        };

        track(delta.frame_rate.apply_to(&mut self.frame_rate), Dimension::FrameRate);
        track(delta.width.apply_to(&mut self.width), Dimension::Width);
        track(delta.height.apply_to(&mut self.height), Dimension::Height);
        track(delta.aspect_ratio.apply_to(&mut self.aspect_ratio), Dimension::AspectRatio);
        track(delta.resize_mode.apply_to(&mut self.resize_mode), Dimension::ResizeMode);
        track(delta.exposure_mode.apply_to(&mut self.exposure_mode), Dimension::ExposureMode);
        track(delta.exposure_time.apply_to(&mut self.exposure_time), Dimension::ExposureTime);
        track(delta.iso.apply_to(&mut self.iso), Dimension::Iso);
        track(
            delta
                .exposure_compensation
                .apply_to(&mut self.exposure_compensation),
            Dimension::ExposureCompensation,
        );
        track(delta.focus_mode.apply_to(&mut self.focus_mode), Dimension::FocusMode);
        track(delta.focus_distance.apply_to(&mut self.focus_distance), Dimension::FocusDistance);
        track(
            delta.white_balance_mode.apply_to(&mut self.white_balance_mode),
            Dimension::WhiteBalanceMode,
        );
        track(
            delta.color_temperature.apply_to(&mut self.color_temperature),
            Dimension::ColorTemperature,
        );
        track(delta.zoom.apply_to(&mut self.zoom), Dimension::Zoom);
        track(delta.torch.apply_to(&mut self.torch), Dimension::Torch);
        track(delta.brightness.apply_to(&mut self.brightness), Dimension::Brightness);
        track(delta.contrast.apply_to(&mut self.contrast), Dimension::Contrast);
        track(delta.saturation.apply_to(&mut self.saturation), Dimension::Saturation);
        track(delta.sharpness.apply_to(&mut self.sharpness), Dimension::Sharpness);

        touched
    }

    fn reconcile_modes(
        &mut self,
        touched: &BTreeSet<Dimension>,
        capabilities: Option<&CapabilityDescriptor>,
    ) {
        for group in ModeGroup::ALL {
            let manual_touched: Vec<Dimension> = group
                .manual_dimensions()
                .iter()
                .copied()
                .filter(|dimension| touched.contains(dimension))
                .collect();
            let manual_set = manual_touched
                .iter()
                .any(|dimension| self.value(*dimension).is_some());
            let manual_cleared = manual_touched
                .iter()
                .any(|dimension| self.value(*dimension).is_none());
            let mode_touched = touched.contains(&group.mode_dimension());

            if manual_set {
                self.set_mode(group, Some(MeteringMode::Manual));
            } else if mode_touched && self.mode(group) != Some(MeteringMode::Manual) {
                self.clear_manual_values(group);
            } else if manual_cleared
                && !self.has_manual_value(group)
                && self.mode(group) == Some(MeteringMode::Manual)
            {
                let continuous = capabilities
                    .is_some_and(|caps| caps.supports_mode(group, MeteringMode::Continuous));
                self.set_mode(group, continuous.then_some(MeteringMode::Continuous));
            }
        }
    }

    /// Adopt these settings for a freshly opened device
    ///
    /// Values are carried forward. Frame rate falls back to `default_frame_rate`
    /// clamped to the device range. Each mode group keeps a mode the device
    /// supports, otherwise becomes `manual` if it has manual values, otherwise
    /// `continuous` if supported, otherwise absent.
    pub fn for_device(
        &self,
        device_id: &str,
        capabilities: &CapabilityDescriptor,
        default_frame_rate: f64,
    ) -> DesiredSettings {
        let mut next = self.clone();
        next.device_id = Some(device_id.to_string());

        if next.frame_rate.is_none() {
            next.frame_rate = capabilities
                .frame_rate
                .map(|range| range.clamp(default_frame_rate));
        }

        for group in ModeGroup::ALL {
            let has_manual = next.has_manual_value(group);
            let keep = match next.mode(group) {
                Some(MeteringMode::Manual) => {
                    has_manual && capabilities.supports_mode(group, MeteringMode::Manual)
                }
                Some(mode) => !has_manual && capabilities.supports_mode(group, mode),
                None => false,
            };
            if keep {
                continue;
            }

            let mode = if has_manual && capabilities.supports_mode(group, MeteringMode::Manual) {
                Some(MeteringMode::Manual)
            } else if capabilities.supports_mode(group, MeteringMode::Continuous) {
                next.clear_manual_values(group);
                Some(MeteringMode::Continuous)
            } else {
                None
            };
            next.set_mode(group, mode);
        }

        next
    }

    /// Acquisition-time subset with recomputed mode defaults
    ///
    /// Used to narrow a request the device rejected at open.
    pub fn narrowed(&self, capabilities: &CapabilityDescriptor) -> DesiredSettings {
        let base = DesiredSettings {
            device_id: self.device_id.clone(),
            frame_rate: self.frame_rate,
            width: self.width,
            height: self.height,
            ..Default::default()
        };
        let default_frame_rate = self.frame_rate.unwrap_or(crate::constants::DEFAULT_FRAME_RATE);
        let device_id = self.device_id.clone().unwrap_or_default();
        base.for_device(&device_id, capabilities, default_frame_rate)
    }
}

/// Change to a single field of [`DesiredSettings`]
///
/// Deserializes a missing key as `Keep` (with `#[serde(default)]`), `null` as
/// `Clear`, and any other value as `Set`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Patch<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T: Clone> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Write the patch into `slot`, returning whether the field was addressed
    fn apply_to(&self, slot: &mut Option<T>) -> bool {
        match self {
            Patch::Keep => false,
            Patch::Set(value) => {
                *slot = Some(value.clone());
                true
            }
            Patch::Clear => {
                *slot = None;
                true
            }
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

/// Sparse settings change requested by the UI
///
/// The device is not part of a delta; switching devices goes through the
/// session supervisor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SettingsDelta {
    pub frame_rate: Patch<f64>,
    pub width: Patch<u32>,
    pub height: Patch<u32>,
    pub aspect_ratio: Patch<f64>,
    pub resize_mode: Patch<ResizeMode>,
    pub exposure_mode: Patch<MeteringMode>,
    pub exposure_time: Patch<f64>,
    pub iso: Patch<f64>,
    pub exposure_compensation: Patch<f64>,
    pub focus_mode: Patch<MeteringMode>,
    pub focus_distance: Patch<f64>,
    pub white_balance_mode: Patch<MeteringMode>,
    pub color_temperature: Patch<f64>,
    pub zoom: Patch<f64>,
    pub torch: Patch<bool>,
    pub brightness: Patch<f64>,
    pub contrast: Patch<f64>,
    pub saturation: Patch<f64>,
    pub sharpness: Patch<f64>,
}

impl SettingsDelta {
    /// Whether the delta addresses no field at all
    pub fn is_empty(&self) -> bool {
        self == &SettingsDelta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capabilities::NumericRange;

    fn manual_capable() -> CapabilityDescriptor {
        CapabilityDescriptor {
            frame_rate: Some(NumericRange::new(15.0, 30.0, None)),
            exposure_mode: Some(vec![MeteringMode::Continuous, MeteringMode::Manual]),
            exposure_time: Some(NumericRange::new(1.0, 1000.0, None)),
            iso: Some(NumericRange::new(100.0, 3200.0, None)),
            focus_mode: Some(vec![MeteringMode::Continuous, MeteringMode::Manual]),
            focus_distance: Some(NumericRange::new(0.0, 1.0, Some(0.01))),
            white_balance_mode: Some(vec![MeteringMode::Manual]),
            color_temperature: Some(NumericRange::new(2500.0, 7500.0, None)),
            ..Default::default()
        }
    }

    fn continuous() -> DesiredSettings {
        DesiredSettings {
            exposure_mode: Some(MeteringMode::Continuous),
            focus_mode: Some(MeteringMode::Continuous),
            ..Default::default()
        }
    }

    #[test]
    fn test_manual_value_forces_manual_mode() {
        let caps = manual_capable();
        let delta = SettingsDelta {
            exposure_time: Patch::Set(8.0),
            ..Default::default()
        };
        let next = continuous().merge(&delta, Some(&caps));
        assert_eq!(next.exposure_mode, Some(MeteringMode::Manual));
        assert_eq!(next.exposure_time, Some(8.0));
        assert_eq!(next.focus_mode, Some(MeteringMode::Continuous));
    }

    #[test]
    fn test_clearing_one_of_two_manual_values_keeps_manual() {
        let caps = manual_capable();
        let both = continuous().merge(
            &SettingsDelta {
                iso: Patch::Set(400.0),
                exposure_time: Patch::Set(8.0),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(both.exposure_mode, Some(MeteringMode::Manual));

        let iso_cleared = both.merge(
            &SettingsDelta {
                iso: Patch::Clear,
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(iso_cleared.iso, None);
        assert_eq!(iso_cleared.exposure_mode, Some(MeteringMode::Manual));

        let all_cleared = iso_cleared.merge(
            &SettingsDelta {
                exposure_time: Patch::Clear,
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(all_cleared.exposure_time, None);
        assert_eq!(all_cleared.exposure_mode, Some(MeteringMode::Continuous));
    }

    #[test]
    fn test_exposure_compensation_is_a_manual_exposure_value() {
        let caps = CapabilityDescriptor {
            exposure_compensation: Some(NumericRange::new(-2.0, 2.0, Some(0.5))),
            ..manual_capable()
        };
        let both = continuous().merge(
            &SettingsDelta {
                iso: Patch::Set(400.0),
                exposure_compensation: Patch::Set(1.0),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(both.exposure_mode, Some(MeteringMode::Manual));

        let iso_cleared = both.merge(
            &SettingsDelta {
                iso: Patch::Clear,
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(iso_cleared.exposure_mode, Some(MeteringMode::Manual));
        assert_eq!(iso_cleared.exposure_compensation, Some(1.0));

        let auto = iso_cleared.merge(
            &SettingsDelta {
                exposure_mode: Patch::Set(MeteringMode::Continuous),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(auto.exposure_mode, Some(MeteringMode::Continuous));
        assert_eq!(auto.exposure_compensation, None);
    }

    #[test]
    fn test_clearing_without_continuous_support_leaves_mode_absent() {
        let caps = manual_capable();
        let set = DesiredSettings::default().merge(
            &SettingsDelta {
                color_temperature: Patch::Set(5000.0),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(set.white_balance_mode, Some(MeteringMode::Manual));

        let cleared = set.merge(
            &SettingsDelta {
                color_temperature: Patch::Clear,
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(cleared.white_balance_mode, None);
    }

    #[test]
    fn test_explicit_auto_mode_clears_manual_values() {
        let caps = manual_capable();
        let manual = continuous().merge(
            &SettingsDelta {
                focus_distance: Patch::Set(0.3),
                ..Default::default()
            },
            Some(&caps),
        );
        let auto = manual.merge(
            &SettingsDelta {
                focus_mode: Patch::Set(MeteringMode::Continuous),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(auto.focus_mode, Some(MeteringMode::Continuous));
        assert_eq!(auto.focus_distance, None);
    }

    #[test]
    fn test_manual_value_wins_over_auto_mode_in_same_delta() {
        let caps = manual_capable();
        let next = continuous().merge(
            &SettingsDelta {
                focus_mode: Patch::Set(MeteringMode::Continuous),
                focus_distance: Patch::Set(0.5),
                ..Default::default()
            },
            Some(&caps),
        );
        assert_eq!(next.focus_mode, Some(MeteringMode::Manual));
        assert_eq!(next.focus_distance, Some(0.5));
    }

    #[test]
    fn test_empty_delta_is_noop() {
        let caps = manual_capable();
        let settings = continuous().merge(
            &SettingsDelta {
                iso: Patch::Set(800.0),
                zoom: Patch::Set(2.0),
                ..Default::default()
            },
            Some(&caps),
        );
        let delta = SettingsDelta::default();
        assert!(delta.is_empty());
        assert_eq!(settings.merge(&delta, Some(&caps)), settings);
    }

    #[test]
    fn test_for_device_defaults() {
        let caps = manual_capable();
        let settings = DesiredSettings::default().for_device("cam", &caps, 60.0);
        assert_eq!(settings.device_id.as_deref(), Some("cam"));
        assert_eq!(settings.frame_rate, Some(30.0));
        assert_eq!(settings.exposure_mode, Some(MeteringMode::Continuous));
        assert_eq!(settings.focus_mode, Some(MeteringMode::Continuous));
        assert_eq!(settings.white_balance_mode, None);
    }

    #[test]
    fn test_for_device_carries_values_forward() {
        let caps = manual_capable();
        let previous = DesiredSettings {
            device_id: Some("old".into()),
            frame_rate: Some(24.0),
            exposure_mode: Some(MeteringMode::Manual),
            exposure_time: Some(10.0),
            focus_mode: Some(MeteringMode::SingleShot),
            ..Default::default()
        };
        let next = previous.for_device("new", &caps, 30.0);
        assert_eq!(next.device_id.as_deref(), Some("new"));
        assert_eq!(next.frame_rate, Some(24.0));
        assert_eq!(next.exposure_mode, Some(MeteringMode::Manual));
        assert_eq!(next.exposure_time, Some(10.0));
        // single-shot is not supported by the new device
        assert_eq!(next.focus_mode, Some(MeteringMode::Continuous));
    }

    #[test]
    fn test_for_device_drops_manual_values_without_manual_support() {
        let caps = CapabilityDescriptor {
            focus_mode: Some(vec![MeteringMode::Continuous]),
            ..Default::default()
        };
        let previous = DesiredSettings {
            focus_mode: Some(MeteringMode::Manual),
            focus_distance: Some(0.2),
            ..Default::default()
        };
        let next = previous.for_device("cam", &caps, 30.0);
        assert_eq!(next.focus_mode, Some(MeteringMode::Continuous));
        assert_eq!(next.focus_distance, None);
    }

    #[test]
    fn test_delta_from_json() {
        let delta: SettingsDelta =
            serde_json::from_str(r#"{"iso": 200, "exposureTime": null, "focusMode": "manual"}"#)
                .unwrap();
        assert_eq!(delta.iso, Patch::Set(200.0));
        assert_eq!(delta.exposure_time, Patch::Clear);
        assert_eq!(delta.focus_mode, Patch::Set(MeteringMode::Manual));
        assert!(delta.zoom.is_keep());

        let unknown = serde_json::from_str::<SettingsDelta>(r#"{"deviceId": "x"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_diff_reports_changed_dimensions() {
        let a = DesiredSettings {
            zoom: Some(1.0),
            width: Some(640),
            ..Default::default()
        };
        let b = DesiredSettings {
            zoom: Some(2.0),
            width: Some(640),
            torch: Some(true),
            ..Default::default()
        };
        let diff: Vec<Dimension> = a.diff(&b).into_iter().collect();
        assert_eq!(diff, vec![Dimension::Zoom, Dimension::Torch]);
    }
}
