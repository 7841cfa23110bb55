// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for settings application against the virtual camera

use camera_controls::backends::camera::{DeviceKind, MediaError};
use camera_controls::backends::virtual_camera::{DeviceProfile, VirtualMediaDevices, VirtualSink};
use camera_controls::errors::SettingsError;
use camera_controls::{
    AspectRatioPolicy, Config, DesiredSettings, MeteringMode, Patch, SessionState,
    SessionSupervisor, SettingsDelta, SupervisorError,
};
use serde_json::json;
use std::sync::Arc;

const FRONT: &str = "virtual-front";
const REAR: &str = "virtual-rear";

fn test_config() -> Config {
    Config {
        settle_delay_ms: 0,
        ..Config::default()
    }
}

fn setup_with(
    profiles: Vec<DeviceProfile>,
    config: Config,
) -> (SessionSupervisor, Arc<VirtualMediaDevices>, Arc<VirtualSink>) {
    let devices = Arc::new(VirtualMediaDevices::new(profiles));
    let sink = Arc::new(VirtualSink::new());
    let supervisor = SessionSupervisor::new(devices.clone(), sink.clone(), config);
    (supervisor, devices, sink)
}

fn setup() -> (SessionSupervisor, Arc<VirtualMediaDevices>, Arc<VirtualSink>) {
    setup_with(DeviceProfile::builtin(), test_config())
}

#[tokio::test]
async fn test_default_settings_and_manual_focus() {
    let profile = DeviceProfile::new(
        "cam",
        "Test Camera",
        "group",
        DeviceKind::VideoInput,
        json!({
            "frameRate": {"min": 15, "max": 30},
            "focusMode": ["continuous", "manual"],
            "focusDistance": {"min": 0, "max": 1, "step": 0.01}
        }),
    );
    let (supervisor, devices, _sink) = setup_with(vec![profile], test_config());

    supervisor.select_device("cam").await.unwrap();
    let defaults = supervisor.settings().unwrap();
    assert_eq!(defaults.frame_rate, Some(30.0));
    assert_eq!(defaults.focus_mode, Some(MeteringMode::Continuous));

    let delta = SettingsDelta {
        focus_distance: Patch::Set(0.3),
        ..Default::default()
    };
    let settings = supervisor.apply_settings(&delta).await.unwrap();
    assert_eq!(
        settings,
        DesiredSettings {
            device_id: Some("cam".into()),
            frame_rate: Some(30.0),
            focus_mode: Some(MeteringMode::Manual),
            focus_distance: Some(0.3),
            ..Default::default()
        }
    );
    // Applied in place, no second acquisition
    assert_eq!(devices.acquisition_log().len(), 1);
}

#[tokio::test]
async fn test_exposure_time_forces_manual_mode() {
    let (supervisor, _devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();
    assert_eq!(
        supervisor.settings().unwrap().exposure_mode,
        Some(MeteringMode::Continuous)
    );

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            exposure_time: Patch::Set(8.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Manual));
    assert_eq!(settings.exposure_time, Some(8.0));
}

#[tokio::test]
async fn test_clearing_last_manual_value_restores_continuous() {
    let (supervisor, _devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    supervisor
        .apply_settings(&SettingsDelta {
            iso: Patch::Set(400.0),
            exposure_time: Patch::Set(8.0),
            ..Default::default()
        })
        .await
        .unwrap();

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            iso: Patch::Clear,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.iso, None);
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Manual));

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            exposure_time: Patch::Clear,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.exposure_time, None);
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Continuous));
}

#[tokio::test]
async fn test_empty_delta_is_noop() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();
    supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(2.0),
            ..Default::default()
        })
        .await
        .unwrap();

    let before = supervisor.settings().unwrap();
    let applied_before = devices.tracks_for(FRONT)[0].applied_constraints().len();

    let after = supervisor
        .apply_settings(&SettingsDelta::default())
        .await
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(supervisor.settings().unwrap(), before);
    assert_eq!(
        devices.tracks_for(FRONT)[0].applied_constraints().len(),
        applied_before
    );
}

#[tokio::test]
async fn test_rejected_in_place_change_restarts_once() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    devices.reject_next_constraints(FRONT, MediaError::overconstrained("zoom"));
    let settings = supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(2.0),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(settings.zoom, Some(2.0));
    assert_eq!(devices.acquisition_log(), vec![FRONT, FRONT]);
    assert_eq!(devices.live_track_count(), 1);
    assert_eq!(devices.peak_live_tracks(), 1);
    assert_eq!(
        supervisor.state(),
        SessionState::Live {
            device_id: FRONT.into()
        }
    );

    let applied = supervisor.applied_settings().await.unwrap();
    assert_eq!(applied.get("zoom"), Some(&json!(2.0)));
}

#[tokio::test]
async fn test_failed_restart_reverts_to_previous_settings() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();
    let before = supervisor.settings().unwrap();

    // In place, then on the restarted track
    devices.reject_next_constraints(FRONT, MediaError::overconstrained("zoom"));
    devices.reject_next_constraints(FRONT, MediaError::overconstrained("zoom"));

    let err = supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(3.0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::Settings(SettingsError::Reverted { .. })
    ));

    assert_eq!(supervisor.settings().unwrap(), before);
    assert_eq!(devices.live_track_count(), 1);
    assert_eq!(devices.acquisition_log().len(), 3);
    assert!(supervisor.state().is_live());
}

#[tokio::test]
async fn test_failed_restore_loses_session_until_retry() {
    let (supervisor, devices, sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    for _ in 0..3 {
        devices.reject_next_constraints(FRONT, MediaError::overconstrained("zoom"));
    }
    let err = supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(3.0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    let cause = match err {
        SupervisorError::Settings(SettingsError::SessionLost { cause }) => cause,
        other => panic!("unexpected error: {other:?}"),
    };
    assert_eq!(
        cause.category,
        camera_controls::FailureCategory::ConstraintUnsatisfiable
    );
    assert_eq!(devices.live_track_count(), 0);
    assert!(!sink.is_attached());
    assert_eq!(
        supervisor.state(),
        SessionState::Failed {
            device_id: Some(FRONT.to_string()),
            failure: cause.clone(),
        }
    );
    assert_eq!(supervisor.failure(), Some(cause));
    assert!(supervisor.capabilities().is_none());
    assert!(supervisor.settings().is_none());

    let state = supervisor
        .handle(camera_controls::SessionEvent::Retry)
        .await
        .unwrap();
    assert!(state.is_live());
    assert_eq!(devices.live_track_count(), 1);
    assert_eq!(supervisor.settings().unwrap().zoom, None);
}

#[tokio::test]
async fn test_exposure_compensation_keeps_manual_mode() {
    let (supervisor, _devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            iso: Patch::Set(400.0),
            exposure_compensation: Patch::Set(1.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Manual));

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            iso: Patch::Clear,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.iso, None);
    assert_eq!(settings.exposure_compensation, Some(1.0));
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Manual));

    let settings = supervisor
        .apply_settings(&SettingsDelta {
            exposure_compensation: Patch::Clear,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.exposure_compensation, None);
    assert_eq!(settings.exposure_mode, Some(MeteringMode::Continuous));
}

#[tokio::test]
async fn test_resolution_change_restarts_stream() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    supervisor
        .apply_settings(&SettingsDelta {
            width: Patch::Set(640),
            height: Patch::Set(480),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(devices.acquisition_log().len(), 2);
    let applied = supervisor.applied_settings().await.unwrap();
    assert_eq!(applied.get("width"), Some(&json!(640)));
    assert_eq!(applied.get("height"), Some(&json!(480)));
    assert_eq!(devices.peak_live_tracks(), 1);
}

#[tokio::test]
async fn test_aspect_ratio_in_place_first() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    supervisor
        .apply_settings(&SettingsDelta {
            aspect_ratio: Patch::Set(1.5),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(devices.acquisition_log().len(), 1);
    let applied = supervisor.applied_settings().await.unwrap();
    assert_eq!(applied.get("aspectRatio"), Some(&json!(1.5)));
}

#[tokio::test]
async fn test_aspect_ratio_restart_policy() {
    let config = Config {
        aspect_ratio_policy: AspectRatioPolicy::Restart,
        ..test_config()
    };
    let (supervisor, devices, _sink) = setup_with(DeviceProfile::builtin(), config);
    supervisor.select_device(FRONT).await.unwrap();

    supervisor
        .apply_settings(&SettingsDelta {
            aspect_ratio: Patch::Set(1.5),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(devices.acquisition_log().len(), 2);
    assert_eq!(supervisor.settings().unwrap().aspect_ratio, Some(1.5));
}

#[tokio::test]
async fn test_unsupported_dimension_is_kept_but_not_sent() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(REAR).await.unwrap();

    // The rear camera reports no brightness range
    let settings = supervisor
        .apply_settings(&SettingsDelta {
            brightness: Patch::Set(100.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.brightness, Some(100.0));
    assert_eq!(devices.acquisition_log().len(), 1);

    let applied = supervisor.applied_settings().await.unwrap();
    assert!(applied.get("brightness").is_none());
}

#[tokio::test]
async fn test_settings_carry_forward_across_devices() {
    let (supervisor, _devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();
    supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(3.0),
            ..Default::default()
        })
        .await
        .unwrap();

    supervisor.select_device(REAR).await.unwrap();
    let settings = supervisor.settings().unwrap();
    assert_eq!(settings.device_id.as_deref(), Some(REAR));
    assert_eq!(settings.zoom, Some(3.0));
    assert_eq!(settings.frame_rate, Some(30.0));
    // Rear camera has no exposure modes; focus keeps continuous
    assert_eq!(settings.exposure_mode, None);
    assert_eq!(settings.focus_mode, Some(MeteringMode::Continuous));
}

#[tokio::test]
async fn test_settings_reset_when_carry_disabled() {
    let config = Config {
        carry_settings_across_devices: false,
        ..test_config()
    };
    let (supervisor, _devices, _sink) = setup_with(DeviceProfile::builtin(), config);
    supervisor.select_device(FRONT).await.unwrap();
    supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(3.0),
            ..Default::default()
        })
        .await
        .unwrap();

    supervisor.select_device(REAR).await.unwrap();
    assert_eq!(supervisor.settings().unwrap().zoom, None);
}

#[tokio::test]
async fn test_rejected_initial_settings_are_narrowed() {
    let (supervisor, devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();
    supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(3.0),
            ..Default::default()
        })
        .await
        .unwrap();

    devices.reject_next_constraints(REAR, MediaError::overconstrained("zoom"));
    supervisor.select_device(REAR).await.unwrap();

    let settings = supervisor.settings().unwrap();
    assert!(supervisor.state().is_live());
    assert_eq!(settings.zoom, None);
    assert_eq!(settings.focus_mode, Some(MeteringMode::Continuous));
}

#[tokio::test]
async fn test_overlapping_applies_are_merged() {
    let (supervisor, _devices, _sink) = setup();
    supervisor.select_device(FRONT).await.unwrap();

    let zoom = SettingsDelta {
        zoom: Patch::Set(2.0),
        ..Default::default()
    };
    let brightness = SettingsDelta {
        brightness: Patch::Set(10.0),
        ..Default::default()
    };
    let (a, b) = futures::join!(
        supervisor.apply_settings(&zoom),
        supervisor.apply_settings(&brightness)
    );
    a.unwrap();
    b.unwrap();

    let settings = supervisor.settings().unwrap();
    assert_eq!(settings.zoom, Some(2.0));
    assert_eq!(settings.brightness, Some(10.0));
}

#[tokio::test]
async fn test_apply_without_session() {
    let (supervisor, _devices, _sink) = setup();
    let err = supervisor
        .apply_settings(&SettingsDelta {
            zoom: Patch::Set(2.0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err, SupervisorError::NoSession);
}
