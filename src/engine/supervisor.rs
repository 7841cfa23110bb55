// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle supervisor
//!
//! Owns the single live session and its state machine:
//!
//! ```text
//!            select                 ok
//!   Idle ───────────▶ Acquiring ─────────▶ Live ◀──────────┐
//!    ▲                 │   ▲                │  hidden       │ restored
//!    │                 │   │ retry          ▼               │
//!    │            error▼   │             Suspended ─────────┘
//!    │                Failed
//!    └──────────── teardown (from any state)
//! ```
//!
//! Host notifications (visibility, focus, track ended) enter through
//! [`SessionSupervisor::handle`] as [`SessionEvent`]s. Every new selection or
//! teardown renews the cancel flag, so an acquisition that is still in flight
//! discards its result and releases whatever it acquired.

use crate::backends::camera::{CameraDevice, DeviceKind, FrameSink, MediaDevices, RawSettings};
use crate::config::Config;
use crate::engine::apply::SettingsEngine;
use crate::engine::capabilities::CapabilityDescriptor;
use crate::engine::session::{Session, TrackHealth};
use crate::engine::settings::{DesiredSettings, SettingsDelta, SettingsSeed};
use crate::errors::{AcquisitionFailure, CaptureError, SettingsError, SupervisorError};
use crate::pipelines::photo::PhotoCapture;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Lifecycle state of the session slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring { device_id: String },
    Live { device_id: String },
    /// Host reported the page hidden; the track may or may not survive
    Suspended { device_id: String },
    Failed {
        device_id: Option<String>,
        failure: AcquisitionFailure,
    },
}

impl SessionState {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::Acquiring { device_id }
            | SessionState::Live { device_id }
            | SessionState::Suspended { device_id } => Some(device_id),
            SessionState::Failed { device_id, .. } => device_id.as_deref(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Live { .. })
    }

    fn has_session(&self) -> bool {
        matches!(self, SessionState::Live { .. } | SessionState::Suspended { .. })
    }
}

/// External inputs to the lifecycle state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User picked a device
    Select(String),
    /// User asked to retry after a failure
    Retry,
    /// User asked for the next device in enumeration order
    SwitchToNext,
    /// Page hidden or app backgrounded
    VisibilityHidden,
    /// Page visible again
    VisibilityRestored,
    /// Window regained focus
    FocusGained,
    /// The primary track fired `ended`
    TrackEnded,
    /// Component unmounted
    Teardown,
}

/// What a recovery pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Track and playback were healthy, or there was no session
    None,
    /// Playback had stalled and was resumed on the same track
    ResumedPlayback,
    /// The stream was re-acquired with the previous settings
    Reacquired,
    /// Another recovery pass was already running
    AlreadyRunning,
}

/// Snapshot readable without awaiting the session lock
#[derive(Default)]
struct Shared {
    state: SessionState,
    devices: Vec<CameraDevice>,
    /// Settings carried into the next selection
    last_settings: DesiredSettings,
    capabilities: Option<CapabilityDescriptor>,
    settings: Option<DesiredSettings>,
}

struct Inner {
    engine: SettingsEngine,
    shared: Mutex<Shared>,
    session: tokio::sync::Mutex<Option<Session>>,
    /// Serializes acquisitions for the slot
    acquisition: tokio::sync::Mutex<()>,
    /// Collapses overlapping visibility and focus events
    recovery: tokio::sync::Mutex<()>,
    cancel_flag: Mutex<Arc<AtomicBool>>,
}

/// Session lifecycle supervisor
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

impl SessionSupervisor {
    pub fn new(devices: Arc<dyn MediaDevices>, sink: Arc<dyn FrameSink>, config: Config) -> Self {
        info!(
            aspect_ratio_policy = ?config.aspect_ratio_policy,
            settle_delay_ms = config.settle_delay_ms,
            "Creating session supervisor"
        );
        Self {
            inner: Arc::new(Inner {
                engine: SettingsEngine::new(devices, sink, config),
                shared: Mutex::new(Shared::default()),
                session: tokio::sync::Mutex::new(None),
                acquisition: tokio::sync::Mutex::new(()),
                recovery: tokio::sync::Mutex::new(()),
                cancel_flag: Mutex::new(Arc::new(AtomicBool::new(false))),
            }),
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        let mut shared = self.shared();
        debug!(from = ?shared.state, to = ?state, "Session state transition");
        shared.state = state;
    }

    /// Cancel whatever is in flight and hand out a fresh flag
    fn renew_cancel_flag(&self) -> Arc<AtomicBool> {
        let mut slot = self
            .inner
            .cancel_flag
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.store(true, Ordering::SeqCst);
        let fresh = Arc::new(AtomicBool::new(false));
        *slot = fresh.clone();
        fresh
    }

    pub fn state(&self) -> SessionState {
        self.shared().state.clone()
    }

    /// Failure to render with retry and next-device actions, if any
    pub fn failure(&self) -> Option<AcquisitionFailure> {
        match &self.shared().state {
            SessionState::Failed { failure, .. } => Some(failure.clone()),
            _ => None,
        }
    }

    /// Capabilities of the live session
    pub fn capabilities(&self) -> Option<CapabilityDescriptor> {
        let shared = self.shared();
        if shared.state.has_session() {
            shared.capabilities.clone()
        } else {
            None
        }
    }

    /// Commanded settings of the live session
    pub fn settings(&self) -> Option<DesiredSettings> {
        let shared = self.shared();
        if shared.state.has_session() {
            shared.settings.clone()
        } else {
            None
        }
    }

    /// Settings the track reports as in effect
    pub async fn applied_settings(&self) -> Option<RawSettings> {
        let slot = self.inner.session.lock().await;
        slot.as_ref().map(|session| session.track().settings())
    }

    /// Dispatch a host or user event
    pub async fn handle(&self, event: SessionEvent) -> Result<SessionState, SupervisorError> {
        debug!(?event, "Handling session event");
        match event {
            SessionEvent::Select(device_id) => self.select_device(&device_id).await?,
            SessionEvent::Retry => self.retry().await?,
            SessionEvent::SwitchToNext => self.switch_to_next().await?,
            SessionEvent::VisibilityHidden => self.suspend(),
            SessionEvent::VisibilityRestored | SessionEvent::FocusGained => {
                self.restore_visibility().await?;
            }
            SessionEvent::TrackEnded => self.track_ended().await?,
            SessionEvent::Teardown => self.teardown().await,
        }
        Ok(self.state())
    }

    /// Enumerate video inputs in platform order
    pub async fn list_devices(&self) -> Result<Vec<CameraDevice>, SupervisorError> {
        let all = self
            .inner
            .engine
            .devices()
            .enumerate_devices()
            .await
            .map_err(|e| SupervisorError::Acquisition(e.into()))?;
        let cameras: Vec<CameraDevice> = all
            .into_iter()
            .filter(|device| device.kind == DeviceKind::VideoInput)
            .collect();
        info!(count = cameras.len(), "Enumerated cameras");
        self.shared().devices = cameras.clone();
        Ok(cameras)
    }

    /// Select a device, replacing any current session
    pub async fn select_device(&self, device_id: &str) -> Result<(), SupervisorError> {
        let seed = self.carry_forward_seed();
        self.acquire(device_id, seed).await
    }

    fn carry_forward_seed(&self) -> SettingsSeed {
        if self.inner.engine.config().carry_settings_across_devices {
            SettingsSeed::CarryForward(self.shared().last_settings.clone())
        } else {
            SettingsSeed::CarryForward(DesiredSettings::default())
        }
    }

    /// Re-enter acquisition for the device of the failed or current session
    pub async fn retry(&self) -> Result<(), SupervisorError> {
        let device_id = self
            .state()
            .device_id()
            .map(str::to_string)
            .ok_or(SupervisorError::NoSession)?;
        info!(device = %device_id, "Retrying camera");
        let seed = self.carry_forward_seed();
        self.acquire(&device_id, seed).await
    }

    /// Select the next device in enumeration order, wrapping around
    pub async fn switch_to_next(&self) -> Result<(), SupervisorError> {
        let mut devices = self.shared().devices.clone();
        if devices.is_empty() {
            devices = self.list_devices().await?;
        }
        if devices.is_empty() {
            return Err(SupervisorError::NoDevices);
        }
        if devices.len() <= 1 {
            return Err(SupervisorError::NoOtherDevice);
        }

        let current = self.state().device_id().map(str::to_string);
        let next_index = current
            .and_then(|id| devices.iter().position(|device| device.device_id == id))
            .map(|index| (index + 1) % devices.len())
            .unwrap_or(0);
        let next = &devices[next_index];
        info!(device = %next.display_name(), "Switching to next camera");
        self.select_device(&next.device_id).await
    }

    async fn acquire(&self, device_id: &str, seed: SettingsSeed) -> Result<(), SupervisorError> {
        let cancel = self.renew_cancel_flag();
        self.set_state(SessionState::Acquiring {
            device_id: device_id.to_string(),
        });
        info!(device = %device_id, "Acquiring camera");

        let _serial = self.inner.acquisition.lock().await;
        if cancel.load(Ordering::SeqCst) {
            return Err(SupervisorError::Superseded);
        }

        // The device is exclusive; release the old stream before asking for a new one
        if let Some(mut previous) = self.inner.session.lock().await.take() {
            info!(device = %previous.device_id(), "Releasing previous session");
            previous.release();
        }
        {
            let mut shared = self.shared();
            shared.capabilities = None;
            shared.settings = None;
        }

        let result = self
            .inner
            .engine
            .open_session(device_id, seed, cancel.clone())
            .await;

        match result {
            Ok(mut session) => {
                let mut slot = self.inner.session.lock().await;
                if cancel.load(Ordering::SeqCst) {
                    debug!(device = %device_id, "Discarding superseded session");
                    session.release();
                    return Err(SupervisorError::Superseded);
                }

                {
                    let mut shared = self.shared();
                    shared.capabilities = Some(session.capabilities().clone());
                    shared.settings = Some(session.settings().clone());
                    shared.last_settings = session.settings().clone();
                    shared.state = SessionState::Live {
                        device_id: device_id.to_string(),
                    };
                }
                *slot = Some(session);
                info!(device = %device_id, "Camera live");
                Ok(())
            }
            Err(SupervisorError::Acquisition(failure)) if !cancel.load(Ordering::SeqCst) => {
                warn!(device = %device_id, error = %failure, "Camera failed");
                self.set_state(SessionState::Failed {
                    device_id: Some(device_id.to_string()),
                    failure: failure.clone(),
                });
                Err(SupervisorError::Acquisition(failure))
            }
            Err(SupervisorError::Acquisition(_)) | Err(SupervisorError::Superseded) => {
                debug!(device = %device_id, "Acquisition superseded");
                Err(SupervisorError::Superseded)
            }
            Err(other) => Err(other),
        }
    }

    /// Apply a settings delta to the live session
    ///
    /// Calls are serialized on the session; the later of two overlapping
    /// calls merges onto the result of the earlier one.
    pub async fn apply_settings(
        &self,
        delta: &SettingsDelta,
    ) -> Result<DesiredSettings, SupervisorError> {
        let mut slot = self.inner.session.lock().await;
        let session = slot.as_mut().ok_or(SupervisorError::NoSession)?;

        let result = self.inner.engine.apply(session, delta).await;
        if session.is_cancelled() {
            return Ok(result?);
        }
        {
            let mut shared = self.shared();
            shared.settings = Some(session.settings().clone());
            shared.last_settings = session.settings().clone();
        }

        if let Err(SettingsError::SessionLost { cause }) = &result {
            if let Some(mut lost) = slot.take() {
                let device_id = lost.device_id().to_string();
                warn!(device = %device_id, error = %cause, "Session lost, waiting for retry");
                lost.release();
                let mut shared = self.shared();
                shared.capabilities = None;
                shared.settings = None;
                shared.state = SessionState::Failed {
                    device_id: Some(device_id),
                    failure: cause.clone(),
                };
            }
        }
        Ok(result?)
    }

    /// Snapshot of the currently rendered frame
    pub fn capture_frame(&self) -> Result<RgbaImage, SupervisorError> {
        let settings = {
            let shared = self.shared();
            if !shared.state.has_session() {
                return Err(CaptureError::NoSession.into());
            }
            shared.settings.clone()
        };
        let sink = self.inner.engine.sink();
        let image = PhotoCapture::capture_from_sink(sink.as_ref(), settings.as_ref())?;
        Ok(image)
    }

    fn suspend(&self) {
        let mut shared = self.shared();
        if let SessionState::Live { device_id } = &shared.state {
            info!(device = %device_id, "Session suspended");
            shared.state = SessionState::Suspended {
                device_id: device_id.clone(),
            };
        }
    }

    async fn track_ended(&self) -> Result<(), SupervisorError> {
        match self.state() {
            SessionState::Live { .. } => {
                self.recover().await?;
            }
            SessionState::Suspended { device_id } => {
                // Recovery waits for visibility to be restored
                info!(device = %device_id, "Track ended while suspended");
                if let Some(session) = self.inner.session.lock().await.as_mut() {
                    session.mark_unhealthy();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle visibility restored or focus gained
    pub async fn restore_visibility(&self) -> Result<RecoveryAction, SupervisorError> {
        {
            let mut shared = self.shared();
            if let SessionState::Suspended { device_id } = &shared.state {
                info!(device = %device_id, "Session visible again");
                shared.state = SessionState::Live {
                    device_id: device_id.clone(),
                };
            }
        }
        self.recover().await
    }

    /// Single recovery pass; overlapping calls return `AlreadyRunning`
    async fn recover(&self) -> Result<RecoveryAction, SupervisorError> {
        let Ok(_guard) = self.inner.recovery.try_lock() else {
            debug!("Recovery already in progress");
            return Ok(RecoveryAction::AlreadyRunning);
        };

        let (device_id, health, healthy, settings) = {
            let slot = self.inner.session.lock().await;
            let Some(session) = slot.as_ref() else {
                return Ok(RecoveryAction::None);
            };
            (
                session.device_id().to_string(),
                session.track_health(),
                session.healthy(),
                session.settings().clone(),
            )
        };

        if health != TrackHealth::Live || !healthy {
            info!(device = %device_id, ?health, "Track lost, re-acquiring");
            self.acquire(&device_id, SettingsSeed::Restore(settings))
                .await?;
            return Ok(RecoveryAction::Reacquired);
        }

        let sink = self.inner.engine.sink();
        let playback = sink.playback_state();
        if !playback.is_stalled() {
            return Ok(RecoveryAction::None);
        }

        info!(device = %device_id, ?playback, "Playback stalled, resuming");
        match sink.play().await {
            Ok(()) => Ok(RecoveryAction::ResumedPlayback),
            Err(e) if e.is_superseded_request() => {
                debug!(device = %device_id, "Resume superseded by a newer play request");
                Ok(RecoveryAction::ResumedPlayback)
            }
            Err(e) => {
                warn!(device = %device_id, error = %e, "Resume failed, re-acquiring");
                self.acquire(&device_id, SettingsSeed::Restore(settings))
                    .await?;
                Ok(RecoveryAction::Reacquired)
            }
        }
    }

    /// Release everything; safe to call repeatedly
    pub async fn teardown(&self) {
        self.renew_cancel_flag();
        self.set_state(SessionState::Idle);

        if let Some(mut session) = self.inner.session.lock().await.take() {
            info!(device = %session.device_id(), "Tearing down session");
            session.release();
        }
        let mut shared = self.shared();
        shared.capabilities = None;
        shared.settings = None;
    }
}

impl std::fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
