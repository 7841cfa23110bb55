// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! An in-process implementation of the platform traits, driven by
//! [`DeviceProfile`]s. It behaves like a strict host: devices are exclusive,
//! constraints outside the reported capabilities are rejected, and frames are
//! only rendered once the sink is playing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐  get_user_media   ┌──────────────────┐
//! │ VirtualMediaDevices│ ────────────────▶ │ VirtualStream    │
//! │ (profiles, scripts)│                   │  └ VirtualTrack  │
//! └────────────────────┘                   └────────┬─────────┘
//!                                                   │ attach
//!                                                   ▼
//!                                          ┌──────────────────┐
//!                                          │ VirtualSink      │ → RGBA frames
//!                                          └──────────────────┘
//! ```
//!
//! Failures can be scripted per device (acquisition errors, constraint
//! rejections, held acquisitions) so the engine's fallback and recovery paths
//! can be exercised without hardware.

mod profile;

pub use profile::DeviceProfile;

use crate::backends::camera::{
    CameraDevice, CameraFrame, DeviceKind, FrameSink, MediaDevices, MediaError, MediaStream,
    PlaybackState, RawCapabilities, RawSettings, TrackState, VideoTrack,
};
use crate::engine::capabilities::CapabilityDescriptor;
use crate::engine::constraints::{StreamConstraints, TrackConstraints};
use crate::engine::settings::{Dimension, ModeGroup};
use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

/// Default resolution when a profile reports no size range
const FALLBACK_WIDTH: u32 = 640;
const FALLBACK_HEIGHT: u32 = 480;

type ScriptedErrors = Arc<Mutex<HashMap<String, VecDeque<MediaError>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct DevicesState {
    profiles: Vec<DeviceProfile>,
    permission_granted: bool,
    enumeration_error: Option<MediaError>,
    acquisition_errors: HashMap<String, VecDeque<MediaError>>,
    holds: HashMap<String, VecDeque<oneshot::Receiver<()>>>,
    acquisition_log: Vec<String>,
    tracks: Vec<Arc<VirtualTrack>>,
    peak_live: usize,
}

/// Simulated `navigator.mediaDevices`
#[derive(Clone)]
pub struct VirtualMediaDevices {
    state: Arc<Mutex<DevicesState>>,
    constraint_errors: ScriptedErrors,
}

impl VirtualMediaDevices {
    pub fn new(profiles: Vec<DeviceProfile>) -> Self {
        info!(count = profiles.len(), "Creating virtual media devices");
        Self {
            state: Arc::new(Mutex::new(DevicesState {
                profiles,
                permission_granted: false,
                enumeration_error: None,
                acquisition_errors: HashMap::new(),
                holds: HashMap::new(),
                acquisition_log: Vec::new(),
                tracks: Vec::new(),
                peak_live: 0,
            })),
            constraint_errors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Devices built from [`DeviceProfile::builtin`]
    pub fn builtin() -> Self {
        Self::new(DeviceProfile::builtin())
    }

    /// Fail the next acquisition of `device_id` with `error`
    pub fn fail_next_acquisition(&self, device_id: &str, error: MediaError) {
        lock(&self.state)
            .acquisition_errors
            .entry(device_id.to_string())
            .or_default()
            .push_back(error);
    }

    /// Reject the next `apply_constraints` on a track of `device_id`
    pub fn reject_next_constraints(&self, device_id: &str, error: MediaError) {
        lock(&self.constraint_errors)
            .entry(device_id.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail the next enumeration
    pub fn fail_next_enumeration(&self, error: MediaError) {
        lock(&self.state).enumeration_error = Some(error);
    }

    /// Hold the next acquisition of `device_id` until the sender fires or drops
    pub fn hold_next_acquisition(&self, device_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.state)
            .holds
            .entry(device_id.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    /// Device ids of every `get_user_media` call, in call order
    pub fn acquisition_log(&self) -> Vec<String> {
        lock(&self.state).acquisition_log.clone()
    }

    /// Every track ever handed out for `device_id`, oldest first
    pub fn tracks_for(&self, device_id: &str) -> Vec<Arc<VirtualTrack>> {
        lock(&self.state)
            .tracks
            .iter()
            .filter(|track| track.device_id == device_id)
            .cloned()
            .collect()
    }

    pub fn live_track_count(&self) -> usize {
        count_live(&lock(&self.state).tracks)
    }

    /// Highest number of simultaneously live tracks seen so far
    pub fn peak_live_tracks(&self) -> usize {
        lock(&self.state).peak_live
    }

    fn resolve_profile(
        state: &DevicesState,
        constraints: &StreamConstraints,
    ) -> Result<DeviceProfile, MediaError> {
        let mut video = state
            .profiles
            .iter()
            .filter(|profile| profile.kind == DeviceKind::VideoInput);
        let profile = match constraints.device() {
            Some(device_id) => video.find(|profile| profile.device_id == device_id),
            None => video.next(),
        };
        profile
            .cloned()
            .ok_or_else(|| MediaError::not_found("Requested device not found"))
    }
}

fn count_live(tracks: &[Arc<VirtualTrack>]) -> usize {
    tracks
        .iter()
        .filter(|track| track.ready_state() == TrackState::Live)
        .count()
}

#[async_trait]
impl MediaDevices for VirtualMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, MediaError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.enumeration_error.take() {
            return Err(error);
        }
        let granted = state.permission_granted;
        Ok(state
            .profiles
            .iter()
            .map(|profile| profile.device(granted))
            .collect())
    }

    async fn get_user_media(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        let requested = constraints.device().map(str::to_string).unwrap_or_default();
        let hold = {
            let mut state = lock(&self.state);
            state.acquisition_log.push(requested.clone());
            state
                .holds
                .get_mut(&requested)
                .and_then(|queue| queue.pop_front())
        };
        if let Some(hold) = hold {
            debug!(device = %requested, "Holding acquisition");
            // A dropped sender releases the hold too
            let _ = hold.await;
        }

        let mut state = lock(&self.state);
        if let Some(error) = state
            .acquisition_errors
            .get_mut(&requested)
            .and_then(|queue| queue.pop_front())
        {
            debug!(device = %requested, error = %error, "Scripted acquisition failure");
            return Err(error);
        }

        let profile = Self::resolve_profile(&state, constraints)?;
        let busy = state
            .tracks
            .iter()
            .any(|track| {
                track.device_id == profile.device_id && track.ready_state() == TrackState::Live
            });
        if busy {
            return Err(MediaError::not_readable("Could not start video source"));
        }

        let track = Arc::new(VirtualTrack::new(
            &profile,
            constraints,
            self.constraint_errors.clone(),
        ));
        state.tracks.push(track.clone());
        state.peak_live = state.peak_live.max(count_live(&state.tracks));
        state.permission_granted = true;
        info!(device = %profile.device_id, track = %track.id, "Virtual stream started");

        Ok(Box::new(VirtualStream {
            id: uuid::Uuid::new_v4().to_string(),
            tracks: vec![track],
        }))
    }
}

/// Stream handed out by [`VirtualMediaDevices`]
pub struct VirtualStream {
    id: String,
    tracks: Vec<Arc<VirtualTrack>>,
}

impl MediaStream for VirtualStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        self.tracks
            .iter()
            .map(|track| track.clone() as Arc<dyn VideoTrack>)
            .collect()
    }
}

struct TrackInner {
    settings: RawSettings,
    ended: bool,
    enabled: bool,
    applied: Vec<TrackConstraints>,
}

/// Simulated video track
pub struct VirtualTrack {
    id: String,
    device_id: String,
    label: String,
    capabilities: RawCapabilities,
    descriptor: CapabilityDescriptor,
    constraint_errors: ScriptedErrors,
    inner: Mutex<TrackInner>,
}

impl VirtualTrack {
    fn new(
        profile: &DeviceProfile,
        constraints: &StreamConstraints,
        constraint_errors: ScriptedErrors,
    ) -> Self {
        let descriptor = CapabilityDescriptor::from_raw(&profile.capabilities);

        let pick = |requested: Option<f64>, dimension: Dimension, fallback: f64| {
            match (requested, descriptor.range(dimension)) {
                (Some(value), Some(range)) => range.clamp(value),
                (Some(value), None) => value,
                (None, Some(range)) => range.max,
                (None, None) => fallback,
            }
        };
        let video = &constraints.video;
        let width = pick(
            video.width.map(|v| f64::from(v.value())),
            Dimension::Width,
            f64::from(FALLBACK_WIDTH),
        )
        .round();
        let mut height = pick(
            video.height.map(|v| f64::from(v.value())),
            Dimension::Height,
            f64::from(FALLBACK_HEIGHT),
        )
        .round();
        if let Some(ratio) = video.aspect_ratio.map(|v| v.value()).filter(|r| *r > 0.0) {
            height = pick(Some((width / ratio).round()), Dimension::Height, height);
        }
        let frame_rate = pick(video.frame_rate.map(|v| v.value()), Dimension::FrameRate, 30.0);

        let mut settings = RawSettings::new();
        settings.insert("deviceId".into(), json!(profile.device_id));
        settings.insert("groupId".into(), json!(profile.group_id));
        settings.insert("width".into(), json!(width as u32));
        settings.insert("height".into(), json!(height as u32));
        settings.insert("aspectRatio".into(), json!(width / height.max(1.0)));
        settings.insert("frameRate".into(), json!(frame_rate));
        if let Some(mode) = video.resize_mode {
            settings.insert("resizeMode".into(), json!(mode));
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: profile.device_id.clone(),
            label: profile.label.clone(),
            capabilities: profile.capabilities.clone(),
            descriptor,
            constraint_errors,
            inner: Mutex::new(TrackInner {
                settings,
                ended: false,
                enabled: true,
                applied: Vec::new(),
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Simulate the host ending the track (unplug, OS suspension)
    pub fn end(&self) {
        info!(track = %self.id, "Virtual track ended by host");
        lock(&self.inner).ended = true;
    }

    /// Simulate the host disabling the track
    pub fn disable(&self) {
        lock(&self.inner).enabled = false;
    }

    /// Constraint sets successfully applied to this track
    pub fn applied_constraints(&self) -> Vec<TrackConstraints> {
        lock(&self.inner).applied.clone()
    }

    fn validate(&self, constraints: &TrackConstraints) -> Result<(), MediaError> {
        let caps = &self.descriptor;
        if let Some(ratio) = constraints.aspect_ratio {
            if caps.aspect_ratio.is_none_or(|range| !range.contains(ratio)) {
                return Err(MediaError::overconstrained(Dimension::AspectRatio.key()));
            }
        }
        if let Some(mode) = constraints.resize_mode {
            if !caps.resize_mode.as_deref().unwrap_or_default().contains(&mode) {
                return Err(MediaError::overconstrained(Dimension::ResizeMode.key()));
            }
        }

        for set in &constraints.advanced {
            for group in ModeGroup::ALL {
                if let Some(mode) = set.mode(group) {
                    if !caps.supports_mode(group, mode) {
                        return Err(MediaError::overconstrained(group.mode_dimension().key()));
                    }
                }
            }
            for dimension in Dimension::ALL {
                let Some(value) = set.number(dimension) else {
                    continue;
                };
                if caps.range(dimension).is_none_or(|range| !range.contains(value)) {
                    return Err(MediaError::overconstrained(dimension.key()));
                }
            }
            if set.torch == Some(true) && !caps.supports(Dimension::Torch) {
                return Err(MediaError::overconstrained(Dimension::Torch.key()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VideoTrack for VirtualTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn capabilities(&self) -> RawCapabilities {
        self.capabilities.clone()
    }

    fn settings(&self) -> RawSettings {
        lock(&self.inner).settings.clone()
    }

    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), MediaError> {
        if lock(&self.inner).ended {
            return Err(MediaError::new("InvalidStateError", "Track has ended"));
        }
        let scripted = lock(&self.constraint_errors)
            .get_mut(&self.device_id)
            .and_then(|queue| queue.pop_front());
        if let Some(error) = scripted {
            debug!(track = %self.id, error = %error, "Scripted constraint rejection");
            return Err(error);
        }
        self.validate(constraints)?;

        let mut inner = lock(&self.inner);
        if let Some(ratio) = constraints.aspect_ratio {
            let width = inner
                .settings
                .get("width")
                .and_then(Value::as_f64)
                .unwrap_or(f64::from(FALLBACK_WIDTH));
            let mut height = (width / ratio).round();
            if let Some(range) = self.descriptor.height {
                height = range.clamp(height);
            }
            inner.settings.insert("height".into(), json!(height as u32));
            inner.settings.insert("aspectRatio".into(), json!(ratio));
        }
        if let Some(mode) = constraints.resize_mode {
            inner.settings.insert("resizeMode".into(), json!(mode));
        }
        for set in &constraints.advanced {
            if let Value::Object(fields) = json!(set) {
                inner.settings.extend(fields);
            }
        }
        inner.applied.push(constraints.clone());
        debug!(track = %self.id, "Constraints applied");
        Ok(())
    }

    fn stop(&self) {
        let mut inner = lock(&self.inner);
        if !inner.ended {
            debug!(track = %self.id, "Virtual track stopped");
        }
        inner.ended = true;
    }

    fn ready_state(&self) -> TrackState {
        if lock(&self.inner).ended {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn enabled(&self) -> bool {
        lock(&self.inner).enabled
    }
}

struct SinkState {
    source: Option<Arc<dyn VideoTrack>>,
    playback: PlaybackState,
    rendered: bool,
    play_errors: VecDeque<MediaError>,
    play_calls: usize,
}

/// Simulated `<video>` element rendering a gradient at the track's resolution
pub struct VirtualSink {
    state: Mutex<SinkState>,
}

impl Default for VirtualSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState {
                source: None,
                playback: PlaybackState::Paused,
                rendered: false,
                play_errors: VecDeque::new(),
                play_calls: 0,
            }),
        }
    }

    /// Fail the next `play()` with `error`
    pub fn fail_next_play(&self, error: MediaError) {
        lock(&self.state).play_errors.push_back(error);
    }

    /// Force a playback state, e.g. `Paused` after the host backgrounded the page
    pub fn set_playback_state(&self, playback: PlaybackState) {
        lock(&self.state).playback = playback;
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.state).play_calls
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.state).source.is_some()
    }

    fn render(width: u32, height: u32) -> CameraFrame {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    128,
                    255,
                ]);
            }
        }
        CameraFrame {
            width,
            height,
            data: Arc::from(data),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }
}

#[async_trait]
impl FrameSink for VirtualSink {
    fn attach(&self, stream: &dyn MediaStream) -> Result<(), MediaError> {
        let track = stream
            .video_tracks()
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::not_found("Stream has no video track"))?;
        let mut state = lock(&self.state);
        debug!(stream = %stream.id(), "Sink attached");
        state.source = Some(track);
        state.playback = PlaybackState::Paused;
        state.rendered = false;
        Ok(())
    }

    fn detach(&self) {
        let mut state = lock(&self.state);
        state.source = None;
        state.playback = PlaybackState::Paused;
        state.rendered = false;
    }

    async fn play(&self) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        state.play_calls += 1;
        if let Some(error) = state.play_errors.pop_front() {
            return Err(error);
        }
        let Some(source) = &state.source else {
            return Err(MediaError::new("NotSupportedError", "No source attached"));
        };
        if source.ready_state() == TrackState::Ended {
            return Err(MediaError::new("NotSupportedError", "Source track has ended"));
        }
        state.playback = PlaybackState::Playing;
        state.rendered = true;
        Ok(())
    }

    fn playback_state(&self) -> PlaybackState {
        let state = lock(&self.state);
        match &state.source {
            Some(source) if source.ready_state() == TrackState::Ended => PlaybackState::Ended,
            _ => state.playback,
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        let settings = {
            let state = lock(&self.state);
            if !state.rendered {
                return None;
            }
            state.source.as_ref()?.settings()
        };
        let dimension = |key: &str, fallback: u32| {
            settings
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback)
        };
        Some(Self::render(
            dimension("width", FALLBACK_WIDTH),
            dimension("height", FALLBACK_HEIGHT),
        ))
    }
}
