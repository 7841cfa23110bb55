// SPDX-License-Identifier: GPL-3.0-only

//! Camera platform abstraction
//!
//! The host media-device API is consumed through four object-safe traits so the
//! negotiation engine can run against a browser binding, a native binding, or
//! the in-process virtual camera used by the CLI and the tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   UI Layer          │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ SessionSupervisor   │  ← Lifecycle state machine, recovery
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ SettingsEngine      │  ← Constraint application, restart fallback
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────┐
//! │ MediaDevices / MediaStream / VideoTrack /   │  ← Host platform
//! │ FrameSink                                   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod types;

pub use types::*;

use crate::engine::constraints::{StreamConstraints, TrackConstraints};
use async_trait::async_trait;
use std::sync::Arc;

/// Device enumeration and stream acquisition (`navigator.mediaDevices`)
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Enumerate all media devices, in platform order
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, MediaError>;

    /// Acquire a new stream matching the given constraints
    ///
    /// May prompt for permission. Fails with a categorized platform error when
    /// permission is denied, no device matches, or the device is held elsewhere.
    async fn get_user_media(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError>;
}

/// A live stream handle owning one or more tracks
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    /// Video tracks of the stream, primary track first
    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>>;

    /// Stop every track of the stream
    fn stop(&self) {
        for track in self.video_tracks() {
            track.stop();
        }
    }
}

/// One captured video track
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn id(&self) -> &str;

    fn label(&self) -> String;

    /// Raw capability object; any field may be missing or malformed
    fn capabilities(&self) -> RawCapabilities;

    /// Settings currently in effect on the track
    fn settings(&self) -> RawSettings;

    /// Apply constraints to the running track without re-acquiring it
    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), MediaError>;

    /// Stop the track and release the device
    fn stop(&self);

    fn ready_state(&self) -> TrackState;

    fn enabled(&self) -> bool;
}

/// Rendering surface a stream is attached to (a `<video>` element in browsers)
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Attach a stream as the sink's source
    fn attach(&self, stream: &dyn MediaStream) -> Result<(), MediaError>;

    /// Detach the current source, if any
    fn detach(&self);

    /// Start or resume playback of the attached source
    async fn play(&self) -> Result<(), MediaError>;

    fn playback_state(&self) -> PlaybackState;

    /// Most recently rendered frame, `None` until the first frame is rendered
    fn current_frame(&self) -> Option<CameraFrame>;
}
