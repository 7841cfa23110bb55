// SPDX-License-Identifier: GPL-3.0-only

//! Live capture session
//!
//! A session bundles one acquired stream with the device it came from, the
//! sink it is attached to, the commanded settings and the capabilities fetched
//! at selection. Dropping a session stops its tracks, so the device is never
//! held past the lifetime of the value that owns it.

use crate::backends::camera::{FrameSink, MediaError, MediaStream, TrackState, VideoTrack};
use crate::engine::capabilities::CapabilityDescriptor;
use crate::engine::settings::DesiredSettings;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Health of the primary track as seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackHealth {
    Live,
    /// Ready state is `ended` (device unplugged, revoked, suspended by the OS)
    Ended,
    /// Track is live but disabled by the host
    Disabled,
}

pub struct Session {
    device_id: String,
    stream: Box<dyn MediaStream>,
    track: Arc<dyn VideoTrack>,
    sink: Arc<dyn FrameSink>,
    settings: DesiredSettings,
    capabilities: CapabilityDescriptor,
    healthy: bool,
    attached: bool,
    released: bool,
    cancel_flag: Arc<AtomicBool>,
}

impl Session {
    /// Wrap a freshly acquired stream
    ///
    /// Stops the stream and fails with `NotFoundError` if it carries no video
    /// track.
    pub fn new(
        device_id: &str,
        stream: Box<dyn MediaStream>,
        sink: Arc<dyn FrameSink>,
        cancel_flag: Arc<AtomicBool>,
    ) -> Result<Self, MediaError> {
        let Some(track) = stream.video_tracks().into_iter().next() else {
            stream.stop();
            return Err(MediaError::not_found("Stream has no video track"));
        };
        let capabilities = CapabilityDescriptor::from_raw(&track.capabilities());

        Ok(Self {
            device_id: device_id.to_string(),
            stream,
            track,
            sink,
            settings: DesiredSettings::default(),
            capabilities,
            healthy: true,
            attached: false,
            released: false,
            cancel_flag,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn track(&self) -> &Arc<dyn VideoTrack> {
        &self.track
    }

    pub fn settings(&self) -> &DesiredSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    /// Record settings that are now in effect
    pub fn commit(&mut self, settings: DesiredSettings) {
        self.settings = settings;
    }

    /// Whether the owner of this session has given up on it
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    pub fn healthy(&self) -> bool {
        self.healthy
    }

    /// Flag the session for re-acquisition on the next recovery pass
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    pub fn track_health(&self) -> TrackHealth {
        if self.released || self.track.ready_state() == TrackState::Ended {
            TrackHealth::Ended
        } else if !self.track.enabled() {
            TrackHealth::Disabled
        } else {
            TrackHealth::Live
        }
    }

    pub fn is_live(&self) -> bool {
        self.track_health() == TrackHealth::Live
    }

    /// Attach the stream to the sink
    pub fn attach(&mut self) -> Result<(), MediaError> {
        self.sink.attach(self.stream.as_ref())?;
        self.attached = true;
        Ok(())
    }

    pub fn detach(&mut self) {
        if self.attached {
            self.sink.detach();
            self.attached = false;
        }
    }

    /// Detach from the sink and stop every track; idempotent
    pub fn release(&mut self) {
        self.detach();
        if !self.released {
            debug!(device = %self.device_id, stream = %self.stream.id(), "Stopping stream tracks");
            self.stream.stop();
            self.released = true;
        }
    }

    /// Swap in a newly acquired stream for the same device
    ///
    /// The previous stream must already be released. Capabilities stay as
    /// fetched at selection.
    pub fn replace_stream(&mut self, stream: Box<dyn MediaStream>) -> Result<(), MediaError> {
        let Some(track) = stream.video_tracks().into_iter().next() else {
            stream.stop();
            return Err(MediaError::not_found("Stream has no video track"));
        };
        self.release();
        self.stream = stream;
        self.track = track;
        self.released = false;
        self.healthy = true;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The sink may already belong to a newer session, so only stop tracks
        if !self.released {
            self.stream.stop();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("stream", &self.stream.id())
            .field("healthy", &self.healthy)
            .field("released", &self.released)
            .finish()
    }
}
