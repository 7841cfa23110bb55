// SPDX-License-Identifier: GPL-3.0-only

//! Settings application engine
//!
//! Opens sessions and applies settings deltas to them. A delta is applied to
//! the running track whenever every changed dimension can be set on a track;
//! otherwise, or when the track rejects the change, the stream is stopped and
//! re-acquired with the merged settings. If the restart fails too, the
//! previous settings are re-acquired so the preview keeps running.

use crate::backends::camera::{FrameSink, MediaDevices, MediaError};
use crate::config::Config;
use crate::constants::AspectRatioPolicy;
use crate::engine::constraints::ConstraintBuilder;
use crate::engine::session::Session;
use crate::engine::settings::{
    ConstraintStage, DesiredSettings, Dimension, SettingsDelta, SettingsSeed,
};
use crate::errors::{AcquisitionFailure, SettingsError, SupervisorError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Outcome of re-acquiring a stream for an existing session
enum Reacquire {
    Failed(AcquisitionFailure),
    Abandoned,
}

pub struct SettingsEngine {
    devices: Arc<dyn MediaDevices>,
    sink: Arc<dyn FrameSink>,
    config: Config,
}

impl SettingsEngine {
    pub fn new(devices: Arc<dyn MediaDevices>, sink: Arc<dyn FrameSink>, config: Config) -> Self {
        Self {
            devices,
            sink,
            config,
        }
    }

    pub fn devices(&self) -> &Arc<dyn MediaDevices> {
        &self.devices
    }

    pub fn sink(&self) -> &Arc<dyn FrameSink> {
        &self.sink
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquire a stream for `device_id` and bring it to a playing session
    ///
    /// `cancel` is checked after every await; once set, anything acquired so
    /// far is released and `Superseded` is returned.
    pub async fn open_session(
        &self,
        device_id: &str,
        seed: SettingsSeed,
        cancel: Arc<AtomicBool>,
    ) -> Result<Session, SupervisorError> {
        let requested = match &seed {
            SettingsSeed::CarryForward(settings) | SettingsSeed::Restore(settings) => {
                DesiredSettings {
                    device_id: Some(device_id.to_string()),
                    ..settings.clone()
                }
            }
        };

        let constraints = match self.config.aspect_ratio_policy {
            AspectRatioPolicy::Restart => ConstraintBuilder::restart(&requested),
            AspectRatioPolicy::InPlaceFirst => ConstraintBuilder::acquisition(&requested),
        };
        let stream = self
            .devices
            .get_user_media(&constraints)
            .await
            .map_err(|e| failure(device_id, e))?;

        if cancel.load(Ordering::SeqCst) {
            debug!(device = %device_id, "Acquisition abandoned, stopping stream");
            stream.stop();
            return Err(SupervisorError::Superseded);
        }

        let mut session = Session::new(device_id, stream, self.sink.clone(), cancel)
            .map_err(|e| failure(device_id, e))?;

        let settings = match seed {
            SettingsSeed::CarryForward(_) => requested.for_device(
                device_id,
                session.capabilities(),
                self.config.default_frame_rate,
            ),
            SettingsSeed::Restore(_) => requested,
        };

        if let Err(e) = session.attach() {
            session.release();
            return Err(failure(device_id, e));
        }

        tokio::time::sleep(self.config.settle_delay()).await;
        if session.is_cancelled() {
            session.release();
            return Err(SupervisorError::Superseded);
        }

        self.start_playback(device_id).await;
        if session.is_cancelled() {
            session.release();
            return Err(SupervisorError::Superseded);
        }

        let settings = self.apply_initial(&session, settings).await;
        if session.is_cancelled() {
            session.release();
            return Err(SupervisorError::Superseded);
        }

        session.commit(settings);
        info!(device = %device_id, "Session opened");
        Ok(session)
    }

    /// Apply track-level settings on a new session, narrowing on rejection
    async fn apply_initial(&self, session: &Session, settings: DesiredSettings) -> DesiredSettings {
        let constraints =
            ConstraintBuilder::track(&settings).retain_supported(session.capabilities());
        if constraints.is_empty() {
            return settings;
        }

        let Err(e) = session.track().apply_constraints(&constraints).await else {
            return settings;
        };
        warn!(
            device = %session.device_id(),
            error = %e,
            "Initial settings rejected, narrowing to acquisition settings"
        );

        let narrowed = settings.narrowed(session.capabilities());
        let constraints =
            ConstraintBuilder::track(&narrowed).retain_supported(session.capabilities());
        if !constraints.is_empty() {
            if let Err(e) = session.track().apply_constraints(&constraints).await {
                warn!(device = %session.device_id(), error = %e, "Mode defaults rejected");
            }
        }
        narrowed
    }

    async fn start_playback(&self, device_id: &str) {
        match self.sink.play().await {
            Ok(()) => {}
            Err(e) if e.is_superseded_request() => {
                debug!(device = %device_id, "Play request superseded")
            }
            Err(e) => warn!(device = %device_id, error = %e, "Failed to start playback"),
        }
    }

    /// Apply a settings delta to a session
    ///
    /// Returns the settings now commanded. Failures leave the session running
    /// with its previous settings unless `SessionLost` is returned.
    pub async fn apply(
        &self,
        session: &mut Session,
        delta: &SettingsDelta,
    ) -> Result<DesiredSettings, SettingsError> {
        if delta.is_empty() {
            return Ok(session.settings().clone());
        }

        let merged = session.settings().merge(delta, Some(session.capabilities()));
        let changed = session.settings().diff(&merged);
        if changed.is_empty() {
            debug!(device = %session.device_id(), "Settings delta changes nothing");
            return Ok(merged);
        }

        if !self.needs_restart(&changed) && session.is_live() {
            let constraints =
                ConstraintBuilder::track(&merged).retain_supported(session.capabilities());
            match session.track().apply_constraints(&constraints).await {
                Ok(()) => {
                    if session.is_cancelled() {
                        return Err(SettingsError::Abandoned);
                    }
                    info!(device = %session.device_id(), ?changed, "Settings applied in place");
                    session.commit(merged.clone());
                    return Ok(merged);
                }
                Err(e) => {
                    if session.is_cancelled() {
                        return Err(SettingsError::Abandoned);
                    }
                    warn!(
                        device = %session.device_id(),
                        error = %e,
                        "In-place constraint application failed, restarting stream"
                    );
                }
            }
        }

        self.restart(session, merged).await
    }

    fn needs_restart(&self, changed: &BTreeSet<Dimension>) -> bool {
        changed.iter().any(|dimension| match dimension {
            Dimension::AspectRatio | Dimension::ResizeMode => {
                self.config.aspect_ratio_policy == AspectRatioPolicy::Restart
            }
            other => other.stage() == ConstraintStage::Acquisition,
        })
    }

    async fn restart(
        &self,
        session: &mut Session,
        merged: DesiredSettings,
    ) -> Result<DesiredSettings, SettingsError> {
        let previous = session.settings().clone();
        info!(device = %session.device_id(), "Restarting stream with new settings");

        let cause = match self.reacquire(session, &merged).await {
            Ok(()) => {
                session.commit(merged.clone());
                info!(device = %session.device_id(), "Stream restarted");
                return Ok(merged);
            }
            Err(Reacquire::Abandoned) => return Err(SettingsError::Abandoned),
            Err(Reacquire::Failed(cause)) => cause,
        };

        warn!(
            device = %session.device_id(),
            error = %cause,
            "Restart failed, restoring previous settings"
        );
        match self.reacquire(session, &previous).await {
            Ok(()) => Err(SettingsError::Reverted { cause }),
            Err(Reacquire::Abandoned) => Err(SettingsError::Abandoned),
            Err(Reacquire::Failed(restore)) => {
                error!(
                    device = %session.device_id(),
                    error = %restore,
                    "Failed to restore previous settings"
                );
                session.mark_unhealthy();
                Err(SettingsError::SessionLost { cause })
            }
        }
    }

    /// Stop the session's stream and acquire a new one with `settings`
    async fn reacquire(
        &self,
        session: &mut Session,
        settings: &DesiredSettings,
    ) -> Result<(), Reacquire> {
        let device_id = session.device_id().to_string();
        session.release();

        let request = DesiredSettings {
            device_id: Some(device_id.clone()),
            ..settings.clone()
        };
        let stream = self
            .devices
            .get_user_media(&ConstraintBuilder::restart(&request))
            .await
            .map_err(|e| Reacquire::Failed(e.into()))?;
        if session.is_cancelled() {
            stream.stop();
            return Err(Reacquire::Abandoned);
        }

        session
            .replace_stream(stream)
            .map_err(|e| Reacquire::Failed(e.into()))?;
        if let Err(e) = session.attach() {
            session.release();
            return Err(Reacquire::Failed(e.into()));
        }

        tokio::time::sleep(self.config.settle_delay()).await;
        if session.is_cancelled() {
            session.release();
            return Err(Reacquire::Abandoned);
        }
        self.start_playback(&device_id).await;

        let constraints =
            ConstraintBuilder::track(settings).retain_supported(session.capabilities());
        if !constraints.is_empty() {
            if let Err(e) = session.track().apply_constraints(&constraints).await {
                session.release();
                return Err(Reacquire::Failed(e.into()));
            }
        }
        if session.is_cancelled() {
            session.release();
            return Err(Reacquire::Abandoned);
        }
        Ok(())
    }
}

fn failure(device_id: &str, err: MediaError) -> SupervisorError {
    let failure = AcquisitionFailure::from(err);
    warn!(
        device = %device_id,
        category = ?failure.category,
        detail = %failure.detail,
        "Camera acquisition failed"
    );
    SupervisorError::Acquisition(failure)
}

impl std::fmt::Debug for SettingsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
