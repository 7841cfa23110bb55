// SPDX-License-Identifier: GPL-3.0-only

//! Camera Controls - capability negotiation and session supervision for
//! media-device cameras
//!
//! The crate turns the loosely-typed capability surface of a camera track into
//! a consistent settings model, applies settings changes to a running stream
//! (in place when possible, by restarting the stream when not) and keeps a
//! single capture session alive across device switches, backgrounding and
//! track loss.
//!
//! # Architecture
//!
//! - [`backends`]: platform traits and the in-process virtual camera
//! - [`engine`]: normalizer, constraint builder, settings engine, supervisor
//! - [`pipelines`]: still-frame snapshots
//! - [`config`]: engine tuning
//!
//! # Example
//!
//! ```ignore
//! let devices = Arc::new(VirtualMediaDevices::builtin());
//! let sink = Arc::new(VirtualSink::new());
//! let supervisor = SessionSupervisor::new(devices, sink, Config::default());
//! supervisor.select_device("virtual-front").await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod pipelines;

// Re-export commonly used types
pub use config::Config;
pub use constants::AspectRatioPolicy;
pub use engine::{
    CapabilityDescriptor, DesiredSettings, MeteringMode, Patch, RecoveryAction, SessionEvent,
    SessionState, SessionSupervisor, SettingsDelta,
};
pub use errors::{AcquisitionFailure, AppError, AppResult, FailureCategory, SupervisorError};
