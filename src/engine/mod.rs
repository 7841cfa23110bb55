// SPDX-License-Identifier: GPL-3.0-only

//! Capability negotiation and constraint engine
//!
//! - [`capabilities`]: normalizes raw track capabilities
//! - [`settings`]: desired settings, deltas and mode-group reconciliation
//! - [`constraints`]: splits settings into acquisition and track constraints
//! - [`apply`]: applies deltas in place or by restarting the stream
//! - [`session`]: one live stream bound to a device and a sink
//! - [`supervisor`]: session lifecycle state machine and recovery

pub mod apply;
pub mod capabilities;
pub mod constraints;
pub mod session;
pub mod settings;
pub mod supervisor;

pub use apply::SettingsEngine;
pub use capabilities::{CapabilityDescriptor, MeteringMode, NumericRange, ResizeMode};
pub use constraints::{ConstraintBuilder, StreamConstraints, TrackConstraints};
pub use session::{Session, TrackHealth};
pub use settings::{DesiredSettings, Dimension, ModeGroup, Patch, SettingsDelta, SettingsSeed};
pub use supervisor::{RecoveryAction, SessionEvent, SessionState, SessionSupervisor};
