// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines
//!
//! - [`photo`]: still-frame snapshots from the live preview

pub mod photo;
