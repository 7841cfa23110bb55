// SPDX-License-Identifier: GPL-3.0-only

//! Still photo capture
//!
//! ```text
//! FrameSink → Capture (RGBA, optional resize) → PNG encoding → Disk I/O
//!     ↓
//! Preview continues uninterrupted
//! ```

pub mod capture;
pub mod encoding;

pub use capture::PhotoCapture;
pub use encoding::{encode_png, save_snapshot, snapshot_filename};
