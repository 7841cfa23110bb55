// SPDX-License-Identifier: GPL-3.0-only

//! Still-frame capture from the frame sink
//!
//! Reads whatever the sink is currently displaying. Nothing here touches the
//! stream, so the preview keeps running.

use crate::backends::camera::{CameraFrame, FrameSink};
use crate::engine::settings::DesiredSettings;
use crate::errors::CaptureError;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::debug;

/// Photo capture handler
pub struct PhotoCapture;

impl PhotoCapture {
    /// Snapshot the sink's current frame
    ///
    /// When `settings` specify both width and height and they differ from the
    /// rendered frame, the snapshot is scaled to them.
    pub fn capture_from_sink(
        sink: &dyn FrameSink,
        settings: Option<&DesiredSettings>,
    ) -> Result<RgbaImage, CaptureError> {
        let frame = sink.current_frame().ok_or(CaptureError::NoFrame)?;
        let image = Self::capture_from_frame(&frame)?;

        let target = settings.and_then(|s| s.width.zip(s.height));
        match target {
            Some((width, height))
                if width > 0 && height > 0 && (width, height) != image.dimensions() =>
            {
                debug!(
                    from_width = image.width(),
                    from_height = image.height(),
                    width,
                    height,
                    "Scaling snapshot to requested resolution"
                );
                Ok(imageops::resize(&image, width, height, FilterType::Triangle))
            }
            _ => Ok(image),
        }
    }

    /// Copy a frame into a tightly packed image, dropping row padding
    pub fn capture_from_frame(frame: &CameraFrame) -> Result<RgbaImage, CaptureError> {
        let row_len = frame.width as usize * 4;
        let stride = (frame.stride as usize).max(row_len);
        let height = frame.height as usize;
        let needed = if height == 0 {
            0
        } else {
            stride * (height - 1) + row_len
        };
        if frame.data.len() < needed {
            return Err(CaptureError::InvalidFrame {
                expected: needed,
                actual: frame.data.len(),
            });
        }

        let pixels = if stride == row_len {
            frame.data[..row_len * height].to_vec()
        } else {
            frame
                .data
                .chunks(stride)
                .take(height)
                .flat_map(|row| &row[..row_len])
                .copied()
                .collect()
        };

        RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or(CaptureError::InvalidFrame {
            expected: frame.packed_len(),
            actual: frame.data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(width: u32, height: u32, stride: u32, len: usize) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: Arc::from(vec![7u8; len]),
            stride,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_capture_from_packed_frame() {
        let image = PhotoCapture::capture_from_frame(&frame(4, 2, 16, 32)).unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(3, 1).0, [7, 7, 7, 7]);
    }

    #[test]
    fn test_capture_strips_row_padding() {
        // 2 pixels per row, 4 bytes of padding
        let image = PhotoCapture::capture_from_frame(&frame(2, 3, 12, 12 * 2 + 8)).unwrap();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.as_raw().len(), 2 * 3 * 4);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let err = PhotoCapture::capture_from_frame(&frame(4, 4, 16, 10)).unwrap_err();
        assert_eq!(
            err,
            CaptureError::InvalidFrame {
                expected: 64,
                actual: 10
            }
        );
    }
}
