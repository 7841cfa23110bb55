// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot encoding and saving

use crate::constants::capture::{SNAPSHOT_EXTENSION, SNAPSHOT_PREFIX};
use crate::errors::{AppError, AppResult};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Encode an image as PNG
pub fn encode_png(image: &RgbaImage) -> AppResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut buffer),
        image::ImageFormat::Png,
    )?;
    debug!(size = buffer.len(), "Encoding complete");
    Ok(buffer)
}

/// Timestamped snapshot file name, e.g. `IMG_20240101_120000.png`
pub fn snapshot_filename() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", SNAPSHOT_PREFIX, timestamp, SNAPSHOT_EXTENSION)
}

/// Encode and write a snapshot off the async runtime
///
/// `output` may be a directory, in which case a timestamped name is used.
pub async fn save_snapshot(image: RgbaImage, output: &Path) -> AppResult<PathBuf> {
    let filepath = if output.is_dir() {
        output.join(snapshot_filename())
    } else {
        output.to_path_buf()
    };

    info!(path = %filepath.display(), "Saving snapshot");

    let target = filepath.clone();
    tokio::task::spawn_blocking(move || -> AppResult<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = encode_png(&image)?;
        std::fs::write(&target, data)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Other(format!("Save task error: {}", e)))??;

    info!(path = %filepath.display(), "Snapshot saved successfully");
    Ok(filepath)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_signature() {
        let data = encode_png(&RgbaImage::new(2, 2)).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_snapshot_filename() {
        let name = snapshot_filename();
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_save_into_directory() {
        let dir = std::env::temp_dir().join(format!("camera-controls-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = save_snapshot(RgbaImage::new(3, 1), &dir).await.unwrap();
        assert_eq!(path.parent(), Some(dir.as_path()));
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
