//! Captured frames and the on-disk frame archive

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::PathBuf;
use tracing::debug;

use super::CameraRole;

/// A frame grabbed from one of the station cameras
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Camera that produced the frame
    pub role: CameraRole,
    /// Wall-clock capture time
    pub timestamp: DateTime<Local>,
}

impl CapturedFrame {
    /// Create a new captured frame stamped with the current time
    pub fn new(image: RgbImage, role: CameraRole) -> Self {
        Self {
            image,
            role,
            timestamp: Local::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Writes frames as `<prefix>_<YYYYmmdd_HHMMSS_mmm>_<seq>.jpg`.
///
/// `seq` increases with every file written by this archive, so names never
/// repeat within a session even when two frames share a timestamp.
#[derive(Debug)]
pub struct FrameArchive {
    dir: PathBuf,
    sequence: u64,
}

impl FrameArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create capture directory {:?}", dir))?;
        Ok(Self { dir, sequence: 0 })
    }

    /// Persist a captured frame
    pub fn save(&mut self, frame: &CapturedFrame) -> Result<PathBuf> {
        self.save_image(&frame.image, frame.role.file_prefix(), frame.timestamp)
    }

    /// Persist an arbitrary image under `prefix`
    pub fn save_image(
        &mut self,
        image: &RgbImage,
        prefix: &str,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf> {
        self.sequence += 1;
        let filename = format!(
            "{}_{}_{:06}.jpg",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S_%3f"),
            self.sequence
        );
        let path = self.dir.join(filename);

        image
            .save(&path)
            .with_context(|| format!("Failed to write frame {:?}", path))?;
        debug!("Archived {}x{} frame to {:?}", image.width(), image.height(), path);

        Ok(path)
    }
}
