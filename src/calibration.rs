//! ROI calibration
//!
//! Captures a frame from the OCR camera, asks a [`RegionSelector`] for the
//! rectangle that holds the printed model number and stores it under the
//! model name.

use anyhow::{Context, Result};
use chrono::Local;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::capture::frame::{CapturedFrame, FrameArchive};
use crate::capture::{CameraBackend, CameraRole};
use crate::storage::profiles::{ProfileError, RoiProfileStore, RoiRect};
use crate::vision::crop_to_roi;

const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Picks a region of a captured frame
pub trait RegionSelector {
    /// `None` means the operator cancelled
    fn select(&mut self, image: &RgbImage) -> Result<Option<RoiRect>>;
}

/// Selector that always returns the same rectangle
pub struct FixedRegion(pub RoiRect);

impl RegionSelector for FixedRegion {
    fn select(&mut self, _image: &RgbImage) -> Result<Option<RoiRect>> {
        Ok(Some(self.0))
    }
}

/// Result of a completed calibration
#[derive(Debug, Clone)]
pub struct Calibration {
    pub model: String,
    pub rect: RoiRect,
    /// The full archived frame
    pub frame_path: PathBuf,
    /// The frame with the rectangle drawn on it; absent when it could not be written
    pub overlay_path: Option<PathBuf>,
    /// The cropped region; absent when the rectangle lies outside the frame
    /// or the preview could not be written
    pub crop_path: Option<PathBuf>,
}

/// Capture one frame from camera `index` and save the selected ROI for `model`.
///
/// Returns `None` when the selector cancels; the store is then left untouched.
pub fn calibrate(
    backend: &dyn CameraBackend,
    index: u32,
    model: &str,
    selector: &mut dyn RegionSelector,
    profiles: &mut RoiProfileStore,
    archive: &mut FrameArchive,
) -> Result<Option<Calibration>> {
    let model = model.trim();
    if model.is_empty() {
        return Err(ProfileError::EmptyModelName.into());
    }

    let frame = capture(backend, index)?;
    let frame_path = archive.save(&frame)?;
    info!("Calibration frame saved to {:?}", frame_path);

    let Some(rect) = selector.select(&frame.image)? else {
        info!("Calibration for '{}' cancelled", model);
        return Ok(None);
    };

    if !rect.is_valid() {
        return Err(ProfileError::EmptyRect {
            model: model.to_string(),
            rect,
        }
        .into());
    }

    let (width, height) = frame.dimensions();
    if rect.left.saturating_add(rect.width) > width || rect.top.saturating_add(rect.height) > height {
        warn!(
            "ROI {} extends past the {}x{} frame and will be clipped",
            rect, width, height
        );
    }

    let overlay_path = write_preview(archive, &draw_region(&frame.image, rect), "roi", &frame);

    let crop = crop_to_roi(&frame.image, rect);
    let crop_path = if crop.width() == 0 || crop.height() == 0 {
        None
    } else {
        write_preview(archive, &crop, "crop", &frame)
    };

    profiles.set(model, rect)?;
    profiles.save()?;
    info!("ROI {} saved for model '{}'", rect, model);

    Ok(Some(Calibration {
        model: model.to_string(),
        rect,
        frame_path,
        overlay_path,
        crop_path,
    }))
}

/// Capture and archive a single frame from camera `index`
pub fn snapshot(backend: &dyn CameraBackend, index: u32, archive: &mut FrameArchive) -> Result<PathBuf> {
    let frame = capture(backend, index)?;
    let (width, height) = frame.dimensions();
    let path = archive.save_image(&frame.image, &format!("snapshot{}", index), frame.timestamp)?;
    info!("Saved {}x{} snapshot to {:?}", width, height, path);
    Ok(path)
}

fn capture(backend: &dyn CameraBackend, index: u32) -> Result<CapturedFrame> {
    let mut camera = backend
        .open(index)
        .with_context(|| format!("Failed to open camera {}", index))?;
    let image = camera
        .read_frame()
        .with_context(|| format!("Failed to read from {}", camera.name()))?;
    Ok(CapturedFrame {
        image,
        role: CameraRole::Ocr,
        timestamp: Local::now(),
    })
}

fn write_preview(archive: &mut FrameArchive, image: &RgbImage, prefix: &str, frame: &CapturedFrame) -> Option<PathBuf> {
    match archive.save_image(image, prefix, frame.timestamp) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Could not write {} preview: {:#}", prefix, e);
            None
        }
    }
}

fn draw_region(image: &RgbImage, rect: RoiRect) -> RgbImage {
    let mut overlay = image.clone();
    if rect.is_valid() {
        let outline = Rect::at(rect.left as i32, rect.top as i32).of_size(rect.width, rect.height);
        draw_hollow_rect_mut(&mut overlay, outline, OVERLAY_COLOR);
    }
    overlay
}
