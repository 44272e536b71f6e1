//! Image preprocessing ahead of OCR
//!
//! The OCR camera frame is cropped to the model's ROI, reduced to a single
//! intensity channel and binarized at a fixed level.

use image::{imageops, GrayImage, Luma, RgbImage};
use tracing::{debug, warn};

use crate::storage::profiles::RoiRect;

/// Default binarization level
pub const DEFAULT_THRESHOLD: u8 = 150;

/// Crop a frame to `roi`, clamped to the frame bounds.
///
/// A rectangle lying entirely outside the frame gives a 0x0 image.
pub fn crop_to_roi(frame: &RgbImage, roi: RoiRect) -> RgbImage {
    let (img_width, img_height) = frame.dimensions();

    let x = roi.left.min(img_width);
    let y = roi.top.min(img_height);
    let width = roi.width.min(img_width - x);
    let height = roi.height.min(img_height - y);

    if width != roi.width || height != roi.height {
        warn!(
            "ROI {} exceeds {}x{} frame, cropping to {}x{} at ({}, {})",
            roi, img_width, img_height, width, height, x, y
        );
    }

    imageops::crop_imm(frame, x, y, width, height).to_image()
}

/// Convert RGB to a single luminance channel
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        // Standard luminance weights
        let [r, g, b] = image.get_pixel(x, y).0;
        let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([gray.round().clamp(0.0, 255.0) as u8])
    })
}

/// Fixed binary threshold: pixels at or above `threshold` become white, the rest black
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] >= threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Grayscale followed by binarization
pub fn prepare_for_ocr(image: &RgbImage, threshold: u8) -> GrayImage {
    debug!(
        "OCR preprocessing {}x{} region at threshold {}",
        image.width(),
        image.height(),
        threshold
    );
    binarize(&to_grayscale(image), threshold)
}
