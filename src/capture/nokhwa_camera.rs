//! Live camera backend using nokhwa

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{info, warn};

use super::{CameraBackend, CaptureError, FrameSource};

/// Opens native capture devices by index
pub struct NokhwaBackend;

impl CameraBackend for NokhwaBackend {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(index), format).map_err(|e| CaptureError::Open {
            index,
            reason: e.to_string(),
        })?;
        camera.open_stream().map_err(|e| CaptureError::Open {
            index,
            reason: e.to_string(),
        })?;

        let resolution = camera.resolution();
        info!(
            "Opened camera {} ({}) at {}x{}",
            index,
            camera.info().human_name(),
            resolution.width(),
            resolution.height()
        );

        Ok(Box::new(NokhwaCamera { index, camera }))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// An open native camera stream; stopped on drop
pub struct NokhwaCamera {
    index: u32,
    camera: Camera,
}

impl FrameSource for NokhwaCamera {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let buffer = self.camera.frame().map_err(|e| CaptureError::Read(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        // Rebuild through raw bytes so nokhwa's image version never leaks out
        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| CaptureError::Read(format!("frame buffer does not match {}x{}", width, height)))
    }

    fn name(&self) -> String {
        format!("camera {} ({})", self.index, self.camera.info().human_name())
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to release camera {}: {}", self.index, e);
        } else {
            info!("Released camera {}", self.index);
        }
    }
}
