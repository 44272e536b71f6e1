//! Camera Capture Layer
//!
//! Cameras are addressed by index and opened through a [`CameraBackend`].
//! An open camera is a [`FrameSource`]; dropping it releases the device.

pub mod frame;
#[cfg(feature = "camera")]
pub mod nokhwa_camera;
pub mod replay;

use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::CameraSettings;

/// Which station camera a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraRole {
    /// Camera looking at the QR label
    Qr,
    /// Camera looking at the printed model number
    Ocr,
}

impl CameraRole {
    /// Filename prefix for archived frames
    pub fn file_prefix(&self) -> &'static str {
        match self {
            CameraRole::Qr => "qr",
            CameraRole::Ocr => "ocr",
        }
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraRole::Qr => write!(f, "QR camera"),
            CameraRole::Ocr => write!(f, "OCR camera"),
        }
    }
}

/// Camera failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera {index} not found: {reason}")]
    Open { index: u32, reason: String },
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("no frames available in {0:?}")]
    NoFrames(PathBuf),
    #[error("camera support not compiled in (enable the `camera` feature or set cameras.replay_dir)")]
    Unsupported,
}

/// An open camera
pub trait FrameSource {
    /// Grab one frame
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Human readable device name
    fn name(&self) -> String;
}

/// Opens cameras by index
pub trait CameraBackend: Send {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn name(&self) -> &'static str;
}

/// Backend that has no cameras
pub struct NoCameraBackend;

impl CameraBackend for NoCameraBackend {
    fn open(&self, _index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Pick the backend for the configured cameras
pub fn backend_for(settings: &CameraSettings) -> Box<dyn CameraBackend> {
    if let Some(dir) = &settings.replay_dir {
        return Box::new(replay::ReplayBackend::new(dir.clone()));
    }

    #[cfg(feature = "camera")]
    let backend: Box<dyn CameraBackend> = Box::new(nokhwa_camera::NokhwaBackend);
    #[cfg(not(feature = "camera"))]
    let backend: Box<dyn CameraBackend> = Box::new(NoCameraBackend);

    backend
}
