//! Replay camera backend
//!
//! Serves frames from image files so a station can be exercised without
//! hardware. Camera `N` reads `<root>/<N>/*.{png,jpg,jpeg,bmp}` in file-name
//! order and wraps around at the end.

use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{CameraBackend, CaptureError, FrameSource};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Backend that opens directories of still images as cameras
pub struct ReplayBackend {
    root: PathBuf,
}

impl ReplayBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CameraBackend for ReplayBackend {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        let dir = self.root.join(index.to_string());
        let files = list_images(&dir).map_err(|e| CaptureError::Open {
            index,
            reason: format!("{:?}: {}", dir, e),
        })?;

        if files.is_empty() {
            return Err(CaptureError::Open {
                index,
                reason: format!("no images in {:?}", dir),
            });
        }

        info!("Replaying {} frames from {:?} as camera {}", files.len(), dir, index);
        Ok(Box::new(ReplayCamera { dir, files, next: 0 }))
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

/// A directory of frames played back in order
pub struct ReplayCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl FrameSource for ReplayCamera {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::NoFrames(self.dir.clone()));
        }

        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();
        debug!("Replay frame {:?}", path);

        let image = image::open(path)
            .map_err(|e| CaptureError::Read(format!("{:?}: {}", path, e)))?;
        Ok(image.to_rgb8())
    }

    fn name(&self) -> String {
        format!("replay:{}", self.dir.display())
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, value: u8) {
        std::fs::create_dir_all(dir).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_frames_play_in_order_and_wrap() {
        let root = TempDir::new().unwrap();
        let cam_dir = root.path().join("0");
        write_frame(&cam_dir, "b.png", 20);
        write_frame(&cam_dir, "a.png", 10);
        std::fs::write(cam_dir.join("notes.txt"), "ignored").unwrap();

        let backend = ReplayBackend::new(root.path());
        let mut camera = backend.open(0).unwrap();

        assert_eq!(camera.read_frame().unwrap().get_pixel(0, 0).0[0], 10);
        assert_eq!(camera.read_frame().unwrap().get_pixel(0, 0).0[0], 20);
        assert_eq!(camera.read_frame().unwrap().get_pixel(0, 0).0[0], 10);
    }

    #[test]
    fn test_missing_camera_directory_fails_to_open() {
        let root = TempDir::new().unwrap();
        let backend = ReplayBackend::new(root.path());

        let result = backend.open(7);
        assert!(matches!(result, Err(CaptureError::Open { index: 7, .. })));
    }

    #[test]
    fn test_empty_camera_directory_fails_to_open() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("1")).unwrap();

        let result = ReplayBackend::new(root.path()).open(1);
        assert!(result.is_err());
    }
}
