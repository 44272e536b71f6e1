//! Application Configuration
//!
//! Station settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::profiles::RoiRect;
use crate::vision::ocr_preprocess::DEFAULT_THRESHOLD;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// File locations
    pub storage: StorageSettings,
    /// Camera settings
    pub cameras: CameraSettings,
    /// Inspection loop settings
    pub inspection: InspectionSettings,
    /// OCR settings
    pub ocr: OcrSettings,
}

/// Where profiles, the identity log and captured frames live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base directory for relative paths (platform data dir when unset)
    pub data_dir: Option<PathBuf>,
    /// ROI profile file
    pub roi_profiles_file: PathBuf,
    /// Identity log (CSV)
    pub identity_log_file: PathBuf,
    /// Directory for archived frames
    pub capture_dir: PathBuf,
    /// Write every captured frame to `capture_dir`
    pub save_frames: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            roi_profiles_file: PathBuf::from("roi_profiles.json"),
            identity_log_file: PathBuf::from("qr_code_data.csv"),
            capture_dir: PathBuf::from("captures"),
            save_frames: true,
        }
    }
}

impl StorageSettings {
    /// Resolve the configured paths against the data directory.
    ///
    /// Nothing is created here; writers create their own directories.
    pub fn resolve(&self) -> Result<StoragePaths> {
        let base = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => crate::storage::get_data_dir()?,
        };

        Ok(StoragePaths {
            roi_profiles: base.join(&self.roi_profiles_file),
            identity_log: base.join(&self.identity_log_file),
            capture_dir: base.join(&self.capture_dir),
        })
    }
}

/// Absolute storage locations
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub roi_profiles: PathBuf,
    pub identity_log: PathBuf,
    pub capture_dir: PathBuf,
}

/// Camera-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Index of the camera looking at the QR label
    pub qr_index: u32,
    /// Index of the camera looking at the printed model number
    pub ocr_index: u32,
    /// Refuse to stream unless both cameras opened
    pub require_both_cameras: bool,
    /// Read frames from `<replay_dir>/<index>/` instead of live cameras
    pub replay_dir: Option<PathBuf>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            qr_index: 1,
            ocr_index: 0,
            require_both_cameras: true,
            replay_dir: None,
        }
    }
}

/// Inspection loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionSettings {
    /// Seconds between the end of one capture and the start of the next
    pub capture_interval_secs: u64,
    /// ROI used when the selected model has no profile
    pub default_roi: RoiRect,
    /// Re-read the ROI store before every lookup
    pub reload_profiles_each_cycle: bool,
    /// Treat two empty strings as a match
    pub accept_empty_match: bool,
    /// Stop after this many capture cycles
    pub max_cycles: Option<u64>,
}

impl Default for InspectionSettings {
    fn default() -> Self {
        Self {
            capture_interval_secs: 10,
            default_roi: RoiRect::new(0, 0, 100, 100),
            reload_profiles_each_cycle: false,
            accept_empty_match: false,
            max_cycles: None,
        }
    }
}

impl InspectionSettings {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs(self.capture_interval_secs)
    }
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Binarization level; pixels at or above become white
    pub threshold: u8,
    /// Tesseract page segmentation mode (6 = single uniform block of text)
    pub page_seg_mode: u8,
    /// Tesseract language
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            page_seg_mode: 6,
            language: "eng".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.storage.roi_profiles_file, PathBuf::from("roi_profiles.json"));
        assert_eq!(config.storage.identity_log_file, PathBuf::from("qr_code_data.csv"));
        assert!(config.storage.save_frames);

        assert_eq!(config.cameras.qr_index, 1);
        assert_eq!(config.cameras.ocr_index, 0);
        assert!(config.cameras.require_both_cameras);

        assert_eq!(config.inspection.capture_interval(), Duration::from_secs(10));
        assert_eq!(config.inspection.default_roi, RoiRect::new(0, 0, 100, 100));
        assert!(!config.inspection.reload_profiles_each_cycle);
        assert!(!config.inspection.accept_empty_match);

        assert_eq!(config.ocr.threshold, 150);
        assert_eq!(config.ocr.page_seg_mode, 6);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.cameras.qr_index = 3;
        config.inspection.capture_interval_secs = 2;
        config.inspection.default_roi = RoiRect::new(5, 6, 7, 8);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.cameras.qr_index, 3);
        assert_eq!(parsed.inspection.capture_interval_secs, 2);
        assert_eq!(parsed.inspection.default_roi, RoiRect::new(5, 6, 7, 8));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[inspection]\ncapture_interval_secs = 3\n").unwrap();

        assert_eq!(parsed.inspection.capture_interval_secs, 3);
        assert_eq!(parsed.ocr.threshold, 150);
        assert_eq!(parsed.cameras.ocr_index, 0);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.ocr.language, loaded.ocr.language);
        assert_eq!(config.inspection.capture_interval_secs, loaded.inspection.capture_interval_secs);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_against_data_dir() {
        let dir = TempDir::new().unwrap();
        let settings = StorageSettings {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let paths = settings.resolve().unwrap();
        assert_eq!(paths.roi_profiles, dir.path().join("roi_profiles.json"));
        assert_eq!(paths.identity_log, dir.path().join("qr_code_data.csv"));
        assert_eq!(paths.capture_dir, dir.path().join("captures"));
    }

    #[test]
    fn test_resolve_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("station");
        let settings = StorageSettings {
            data_dir: Some(data_dir.clone()),
            ..Default::default()
        };

        settings.resolve().unwrap();
        assert!(!data_dir.exists());
    }
}
