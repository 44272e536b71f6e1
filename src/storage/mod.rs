//! Storage Layer
//!
//! Handles persistence of ROI profiles and the QR identity log.

pub mod identity_log;
pub mod profiles;

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "cartoninspector", "CartonInspector")
        .ok_or_else(|| anyhow::anyhow!("Could not determine project directories"))
}

/// Get the application data directory. Not created until something is written.
pub fn get_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}
