//! ROI profile storage
//!
//! Maps a carton model name to the rectangle the OCR camera frame is cropped
//! to. Stored as a pretty-printed JSON object: `{ "MODEL": [left, top, width, height] }`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Crop rectangle in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct RoiRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Whether the rectangle covers at least one pixel
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl From<[u32; 4]> for RoiRect {
    fn from([left, top, width, height]: [u32; 4]) -> Self {
        Self::new(left, top, width, height)
    }
}

impl From<RoiRect> for [u32; 4] {
    fn from(rect: RoiRect) -> Self {
        [rect.left, rect.top, rect.width, rect.height]
    }
}

impl fmt::Display for RoiRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.width, self.height)
    }
}

/// Parses `left,top,width,height`
impl FromStr for RoiRect {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ProfileError::InvalidRect(s.to_string()))?;

        match parts.as_slice() {
            &[left, top, width, height] => Ok(Self::new(left, top, width, height)),
            _ => Err(ProfileError::InvalidRect(s.to_string())),
        }
    }
}

/// Rejected profile input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("model name must not be empty")]
    EmptyModelName,
    #[error("ROI for model '{model}' has zero size ({rect})")]
    EmptyRect { model: String, rect: RoiRect },
    #[error("invalid rectangle '{0}', expected left,top,width,height")]
    InvalidRect(String),
}

/// ROI profiles backed by a JSON file
#[derive(Debug, Clone)]
pub struct RoiProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, RoiRect>,
}

impl RoiProfileStore {
    /// Load profiles from `path`.
    ///
    /// A missing or unparseable file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match read_profiles(&path) {
            Ok(Some(profiles)) => {
                debug!("Loaded {} ROI profiles from {:?}", profiles.len(), path);
                profiles
            }
            Ok(None) => {
                debug!("No ROI profile file at {:?}", path);
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable ROI profile file {:?}: {:#}", path, e);
                BTreeMap::new()
            }
        };

        Self { path, profiles }
    }

    /// Re-read the backing file, replacing the in-memory profiles
    pub fn reload(&mut self) {
        *self = Self::load(self.path.clone());
    }

    /// Rewrite the whole mapping to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&self.profiles)?;

        // Write next to the target and rename so a reader never sees a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        debug!("Saved {} ROI profiles to {:?}", self.profiles.len(), self.path);
        Ok(())
    }

    /// Insert or replace the ROI for a model. Call [`save`](Self::save) afterwards.
    pub fn set(&mut self, model_name: &str, rect: RoiRect) -> Result<(), ProfileError> {
        let model_name = model_name.trim();
        if model_name.is_empty() {
            return Err(ProfileError::EmptyModelName);
        }
        if !rect.is_valid() {
            return Err(ProfileError::EmptyRect {
                model: model_name.to_string(),
                rect,
            });
        }

        self.profiles.insert(model_name.to_string(), rect);
        Ok(())
    }

    /// Stored ROI for a model, or `default` when the model has none
    pub fn get(&self, model_name: &str, default: RoiRect) -> RoiRect {
        self.profiles.get(model_name).copied().unwrap_or(default)
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.profiles.contains_key(model_name)
    }

    /// Remove a model's ROI. Call [`save`](Self::save) afterwards.
    pub fn remove(&mut self, model_name: &str) -> Option<RoiRect> {
        self.profiles.remove(model_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RoiRect)> {
        self.profiles.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_profiles(path: &Path) -> Result<Option<BTreeMap<String, RoiRect>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let profiles = serde_json::from_str(&content)?;
    Ok(Some(profiles))
}
