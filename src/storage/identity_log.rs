//! Append-only QR identity log
//!
//! One CSV row per distinct QR payload. The most recently appended row is the
//! identity the next OCR reading is compared against.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Column headers, written once when the log is created
pub const COLUMNS: [&str; 5] = [
    "Identifier",
    "Model Number",
    "Trimmed Model Number",
    "Destination Code",
    "Serial Number",
];

/// Number of leading model-number characters printed on the carton
pub const TRIMMED_MODEL_LEN: usize = 7;

/// Identity decoded from a carton QR label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(rename = "Identifier")]
    pub identifier: String,
    #[serde(rename = "Model Number")]
    pub model_number: String,
    #[serde(rename = "Trimmed Model Number")]
    pub trimmed_model_number: String,
    #[serde(rename = "Destination Code")]
    pub destination_code: String,
    #[serde(rename = "Serial Number")]
    pub serial_number: String,
}

impl IdentityRecord {
    pub fn new(
        identifier: impl Into<String>,
        model_number: impl Into<String>,
        destination_code: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        let model_number = model_number.into();
        Self {
            identifier: identifier.into(),
            trimmed_model_number: trim_model_number(&model_number),
            model_number,
            destination_code: destination_code.into(),
            serial_number: serial_number.into(),
        }
    }
}

/// First [`TRIMMED_MODEL_LEN`] characters, or the whole string when shorter
pub fn trim_model_number(model_number: &str) -> String {
    model_number.chars().take(TRIMMED_MODEL_LEN).collect()
}

/// Destination for newly decoded identities
pub trait IdentitySink {
    fn append(&mut self, record: &IdentityRecord) -> Result<()>;
}

/// Source of the model number the OCR reading must match
pub trait ExpectedModelSource {
    /// Trimmed model number of the latest identity, `None` when unavailable
    fn latest_trimmed_model_number(&self) -> Option<String>;
}

/// CSV-backed identity log
#[derive(Debug, Clone)]
pub struct IdentityLog {
    path: PathBuf,
}

impl IdentityLog {
    /// Open the log, creating it with a header row if it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create identity log {:?}", path))?;
            writer.write_record(COLUMNS)?;
            writer.flush()?;
            debug!("Created identity log {:?}", path);
        }

        Ok(Self { path })
    }

    /// Handle to the log at `path` without touching the filesystem
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Every record in file order
    pub fn records(&self) -> Result<Vec<IdentityRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open identity log {:?}", self.path))?;

        reader
            .deserialize()
            .collect::<Result<Vec<IdentityRecord>, _>>()
            .with_context(|| format!("Failed to parse identity log {:?}", self.path))
    }

    /// The most recently appended record. Re-reads the whole file.
    pub fn latest(&self) -> Result<Option<IdentityRecord>> {
        Ok(self.records()?.pop())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentitySink for IdentityLog {
    fn append(&mut self, record: &IdentityRecord) -> Result<()> {
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open identity log {:?}", self.path))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(COLUMNS)?;
        }
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }
}

impl ExpectedModelSource for IdentityLog {
    fn latest_trimmed_model_number(&self) -> Option<String> {
        match self.latest() {
            Ok(Some(record)) => Some(record.trimmed_model_number),
            Ok(None) => {
                warn!("Identity log {:?} has no records yet", self.path);
                None
            }
            Err(e) => {
                warn!("Error reading identity log: {:#}", e);
                None
            }
        }
    }
}
