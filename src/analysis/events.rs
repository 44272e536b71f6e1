//! Per-cycle inspection results

use chrono::{DateTime, Local};
use std::path::PathBuf;

use super::Verdict;
use crate::storage::identity_log::IdentityRecord;
use crate::storage::profiles::RoiRect;

/// What happened during one capture cycle. Never persisted.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based cycle number within the session
    pub cycle: u64,
    /// When the cycle started
    pub started_at: DateTime<Local>,
    /// Outcome of the QR camera half
    pub qr: QrOutcome,
    /// Outcome of the OCR camera half
    pub ocr: OcrOutcome,
}

impl CycleReport {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            started_at: Local::now(),
            qr: QrOutcome::Skipped,
            ocr: OcrOutcome::Skipped,
        }
    }

    /// Verdict for this cycle, if the OCR half ran
    pub fn verdict(&self) -> Option<Verdict> {
        match &self.ocr {
            OcrOutcome::Inspected(inspection) => Some(inspection.verdict),
            _ => None,
        }
    }
}

/// QR camera half of a cycle
#[derive(Debug, Clone)]
pub enum QrOutcome {
    /// Camera not open
    Skipped,
    /// Frame read failed
    ReadFailed(String),
    /// Frame decoded; holds the identities newly appended to the log
    Decoded {
        frame_path: Option<PathBuf>,
        records: Vec<IdentityRecord>,
    },
}

/// OCR camera half of a cycle
#[derive(Debug, Clone)]
pub enum OcrOutcome {
    /// Camera not open
    Skipped,
    /// Frame read failed
    ReadFailed(String),
    /// Frame read and compared
    Inspected(Inspection),
}

/// OCR reading compared against the expected identity
#[derive(Debug, Clone)]
pub struct Inspection {
    pub frame_path: Option<PathBuf>,
    pub roi: RoiRect,
    /// Normalized OCR text; `None` when the recognizer failed
    pub extracted_text: Option<String>,
    /// Trimmed model number from the latest identity record
    pub expected: Option<String>,
    pub verdict: Verdict,
}
