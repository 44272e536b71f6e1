//! Runtime state shared between the inspection thread and the operator

use parking_lot::RwLock;
use std::sync::Arc;

use crate::analysis::{CycleReport, OcrOutcome, QrOutcome, Verdict};

/// Shared handle to the runtime state
pub type SharedState = Arc<RwLock<RuntimeState>>;

/// Inspection loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Cameras not opened
    #[default]
    Idle,
    /// Cameras open, waiting for the next tick
    Streaming,
    /// Running a capture cycle
    Capturing,
    /// Loop exited, cameras released
    Stopped,
}

/// Counters for the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub passes: u64,
    pub fails: u64,
    pub qr_read_failures: u64,
    pub ocr_read_failures: u64,
    pub identities_logged: u64,
}

impl SessionStats {
    /// Fold one cycle into the counters
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;

        match &report.qr {
            QrOutcome::ReadFailed(_) => self.qr_read_failures += 1,
            QrOutcome::Decoded { records, .. } => self.identities_logged += records.len() as u64,
            QrOutcome::Skipped => {}
        }

        match &report.ocr {
            OcrOutcome::ReadFailed(_) => self.ocr_read_failures += 1,
            OcrOutcome::Inspected(inspection) => match inspection.verdict {
                Verdict::Pass => self.passes += 1,
                Verdict::Fail => self.fails += 1,
            },
            OcrOutcome::Skipped => {}
        }
    }
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Where the loop is in its lifecycle
    pub loop_state: LoopState,
    /// Model selected for the session
    pub model: Option<String>,
    /// Session counters
    pub stats: SessionStats,
    /// Verdict of the most recent inspected cycle
    pub last_verdict: Option<Verdict>,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Fold a finished cycle into the state
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.stats.record(report);
        if let Some(verdict) = report.verdict() {
            self.last_verdict = Some(verdict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Inspection;
    use crate::storage::identity_log::IdentityRecord;
    use crate::storage::profiles::RoiRect;

    fn inspected(verdict: Verdict) -> OcrOutcome {
        OcrOutcome::Inspected(Inspection {
            frame_path: None,
            roi: RoiRect::new(0, 0, 1, 1),
            extracted_text: None,
            expected: None,
            verdict,
        })
    }

    #[test]
    fn test_stats_count_outcomes() {
        let mut state = RuntimeState::default();

        let mut first = CycleReport::new(1);
        first.qr = QrOutcome::Decoded {
            frame_path: None,
            records: vec![IdentityRecord::new("ID", "MODEL", "D", "S")],
        };
        first.ocr = inspected(Verdict::Pass);
        state.record_cycle(&first);

        let mut second = CycleReport::new(2);
        second.qr = QrOutcome::ReadFailed("timeout".into());
        second.ocr = OcrOutcome::ReadFailed("timeout".into());
        state.record_cycle(&second);

        let mut third = CycleReport::new(3);
        third.ocr = inspected(Verdict::Fail);
        state.record_cycle(&third);

        assert_eq!(
            state.stats,
            SessionStats {
                cycles: 3,
                passes: 1,
                fails: 1,
                qr_read_failures: 1,
                ocr_read_failures: 1,
                identities_logged: 1,
            }
        );
        assert_eq!(state.last_verdict, Some(Verdict::Fail));
    }

    #[test]
    fn test_cycle_without_verdict_keeps_last() {
        let mut state = RuntimeState::default();
        let mut report = CycleReport::new(1);
        report.ocr = inspected(Verdict::Pass);
        state.record_cycle(&report);

        state.record_cycle(&CycleReport::new(2));
        assert_eq!(state.last_verdict, Some(Verdict::Pass));
    }

    #[test]
    fn test_error_state() {
        let mut state = RuntimeState::default();
        state.set_error("camera 1 not found");
        assert_eq!(state.last_error.as_deref(), Some("camera 1 not found"));
        state.clear_error();
        assert!(state.last_error.is_none());
    }
}
