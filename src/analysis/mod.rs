//! Inspection analysis
//!
//! Verdict logic and the per-cycle report it feeds.

pub mod events;
pub mod verdict;

pub use events::{CycleReport, Inspection, OcrOutcome, QrOutcome};
pub use verdict::{Comparator, Verdict};
