//! Message types for communication between the operator and the inspection loop

use crate::analysis::CycleReport;
use crate::capture::CameraRole;

/// Messages sent from the operator to the inspection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionCommand {
    /// Finish the current cycle and release the cameras
    Stop,
}

/// Messages sent from the inspection loop to the operator
#[derive(Debug, Clone)]
pub enum InspectionUpdate {
    /// A camera could not be opened
    CameraUnavailable {
        role: CameraRole,
        index: u32,
        reason: String,
    },
    /// Cameras are open and the loop is waiting for the first tick
    Streaming {
        model: String,
    },
    /// A capture cycle finished
    Cycle(Box<CycleReport>),
    /// The loop has exited and released its cameras
    Stopped {
        cycles: u64,
    },
}
