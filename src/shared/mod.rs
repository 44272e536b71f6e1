//! Shared state and messaging between the inspection thread and the operator
//!
//! This module provides thread-safe shared state and message passing
//! for communication between the inspection loop and whoever drives it.

pub mod messages;
pub mod state;

pub use messages::{InspectionCommand, InspectionUpdate};
pub use state::{LoopState, RuntimeState, SharedState};
