//! Application Coordinator
//!
//! Manages the lifecycle of the inspection thread, including shared state
//! and communication with the operator.

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::inspection;
use crate::shared::{InspectionCommand, InspectionUpdate, RuntimeState, SharedState};

/// Main application coordinator
pub struct InspectionApp {
    config: AppConfig,
    /// State shared with the inspection thread
    pub shared_state: SharedState,
    /// Channel to send commands to the inspection thread
    pub to_inspection: Sender<InspectionCommand>,
    /// Channel to receive updates from the inspection thread
    pub from_inspection: Receiver<InspectionUpdate>,
    commands_rx: Receiver<InspectionCommand>,
    updates_tx: Sender<InspectionUpdate>,
    /// Handle to the inspection thread
    inspection_handle: Option<JoinHandle<Result<u64>>>,
}

impl InspectionApp {
    /// Create a new application coordinator
    pub fn new(config: AppConfig) -> Self {
        let (to_inspection, commands_rx) = unbounded();
        let (updates_tx, from_inspection) = unbounded();

        Self {
            config,
            shared_state: Arc::new(RwLock::new(RuntimeState::default())),
            to_inspection,
            from_inspection,
            commands_rx,
            updates_tx,
            inspection_handle: None,
        }
    }

    /// Start inspecting `model` in a background thread.
    ///
    /// Cameras and the OCR engine are created on that thread and never leave it.
    pub fn start(&mut self, model: &str) -> Result<()> {
        if self.is_running() {
            return Err(anyhow!("Inspection already running"));
        }

        // Reap the previous session and forget commands it never consumed
        if let Some(previous) = self.inspection_handle.take() {
            match previous.join() {
                Ok(Ok(cycles)) => debug!("Previous session ran {} cycles", cycles),
                Ok(Err(e)) => debug!("Previous session failed: {:#}", e),
                Err(_) => warn!("Previous inspection thread panicked"),
            }
        }
        let stale = self.commands_rx.try_iter().count();
        if stale > 0 {
            debug!("Discarded {} stale commands", stale);
        }
        *self.shared_state.write() = RuntimeState::default();

        let config = self.config.clone();
        let model = model.to_string();
        let state = self.shared_state.clone();
        let commands = self.commands_rx.clone();
        let updates = self.updates_tx.clone();

        let handle = std::thread::Builder::new()
            .name("inspection".to_string())
            .spawn(move || {
                info!("Inspection thread starting...");
                let result = inspection::run_session(&config, &model, state.clone(), &commands, updates);
                if let Err(e) = &result {
                    error!("Inspection error: {:#}", e);
                    state.write().set_error(format!("{:#}", e));
                }
                info!("Inspection thread exiting...");
                result
            })?;

        self.inspection_handle = Some(handle);
        info!("Inspection started in background thread");
        Ok(())
    }

    /// Ask the loop to stop after the current cycle
    pub fn stop(&self) {
        let _ = self.to_inspection.send(InspectionCommand::Stop);
    }

    /// Wait for the inspection thread to exit. Returns the number of cycles run.
    pub fn join(&mut self) -> Result<u64> {
        match self.inspection_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("Inspection thread panicked"))?,
            None => Ok(0),
        }
    }

    /// Check if the inspection thread is running
    pub fn is_running(&self) -> bool {
        self.inspection_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for InspectionApp {
    fn drop(&mut self) {
        // Signal the loop to stop
        self.stop();

        // Wait for the inspection thread to finish
        if let Some(handle) = self.inspection_handle.take() {
            let _ = handle.join();
        }
    }
}
