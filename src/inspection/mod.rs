//! Inspection Loop
//!
//! Owns both station cameras and, at a fixed interval, captures a frame from
//! each: the QR camera frame feeds the identity log, the OCR camera frame is
//! cropped to the selected model's ROI and read. The reading is compared
//! against the latest identity in the log, not against this cycle's QR
//! decode, so a cycle whose QR read fails is judged against an earlier label.

use anyhow::{bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::analysis::{Comparator, CycleReport, Inspection, OcrOutcome, QrOutcome};
use crate::capture::frame::{CapturedFrame, FrameArchive};
use crate::capture::{CameraBackend, CameraRole, FrameSource};
use crate::config::{AppConfig, CameraSettings, InspectionSettings};
use crate::shared::{InspectionCommand, InspectionUpdate, LoopState, SharedState};
use crate::storage::identity_log::{ExpectedModelSource, IdentityLog, IdentitySink};
use crate::storage::profiles::RoiProfileStore;
use crate::vision::{self, crop_to_roi, qr, OcrExtractor, QrDecoder, RqrrDecoder, TextRecognizer};

/// Everything a cycle talks to besides the cameras
pub struct Collaborators {
    pub qr_decoder: Box<dyn QrDecoder>,
    pub recognizer: Box<dyn TextRecognizer>,
    /// Where decoded identities are appended
    pub identity_sink: Box<dyn IdentitySink>,
    /// Where the expected model number is read back from
    pub expected: Box<dyn ExpectedModelSource>,
    pub profiles: RoiProfileStore,
    /// `None` disables frame archiving
    pub archive: Option<FrameArchive>,
}

impl Collaborators {
    /// Production collaborators built from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let paths = config.storage.resolve()?;

        let identity_log = IdentityLog::open(&paths.identity_log)?;
        let profiles = RoiProfileStore::load(&paths.roi_profiles);
        let archive = if config.storage.save_frames {
            Some(FrameArchive::new(&paths.capture_dir)?)
        } else {
            None
        };

        Ok(Self {
            qr_decoder: Box::new(RqrrDecoder),
            recognizer: vision::create_recognizer(&config.ocr)?,
            identity_sink: Box::new(identity_log.clone()),
            expected: Box::new(identity_log),
            profiles,
            archive,
        })
    }
}

/// The dual-camera capture loop for one model
pub struct InspectionLoop {
    model: String,
    settings: InspectionSettings,
    qr_camera: Option<Box<dyn FrameSource>>,
    ocr_camera: Option<Box<dyn FrameSource>>,
    qr_decoder: Box<dyn QrDecoder>,
    ocr: OcrExtractor<Box<dyn TextRecognizer>>,
    identity_sink: Box<dyn IdentitySink>,
    expected: Box<dyn ExpectedModelSource>,
    profiles: RoiProfileStore,
    archive: Option<FrameArchive>,
    comparator: Comparator,
    state: SharedState,
    updates: Option<Sender<InspectionUpdate>>,
    cycle: u64,
}

impl InspectionLoop {
    pub fn new(
        model: impl Into<String>,
        settings: InspectionSettings,
        ocr_threshold: u8,
        parts: Collaborators,
        state: SharedState,
    ) -> Self {
        let model = model.into();
        if !parts.profiles.contains(&model) {
            warn!(
                "No ROI profile for model '{}', using default ROI {}",
                model, settings.default_roi
            );
        }

        {
            let mut state = state.write();
            state.model = Some(model.clone());
            state.loop_state = LoopState::Idle;
        }

        Self {
            comparator: Comparator::from_accept_empty(settings.accept_empty_match),
            model,
            settings,
            qr_camera: None,
            ocr_camera: None,
            qr_decoder: parts.qr_decoder,
            ocr: OcrExtractor::with_threshold(parts.recognizer, ocr_threshold),
            identity_sink: parts.identity_sink,
            expected: parts.expected,
            profiles: parts.profiles,
            archive: parts.archive,
            state,
            updates: None,
            cycle: 0,
        }
    }

    /// Send lifecycle and per-cycle updates to `updates`
    pub fn with_updates(mut self, updates: Sender<InspectionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn loop_state(&self) -> LoopState {
        self.state.read().loop_state
    }

    /// Open both cameras and enter `Streaming`.
    ///
    /// Every camera that fails is reported. When both are required and either
    /// failed, the opened one is released and the loop stays `Idle`.
    pub fn open_cameras(&mut self, backend: &dyn CameraBackend, cameras: &CameraSettings) -> Result<()> {
        let qr_camera = self.open_camera(backend, CameraRole::Qr, cameras.qr_index);
        let ocr_camera = self.open_camera(backend, CameraRole::Ocr, cameras.ocr_index);

        let missing = qr_camera.is_none() || ocr_camera.is_none();
        if missing && (cameras.require_both_cameras || (qr_camera.is_none() && ocr_camera.is_none())) {
            let message = "Inspection needs both cameras; not streaming";
            self.state.write().set_error(message);
            bail!(message);
        }
        if missing {
            warn!("Running degraded with a single camera");
        }

        self.qr_camera = qr_camera;
        self.ocr_camera = ocr_camera;
        {
            let mut state = self.state.write();
            state.clear_error();
            state.loop_state = LoopState::Streaming;
        }

        info!("Cameras initialized. Streaming model '{}'...", self.model);
        self.notify(InspectionUpdate::Streaming {
            model: self.model.clone(),
        });
        Ok(())
    }

    fn open_camera(&self, backend: &dyn CameraBackend, role: CameraRole, index: u32) -> Option<Box<dyn FrameSource>> {
        match backend.open(index) {
            Ok(camera) => {
                info!("{} opened: {}", role, camera.name());
                Some(camera)
            }
            Err(e) => {
                warn!("Camera {} not found ({}): {}", index, role, e);
                self.notify(InspectionUpdate::CameraUnavailable {
                    role,
                    index,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Run cycles until stopped. Returns the number of cycles run.
    ///
    /// Each wait starts when the previous cycle ends. A `Stop` command, or
    /// every command sender being dropped, ends the loop during the wait.
    pub fn run(&mut self, commands: &Receiver<InspectionCommand>) -> u64 {
        if self.loop_state() != LoopState::Streaming {
            warn!("Inspection loop started without open cameras");
            self.release();
            return 0;
        }

        let interval = self.settings.capture_interval();
        let started_at = self.cycle;
        info!("Capturing every {:?}", interval);

        loop {
            if let Some(max) = self.settings.max_cycles {
                if self.cycle - started_at >= max {
                    info!("Reached {} cycles", max);
                    break;
                }
            }

            match commands.recv_timeout(interval) {
                Ok(InspectionCommand::Stop) => {
                    info!("Stop requested");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Command channel closed, stopping");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            let report = self.tick();
            self.notify(InspectionUpdate::Cycle(Box::new(report)));
        }

        self.release();
        self.cycle - started_at
    }

    /// Run one capture cycle
    pub fn tick(&mut self) -> CycleReport {
        self.cycle += 1;
        self.state.write().loop_state = LoopState::Capturing;

        let mut report = CycleReport::new(self.cycle);
        report.qr = self.inspect_qr();
        report.ocr = self.inspect_ocr();

        match &report.ocr {
            OcrOutcome::Inspected(inspection) => info!(
                "Cycle {}: {} (read {:?}, expected {:?})",
                report.cycle, inspection.verdict, inspection.extracted_text, inspection.expected
            ),
            _ => info!("Cycle {}: no OCR frame, no verdict", report.cycle),
        }

        {
            let mut state = self.state.write();
            state.record_cycle(&report);
            state.loop_state = LoopState::Streaming;
        }

        report
    }

    fn inspect_qr(&mut self) -> QrOutcome {
        let Some(camera) = self.qr_camera.as_mut() else {
            return QrOutcome::Skipped;
        };

        let image = match camera.read_frame() {
            Ok(image) => image,
            Err(e) => {
                warn!("QR camera read failed: {}", e);
                return QrOutcome::ReadFailed(e.to_string());
            }
        };

        let frame = CapturedFrame::new(image, CameraRole::Qr);
        let frame_path = self.archive_frame(&frame);
        let records = qr::process(self.qr_decoder.as_ref(), &frame.image, self.identity_sink.as_mut());

        QrOutcome::Decoded { frame_path, records }
    }

    fn inspect_ocr(&mut self) -> OcrOutcome {
        let Some(camera) = self.ocr_camera.as_mut() else {
            return OcrOutcome::Skipped;
        };

        let image = match camera.read_frame() {
            Ok(image) => image,
            Err(e) => {
                warn!("OCR camera read failed: {}", e);
                return OcrOutcome::ReadFailed(e.to_string());
            }
        };

        let frame = CapturedFrame::new(image, CameraRole::Ocr);
        let frame_path = self.archive_frame(&frame);

        if self.settings.reload_profiles_each_cycle {
            self.profiles.reload();
        }
        let roi = self.profiles.get(&self.model, self.settings.default_roi);
        let crop = crop_to_roi(&frame.image, roi);

        let extracted_text = match self.ocr.extract(&crop) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("OCR failed: {:#}", e);
                None
            }
        };

        let expected = self.expected.latest_trimmed_model_number();
        let verdict = self
            .comparator
            .compare(extracted_text.as_deref(), expected.as_deref());

        OcrOutcome::Inspected(Inspection {
            frame_path,
            roi,
            extracted_text,
            expected,
            verdict,
        })
    }

    fn archive_frame(&mut self, frame: &CapturedFrame) -> Option<PathBuf> {
        let archive = self.archive.as_mut()?;
        match archive.save(frame) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not archive {} frame: {:#}", frame.role, e);
                None
            }
        }
    }

    /// Release both cameras and enter `Stopped`
    fn release(&mut self) {
        self.qr_camera = None;
        self.ocr_camera = None;
        self.state.write().loop_state = LoopState::Stopped;
        info!("Inspection stopped after {} cycles, cameras released", self.cycle);
        self.notify(InspectionUpdate::Stopped { cycles: self.cycle });
    }

    fn notify(&self, update: InspectionUpdate) {
        if let Some(updates) = &self.updates {
            if updates.send(update).is_err() {
                debug!("Update receiver gone");
            }
        }
    }
}

/// Build, open and run a session from configuration on the current thread
pub fn run_session(
    config: &AppConfig,
    model: &str,
    state: SharedState,
    commands: &Receiver<InspectionCommand>,
    updates: Sender<InspectionUpdate>,
) -> Result<u64> {
    let parts = Collaborators::from_config(config)?;
    let mut inspection = InspectionLoop::new(
        model,
        config.inspection.clone(),
        config.ocr.threshold,
        parts,
        state,
    )
    .with_updates(updates);

    let backend = crate::capture::backend_for(&config.cameras);
    debug!("Using {} camera backend", backend.name());

    if let Err(e) = inspection.open_cameras(backend.as_ref(), &config.cameras) {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(inspection.run(commands))
}
