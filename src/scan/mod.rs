//! Capture/detection session loop
//!
//! The session is an explicit state machine: `Idle → Listening →
//! Scanning → Found`, back to `Listening` on a new recording request or
//! `Idle` on explicit stop. It owns no timers itself; the
//! [`controller`] drives [`ScanSession::tick`] on the configured
//! cadence, so tests can step the machine with fakes and no hardware.

pub mod controller;
pub mod history;

pub use controller::ScanController;
pub use history::{DebugEntry, DebugHistory};

use std::sync::Arc;
use std::time::Duration;

use crate::detect::{DetectRequest, Detector};
use crate::feedback::{FOUND_VIBRATION_MS, Feedback};
use crate::frame::{FrameSource, encode_frame};
use crate::speech::SpeechCapture;
use crate::target::Target;
use crate::{Error, Result};

/// Scan session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No camera, recognizer idle
    Idle,
    /// Voice capture active
    Listening,
    /// Camera active, periodic detection running
    Scanning,
    /// Target found; the camera stays live so the search can re-arm
    Found,
}

/// Tunable scan parameters, mutable at any time
///
/// An interval change takes effect on the next scheduled capture
/// without restarting the camera stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Minimum detection confidence, in `[0, 1]`
    pub threshold: f32,
    /// Gap between captures; must be positive
    pub scan_interval: Duration,
    /// Emit the found tone on positive cycles
    pub beep_enabled: bool,
    /// Keep a bounded history of detection cycles
    pub debug_enabled: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            scan_interval: Duration::from_secs(2),
            beep_enabled: true,
            debug_enabled: false,
        }
    }
}

impl ScanConfig {
    /// Validate ranges, clamping the threshold into `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns error if the scan interval is not positive.
    pub fn validated(mut self) -> Result<Self> {
        if self.scan_interval.is_zero() {
            return Err(Error::Config("scan interval must be positive".to_string()));
        }
        self.threshold = self.threshold.clamp(0.0, 1.0);
        Ok(self)
    }
}

/// Outcome of one capture cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The session is not scanning; nothing was captured
    Inactive,
    /// A previous cycle's detection request is still outstanding
    Busy,
    /// The cycle completed with a detection response
    Done { found: bool },
    /// The cycle failed; the loop continues on the next tick
    Failed(String),
}

/// One voice-to-detection search session
///
/// All device access goes through the injected capabilities, and the
/// detector is a trait, so the whole machine runs under test with
/// deterministic fakes.
pub struct ScanSession {
    state: ScanState,
    target: Target,
    config: ScanConfig,
    status: String,
    speech: Box<dyn SpeechCapture>,
    camera: Box<dyn FrameSource>,
    feedback: Box<dyn Feedback>,
    detector: Arc<dyn Detector>,
    history: DebugHistory,
    last_preview: Option<Vec<u8>>,
    last_frame_png: Option<Vec<u8>>,
    in_flight: bool,
}

impl ScanSession {
    /// Create a session over the given capabilities
    #[must_use]
    pub fn new(
        speech: Box<dyn SpeechCapture>,
        camera: Box<dyn FrameSource>,
        feedback: Box<dyn Feedback>,
        detector: Arc<dyn Detector>,
        config: ScanConfig,
    ) -> Self {
        Self {
            state: ScanState::Idle,
            target: Target::default(),
            config,
            status: String::new(),
            speech,
            camera,
            feedback,
            detector,
            history: DebugHistory::default(),
            last_preview: None,
            last_frame_png: None,
            in_flight: false,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Current target (possibly empty)
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// User-visible status line
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Debug history of recent cycles (populated when debug is enabled)
    #[must_use]
    pub fn history(&self) -> &DebugHistory {
        &self.history
    }

    /// The most recent annotated preview from the detector
    #[must_use]
    pub fn last_preview(&self) -> Option<&[u8]> {
        self.last_preview.as_deref()
    }

    /// The most recent submitted frame (kept when debug is enabled)
    #[must_use]
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.last_frame_png.as_deref()
    }

    /// Replace the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the new configuration is invalid; the old one
    /// stays in effect.
    pub fn set_config(&mut self, config: ScanConfig) -> Result<()> {
        self.config = config.validated()?;
        Ok(())
    }

    /// Begin voice capture for a new target
    ///
    /// Tears down an in-progress scan first so the new target starts
    /// clean. Transitions to `Listening`.
    ///
    /// # Errors
    ///
    /// Returns error when no speech recognizer exists; the session is
    /// left unchanged apart from the status text, and there is no
    /// retry.
    pub fn start_recording(&mut self) -> Result<()> {
        if !self.speech.is_available() {
            self.status = "speech recognition is not available".to_string();
            return Err(Error::Capability("speech recognition".to_string()));
        }

        if matches!(self.state, ScanState::Scanning | ScanState::Found) {
            self.release_camera();
        }

        self.speech.start()?;
        self.state = ScanState::Listening;
        self.status = "listening...".to_string();
        tracing::debug!("recording started");
        Ok(())
    }

    /// Accept a speech transcript and derive the target from it
    pub fn on_transcript(&mut self, raw: &str) {
        self.target = Target::from_transcript(raw);
        if self.target.is_empty() {
            self.status = "heard nothing usable".to_string();
        } else {
            self.status = format!("target: {}", self.target);
        }
        tracing::info!(transcript = raw, target = %self.target, "transcript received");
    }

    /// End voice capture and begin scanning
    ///
    /// # Errors
    ///
    /// Returns error if the session is not listening, or if the camera
    /// cannot be acquired — in that case the session stays in
    /// `Listening` with scanning disabled rather than silently
    /// retrying.
    pub fn stop_recording(&mut self) -> Result<()> {
        if self.state != ScanState::Listening {
            return Err(Error::State(format!(
                "stop_recording while {:?}",
                self.state
            )));
        }

        self.speech.stop();
        self.acquire_camera()?;
        self.state = ScanState::Scanning;
        self.status = format!("scanning for {}", self.target);
        tracing::debug!(target = %self.target, "scanning started");
        Ok(())
    }

    /// Resume scanning with the previously recorded target
    ///
    /// # Errors
    ///
    /// Returns error if the session is not idle or the camera cannot be
    /// acquired.
    pub fn start_scanning(&mut self) -> Result<()> {
        if self.state != ScanState::Idle {
            return Err(Error::State(format!(
                "start_scanning while {:?}",
                self.state
            )));
        }

        self.acquire_camera()?;
        self.state = ScanState::Scanning;
        self.status = format!("scanning for {}", self.target);
        Ok(())
    }

    /// Stop scanning, releasing the camera; the target is retained
    pub fn stop_detecting(&mut self) {
        self.release_camera();
        if self.state == ScanState::Listening {
            self.speech.stop();
        }
        self.state = ScanState::Idle;
        self.status = "stopped".to_string();
        tracing::debug!("detection stopped");
    }

    /// Run one capture cycle
    ///
    /// At most one detection request is ever outstanding per session: a
    /// tick arriving while the previous response is pending is skipped
    /// rather than queued. Failures are reported through the status
    /// line and do not stop the loop.
    pub async fn tick(&mut self) -> CycleOutcome {
        if !matches!(self.state, ScanState::Scanning | ScanState::Found) {
            return CycleOutcome::Inactive;
        }
        if self.in_flight {
            tracing::trace!("capture skipped, request outstanding");
            return CycleOutcome::Busy;
        }

        self.in_flight = true;
        let outcome = self.run_cycle().await;
        self.in_flight = false;

        if let CycleOutcome::Failed(reason) = &outcome {
            self.status = format!("detection failed: {reason}");
            tracing::warn!(reason, "capture cycle failed");
        }
        outcome
    }

    async fn run_cycle(&mut self) -> CycleOutcome {
        let frame = match self.camera.grab() {
            Ok(frame) => frame,
            Err(e) => return CycleOutcome::Failed(e.to_string()),
        };

        let image_png = match encode_frame(&frame) {
            Ok(png) => png,
            Err(e) => return CycleOutcome::Failed(e.to_string()),
        };

        if self.config.debug_enabled {
            self.last_frame_png = Some(image_png.clone());
        }

        let request = DetectRequest {
            image_png,
            target: self.target.as_str().to_string(),
            threshold: self.config.threshold,
        };

        let result = match self.detector.detect(&request).await {
            Ok(result) => result,
            Err(e) => return CycleOutcome::Failed(e.to_string()),
        };

        if let Some(preview) = &result.preview_png {
            self.last_preview = Some(preview.clone());
        }

        if self.config.debug_enabled {
            self.history.record(DebugEntry {
                at: chrono::Utc::now(),
                found: result.found,
                detections: result.detections.clone(),
                preview_png: result.preview_png.clone(),
            });
        }

        if result.found {
            // Level-triggered: every positive cycle re-fires feedback so
            // the user gets continuous confirmation while the target
            // stays in frame.
            if self.config.beep_enabled {
                self.feedback.beep();
            }
            self.feedback.vibrate(FOUND_VIBRATION_MS);
            self.state = ScanState::Found;
            self.status = format!("found {}", self.target);
        } else {
            if self.state == ScanState::Found {
                self.state = ScanState::Scanning;
            }
            self.status = format!("scanning for {}", self.target);
        }

        CycleOutcome::Done {
            found: result.found,
        }
    }

    fn acquire_camera(&mut self) -> Result<()> {
        self.camera.open().map_err(|e| {
            self.status = format!("camera unavailable: {e}");
            tracing::warn!(error = %e, "camera acquisition failed");
            e
        })
    }

    fn release_camera(&mut self) {
        if self.camera.is_open() {
            self.camera.close();
        }
        self.in_flight = false;
    }
}
