//! Spotter Gateway - voice-driven object finder
//!
//! Speak the name of an object, point a camera at the world, and be
//! told when it shows up. This library provides the two cooperating
//! subsystems:
//! - the capture/detection session loop: a state machine driving
//!   periodic frame capture against an external detection service
//! - the session relay: a session-keyed notification hub that tells
//!   companion devices when a target was found
//!
//! # Architecture
//!
//! ```text
//! microphone ─▶ normalize(target) ─▶ ScanSession ─▶ Detector ─▶ feedback
//!                                        │
//!                                   ScanController (timer)
//!
//! notifier ─▶ POST /notify ─▶ SessionRelay ─▶ every peer socket in session
//! ```

pub mod config;
pub mod detect;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod relay;
pub mod scan;
pub mod speech;
pub mod target;

pub use config::Config;
pub use detect::{DetectRequest, Detection, DetectionResult, Detector, HttpDetector};
pub use error::{Error, Result};
pub use feedback::{AudioFeedback, Feedback, LogFeedback};
pub use frame::{FrameSource, ImageDirSource, RawFrame};
pub use relay::{NotifyOutcome, SessionRelay};
pub use scan::{CycleOutcome, ScanConfig, ScanController, ScanSession, ScanState};
pub use speech::{NoSpeech, PresetSpeech, SpeechCapture};
pub use target::{Target, normalize};
