//! Shared test fakes for driving the scan loop without hardware

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use spotter_gateway::detect::{DetectRequest, Detection, DetectionResult, Detector};
use spotter_gateway::frame::{FrameSource, RawFrame};
use spotter_gateway::speech::SpeechCapture;
use spotter_gateway::{Error, Feedback, Result};

/// Speech recognizer fake with configurable availability
pub struct FakeSpeech {
    pub available: bool,
}

impl SpeechCapture for FakeSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::Capability("speech recognition".to_string()))
        }
    }

    fn stop(&mut self) {}
}

/// Observation handles shared out of the boxed fakes
pub struct Handles {
    pub camera_open: Arc<AtomicBool>,
    pub beeps: Arc<AtomicUsize>,
    pub vibrations: Arc<AtomicUsize>,
    pub detector_calls: Arc<AtomicUsize>,
}

/// Camera fake tracking open state
pub struct FakeCamera {
    pub fail_open: bool,
    pub opened: Arc<AtomicBool>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            fail_open: false,
            opened: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for FakeCamera {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(Error::Capture("no camera".to_string()));
        }
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn grab(&mut self) -> Result<RawFrame> {
        if !self.opened.load(Ordering::SeqCst) {
            return Err(Error::Capture("camera closed".to_string()));
        }
        Ok(RawFrame {
            width: 2,
            height: 2,
            rgb: vec![0; 12],
        })
    }

    fn close(&mut self) {
        self.opened.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Scripted detection step
pub enum Step {
    Found,
    NotFound,
    Fail,
}

/// Detector fake: plays back a script, then repeats the last behavior
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Step>>,
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(script: Vec<Step>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(script)
        }
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, request: &DetectRequest) -> Result<DetectionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut script = self.script.lock().await;
        let step = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            match script.front() {
                Some(Step::Found) => Step::Found,
                Some(Step::Fail) => Step::Fail,
                _ => Step::NotFound,
            }
        };

        match step {
            Step::Fail => Err(Error::Detector("connection refused".to_string())),
            Step::NotFound => Ok(DetectionResult::default()),
            Step::Found => Ok(DetectionResult {
                found: true,
                detections: vec![Detection {
                    label: request.target.clone(),
                    confidence: 0.9,
                    bbox: [0.0, 0.0, 10.0, 10.0],
                }],
                preview_png: None,
            }),
        }
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Feedback fake counting beeps and vibrations
pub struct CountingFeedback {
    pub beeps: Arc<AtomicUsize>,
    pub vibrations: Arc<AtomicUsize>,
}

impl CountingFeedback {
    pub fn new() -> Self {
        Self {
            beeps: Arc::new(AtomicUsize::new(0)),
            vibrations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Feedback for CountingFeedback {
    fn beep(&mut self) {
        self.beeps.fetch_add(1, Ordering::SeqCst);
    }

    fn vibrate(&mut self, _pattern_ms: &[u64]) {
        self.vibrations.fetch_add(1, Ordering::SeqCst);
    }
}
