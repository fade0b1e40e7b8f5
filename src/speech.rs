//! Speech input capability
//!
//! Speech-to-text itself is out of scope; the loop only needs to know
//! whether a recognizer exists, to start and stop it, and to receive
//! transcripts the embedder pushes in via
//! [`ScanSession::on_transcript`](crate::scan::ScanSession::on_transcript).

use crate::{Error, Result};

/// Speech recognizer capability
pub trait SpeechCapture: Send {
    /// Whether a recognizer is present on this host
    fn is_available(&self) -> bool;

    /// Begin capturing speech
    ///
    /// # Errors
    ///
    /// Returns error if no recognizer is available or it fails to start.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing speech
    fn stop(&mut self);
}

/// A host with no speech recognizer
#[derive(Debug, Default)]
pub struct NoSpeech;

impl SpeechCapture for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<()> {
        Err(Error::Capability("speech recognition".to_string()))
    }

    fn stop(&mut self) {}
}

/// A recognizer whose transcript is supplied up front
///
/// Used by the CLI, where the target arrives as an argument instead of
/// a live microphone. [`take_transcript`](Self::take_transcript) yields
/// the phrase once, after capture has started.
#[derive(Debug)]
pub struct PresetSpeech {
    transcript: Option<String>,
    capturing: bool,
}

impl PresetSpeech {
    /// Create a recognizer that will produce the given phrase
    #[must_use]
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            capturing: false,
        }
    }

    /// The preset transcript, once, while capturing
    pub fn take_transcript(&mut self) -> Option<String> {
        if self.capturing {
            self.transcript.take()
        } else {
            None
        }
    }
}

impl SpeechCapture for PresetSpeech {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<()> {
        self.capturing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.capturing = false;
    }
}
