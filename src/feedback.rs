//! Found-target feedback
//!
//! A positive detection cycle produces an audio tone and a vibration
//! pattern. Feedback is a capability the scan loop depends on, so
//! headless environments and tests can substitute their own.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Tone sample rate
const TONE_SAMPLE_RATE: u32 = 24000;

/// Tone frequency in Hz
const TONE_FREQUENCY: f32 = 880.0;

/// Tone duration
const TONE_MS: u64 = 150;

/// Vibration pattern fired on a positive cycle (on/off millisecond pairs)
pub const FOUND_VIBRATION_MS: &[u64] = &[200, 100, 200];

/// Feedback capability (tone + haptics)
pub trait Feedback: Send {
    /// Emit the found tone
    fn beep(&mut self);

    /// Fire a vibration pattern, where hardware exists
    fn vibrate(&mut self, pattern_ms: &[u64]);
}

/// Feedback that only logs, for headless runs
#[derive(Debug, Default)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn beep(&mut self) {
        tracing::info!("beep");
    }

    fn vibrate(&mut self, pattern_ms: &[u64]) {
        tracing::info!(?pattern_ms, "vibrate");
    }
}

/// Feedback through the default audio output device
///
/// Vibration is logged only; desktop hosts have no haptic hardware.
pub struct AudioFeedback {
    config: StreamConfig,
}

impl AudioFeedback {
    /// Create feedback bound to the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device or suitable config exists.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(TONE_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(TONE_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                host.default_output_device()?
                    .supported_output_configs()
                    .ok()?
                    .find(|c| {
                        c.channels() == 2
                            && c.min_sample_rate() <= SampleRate(TONE_SAMPLE_RATE)
                            && c.max_sample_rate() >= SampleRate(TONE_SAMPLE_RATE)
                    })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(TONE_SAMPLE_RATE))
            .config();

        tracing::debug!(
            sample_rate = TONE_SAMPLE_RATE,
            channels = config.channels,
            "audio feedback initialized"
        );

        Ok(Self { config })
    }

    /// Play the tone on a detached thread so the loop never blocks
    fn play_tone(&self) {
        let config = self.config.clone();

        std::thread::spawn(move || {
            if let Err(e) = play_tone_blocking(&config) {
                tracing::warn!(error = %e, "tone playback failed");
            }
        });
    }
}

impl Feedback for AudioFeedback {
    fn beep(&mut self) {
        self.play_tone();
    }

    fn vibrate(&mut self, pattern_ms: &[u64]) {
        tracing::debug!(?pattern_ms, "vibration requested (no haptic hardware)");
    }
}

/// Synthesize the tone into an output stream and wait for it to finish
fn play_tone_blocking(config: &StreamConfig) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let channels = config.channels as usize;
    #[allow(clippy::cast_possible_truncation)]
    let total_samples = (TONE_SAMPLE_RATE as u64 * TONE_MS / 1000) as usize;

    let mut position = 0usize;
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    #[allow(clippy::cast_precision_loss)]
                    let sample = if position < total_samples {
                        let t = position as f32 / TONE_SAMPLE_RATE as f32;
                        (2.0 * std::f32::consts::PI * TONE_FREQUENCY * t).sin() * 0.3
                    } else {
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    position = position.saturating_add(1);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio feedback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    std::thread::sleep(std::time::Duration::from_millis(TONE_MS + 100));
    drop(stream);

    Ok(())
}
