//! Scan loop driver
//!
//! Owns the single repeating capture timer. The timer exists only while
//! the session is scanning, fires first after one full period, and is
//! rebuilt in place when the interval changes — there are never two
//! timers alive at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CycleOutcome, ScanConfig, ScanSession};
use crate::Result;

/// Drives a [`ScanSession`] on its configured cadence
pub struct ScanController {
    session: Arc<Mutex<ScanSession>>,
    loop_handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    interval_tx: Option<watch::Sender<Duration>>,
}

impl ScanController {
    /// Wrap a session; no timer runs until scanning starts
    #[must_use]
    pub fn new(session: ScanSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            loop_handle: None,
            cancel: None,
            interval_tx: None,
        }
    }

    /// Shared handle to the session, for inspection
    #[must_use]
    pub fn session(&self) -> Arc<Mutex<ScanSession>> {
        Arc::clone(&self.session)
    }

    /// Begin voice capture for a new target, tearing down any running scan
    ///
    /// # Errors
    ///
    /// Returns error when no speech recognizer exists.
    pub async fn start_recording(&mut self) -> Result<()> {
        self.stop_loop().await;
        self.session.lock().await.start_recording()
    }

    /// Deliver a speech transcript to the session
    pub async fn on_transcript(&self, raw: &str) {
        self.session.lock().await.on_transcript(raw);
    }

    /// End voice capture and start the capture timer
    ///
    /// # Errors
    ///
    /// Returns error if the camera cannot be acquired; no timer is
    /// started in that case.
    pub async fn stop_recording(&mut self) -> Result<()> {
        self.session.lock().await.stop_recording()?;
        self.spawn_loop().await;
        Ok(())
    }

    /// Resume scanning with the previously recorded target
    ///
    /// # Errors
    ///
    /// Returns error if the session is not idle or the camera cannot be
    /// acquired.
    pub async fn start_scanning(&mut self) -> Result<()> {
        self.session.lock().await.start_scanning()?;
        self.spawn_loop().await;
        Ok(())
    }

    /// Stop scanning: cancel the timer, release the camera
    pub async fn stop_detecting(&mut self) {
        self.stop_loop().await;
        self.session.lock().await.stop_detecting();
    }

    /// Apply a new configuration
    ///
    /// An interval change reaches a running loop through the watch
    /// channel and takes effect on the next scheduled capture.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub async fn set_config(&mut self, config: ScanConfig) -> Result<()> {
        let interval = config.scan_interval;
        self.session.lock().await.set_config(config)?;

        if let Some(tx) = &self.interval_tx {
            let _ = tx.send(interval);
        }
        Ok(())
    }

    /// Whether the capture timer is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.loop_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn spawn_loop(&mut self) {
        if self.is_running() {
            return;
        }

        let interval = self.session.lock().await.config().scan_interval;
        let cancel = CancellationToken::new();
        let (interval_tx, interval_rx) = watch::channel(interval);

        let handle = tokio::spawn(scan_loop(
            Arc::clone(&self.session),
            cancel.clone(),
            interval_rx,
        ));

        self.loop_handle = Some(handle);
        self.cancel = Some(cancel);
        self.interval_tx = Some(interval_tx);
    }

    async fn stop_loop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
        self.interval_tx = None;
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

/// Build the repeating capture ticker
///
/// First fire happens one full period from now; a tick that lands while
/// the previous cycle is still running is delayed, not burst.
fn make_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn scan_loop(
    session: Arc<Mutex<ScanSession>>,
    cancel: CancellationToken,
    mut interval_rx: watch::Receiver<Duration>,
) {
    let mut period = *interval_rx.borrow();
    let mut ticker = make_ticker(period);

    tracing::debug!(period_ms = period.as_millis(), "scan loop started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("scan loop shutting down");
                break;
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *interval_rx.borrow_and_update();
                if next != period {
                    period = next;
                    ticker = make_ticker(period);
                    tracing::debug!(period_ms = period.as_millis(), "capture interval rescheduled");
                }
            }
            _ = ticker.tick() => {
                let outcome = session.lock().await.tick().await;
                match outcome {
                    CycleOutcome::Done { found } => {
                        tracing::trace!(found, "capture cycle complete");
                    }
                    CycleOutcome::Failed(reason) => {
                        tracing::warn!(reason, "capture cycle failed, continuing");
                    }
                    CycleOutcome::Busy | CycleOutcome::Inactive => {}
                }
            }
        }
    }
}
