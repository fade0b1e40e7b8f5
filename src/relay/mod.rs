//! Session relay
//!
//! Multiplexes socket connections under session identifiers and fans
//! "found" notifications out to every peer in a session, rate-limited
//! per session. All state is owned by the relay instance — no ambient
//! globals — so tests can run independent relays in one process.

pub mod api;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::Result;
use crate::error::Error;

/// The only accepted socket role
pub const PEER_ROLE: &str = "peer";

/// Outbound channel capacity per peer
const PEER_CHANNEL_CAPACITY: usize = 32;

/// Outbound handle for one peer connection, carrying serialized events
pub type PeerSender = mpsc::Sender<String>;

/// Result of a notify call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// Number of peers the event was handed to
    pub delivered: usize,
    /// The call landed inside the cooldown window and was a no-op
    pub throttled: bool,
}

/// Wire shape of a delivered notification
#[derive(Serialize)]
struct RelayEvent<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: &'a Value,
    /// Epoch milliseconds
    timestamp: i64,
}

/// Per-relay mutable state, one mutex domain
#[derive(Default)]
struct RelayInner {
    /// session id → connected peers
    sessions: HashMap<String, HashMap<Uuid, PeerSender>>,
    /// session id → last delivered-notification time; never removed,
    /// never rolled back
    last_push: HashMap<String, Instant>,
}

/// Session-keyed notification hub
pub struct SessionRelay {
    inner: Mutex<RelayInner>,
    cooldown: Duration,
}

impl SessionRelay {
    /// Create a relay with the given per-session notify cooldown
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(RelayInner::default()),
            cooldown,
        }
    }

    /// The configured cooldown window
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Register a peer connection under a session
    ///
    /// The session's peer set is created on first registration.
    ///
    /// # Errors
    ///
    /// Returns a protocol violation if the session id is empty or the
    /// role is not [`PEER_ROLE`]; the connection must then be closed.
    pub async fn register(&self, session_id: &str, role: &str, sender: PeerSender) -> Result<Uuid> {
        if session_id.is_empty() {
            return Err(Error::Protocol("missing session".to_string()));
        }
        if role != PEER_ROLE {
            return Err(Error::Protocol(format!("unexpected role {role:?}")));
        }

        let peer_id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(peer_id, sender);

        tracing::info!(session = session_id, peer = %peer_id, "peer registered");
        Ok(peer_id)
    }

    /// Remove a peer connection
    ///
    /// Deletes the session entry when its peer set becomes empty; the
    /// session's push record is retained so cooldowns survive
    /// reconnects.
    pub async fn unregister(&self, session_id: &str, peer_id: Uuid) {
        let mut inner = self.inner.lock().await;

        let emptied = match inner.sessions.get_mut(session_id) {
            Some(peers) => {
                peers.remove(&peer_id);
                peers.is_empty()
            }
            None => return,
        };

        if emptied {
            inner.sessions.remove(session_id);
        }

        tracing::info!(session = session_id, peer = %peer_id, "peer unregistered");
    }

    /// Deliver a notification to every peer in a session
    ///
    /// Debounced per session: a call landing within the cooldown window
    /// of the previous delivered notification is a no-op reporting
    /// `throttled`. Otherwise the push record is stamped and the event
    /// is handed to every currently-open peer channel; only successful
    /// handoffs are counted. An unknown session delivers to nobody.
    ///
    /// # Errors
    ///
    /// Returns error if the event fails to serialize.
    pub async fn notify(&self, session_id: &str, kind: &str, payload: &Value) -> Result<NotifyOutcome> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        if let Some(last) = inner.last_push.get(session_id) {
            if now.duration_since(*last) < self.cooldown {
                tracing::debug!(session = session_id, "notify throttled");
                return Ok(NotifyOutcome {
                    delivered: 0,
                    throttled: true,
                });
            }
        }
        inner.last_push.insert(session_id.to_string(), now);

        let event = serde_json::to_string(&RelayEvent {
            kind,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })?;

        let delivered = inner.sessions.get(session_id).map_or(0, |peers| {
            peers
                .values()
                .filter(|sender| sender.try_send(event.clone()).is_ok())
                .count()
        });

        tracing::info!(session = session_id, kind, delivered, "notification dispatched");
        Ok(NotifyOutcome {
            delivered,
            throttled: false,
        })
    }

    /// Number of peers currently connected under a session
    pub async fn peer_count(&self, session_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .sessions
            .get(session_id)
            .map_or(0, HashMap::len)
    }

    /// Whether a session currently has any peers
    pub async fn has_session(&self, session_id: &str) -> bool {
        self.inner.lock().await.sessions.contains_key(session_id)
    }

    /// Whether a session has a push record (delivered at least once)
    pub async fn has_push_record(&self, session_id: &str) -> bool {
        self.inner.lock().await.last_push.contains_key(session_id)
    }
}

/// Create an outbound channel pair for one peer connection
#[must_use]
pub fn peer_channel() -> (PeerSender, mpsc::Receiver<String>) {
    mpsc::channel(PEER_CHANNEL_CAPACITY)
}
