//! In-Process Session Broadcast
//!
//! `SessionBroadcast` implementation for single-instance desktop deployments.
//! Signals fan out to every subscriber within the current process over a
//! `tokio::sync::broadcast` channel; there is no cross-process delivery.
//! Hosts that run multiple processes against the same session should replace
//! this with an IPC-backed implementation.

use async_trait::async_trait;
use bridge_traits::{
    broadcast::{SessionBroadcast, SessionSignal, SignalSubscription},
    error::Result,
};
use tokio::sync::broadcast;
use tracing::debug;

/// Default buffer size for the signal channel.
///
/// Session signals are rare (one per logout), so a small buffer suffices.
const DEFAULT_SIGNAL_BUFFER_SIZE: usize = 16;

/// Process-local session signal channel.
#[derive(Clone)]
pub struct InProcessBroadcast {
    sender: broadcast::Sender<SessionSignal>,
}

impl InProcessBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_SIGNAL_BUFFER_SIZE);
        Self { sender }
    }

    /// Number of live subscriptions, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InProcessBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

struct InProcessSubscription {
    receiver: broadcast::Receiver<SessionSignal>,
}

#[async_trait]
impl SignalSubscription for InProcessSubscription {
    async fn recv(&mut self) -> Option<SessionSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) => return Some(signal),
                // Lagging only drops duplicate logout signals; keep reading.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl SessionBroadcast for InProcessBroadcast {
    async fn publish(&self, signal: SessionSignal) -> Result<()> {
        // A send error only means there are no subscribers, which is fine:
        // a single-window app has nobody else to notify.
        let delivered = self.sender.send(signal).unwrap_or(0);
        debug!(?signal, delivered, "Published session signal");
        Ok(())
    }

    fn subscribe(&self) -> Box<dyn SignalSubscription> {
        Box::new(InProcessSubscription {
            receiver: self.sender.subscribe(),
        })
    }
}
