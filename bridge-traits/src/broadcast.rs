//! Cross-Instance Session Broadcast
//!
//! Abstracts the channel through which application instances sharing the same
//! session tell each other about a logout, so that every open instance clears
//! its local credential and returns to the login entry point together.
//!
//! The contract is deliberately small: a single payload-free signal,
//! publish/subscribe only. Implementations pick whatever fits the platform —
//! an in-process channel for single-instance deployments, OS-level IPC or a
//! pub/sub topic for multi-process ones.
//!
//! Implementations are not required to filter out an instance's own
//! publishes. The subscriber in `core-session` reacts with a non-broadcasting
//! invalidation, so signals cannot echo back and forth between instances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A session-level signal shared across application instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSignal {
    /// The session was ended (explicit logout or unrecoverable refresh
    /// failure). Carries no payload.
    Logout,
}

/// Receiving half of a session broadcast subscription.
#[async_trait]
pub trait SignalSubscription: Send {
    /// Wait for the next signal.
    ///
    /// Returns `None` when the channel is closed and no further signals will
    /// arrive. Implementations that can lag (bounded buffers) should skip
    /// missed signals rather than error: the only signal is `Logout`, and a
    /// late observer needs at most the fact that one occurred.
    async fn recv(&mut self) -> Option<SessionSignal>;
}

/// Cross-instance session signal channel.
#[async_trait]
pub trait SessionBroadcast: Send + Sync {
    /// Publish a signal to all instances sharing this session.
    async fn publish(&self, signal: SessionSignal) -> Result<()>;

    /// Subscribe to signals from other instances.
    fn subscribe(&self) -> Box<dyn SignalSubscription>;
}
