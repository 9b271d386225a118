//! Session Invalidator
//!
//! Reacts to unrecoverable authentication failure and explicit logout: clears
//! the credential, notifies subscribers, broadcasts the logout to other
//! application instances, and asks the host to navigate to its login entry
//! point.
//!
//! Invalidation is idempotent through an armed flag: the first call tears the
//! session down, subsequent calls are no-ops until a new sign-in rearms the
//! invalidator. This is also what keeps broadcast signals from echoing
//! between instances: reacting to a remote logout uses the non-broadcasting
//! variant, and an instance that already tore down ignores further signals.

use crate::credentials::CredentialStore;
use bridge_traits::{broadcast::SessionSignal, Navigator, SessionBroadcast};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionInvalidator {
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    broadcast: Arc<dyn SessionBroadcast>,
    events: EventBus,
    armed: AtomicBool,
}

impl SessionInvalidator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        broadcast: Arc<dyn SessionBroadcast>,
        events: EventBus,
    ) -> Self {
        Self {
            credentials,
            navigator,
            broadcast,
            events,
            armed: AtomicBool::new(true),
        }
    }

    /// Make the next invalidation effective again. Called when a new
    /// credential is established (sign-in, successful refresh).
    pub fn rearm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Tear the session down and tell other instances to do the same.
    ///
    /// Safe to call multiple times: only the first call after (re)arming has
    /// any observable effect.
    pub async fn invalidate(&self, reason: &str) {
        self.tear_down(reason, true).await;
    }

    /// Tear the session down without re-broadcasting.
    ///
    /// Used when reacting to a logout signal from another instance, so that
    /// signals do not ping-pong across the broadcast channel.
    pub async fn invalidate_local(&self, reason: &str) {
        self.tear_down(reason, false).await;
    }

    async fn tear_down(&self, reason: &str, broadcast: bool) {
        // Single atomic check-and-disarm makes repeated calls no-ops.
        if !self.armed.swap(false, Ordering::SeqCst) {
            debug!(reason, "Session already invalidated; ignoring");
            return;
        }

        info!(reason, "Invalidating session");

        self.credentials.clear().await;

        let _ = self.events.emit(CoreEvent::Session(SessionEvent::Invalidated {
            reason: reason.to_string(),
        }));

        if broadcast {
            if let Err(e) = self.broadcast.publish(SessionSignal::Logout).await {
                warn!(error = %e, "Failed to broadcast logout signal");
            }
        }

        self.navigator.navigate_to_login().await;
    }
}
