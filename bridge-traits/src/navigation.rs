//! Host Navigation Abstraction
//!
//! The core never renders UI; when a session becomes unrecoverable it asks the
//! host to move the user to the login entry point through this trait.

use async_trait::async_trait;

/// Host navigation hook.
///
/// Implemented by the host application shell:
/// - Desktop: swap the main window to the login view
/// - Webview host: replace the current route with the login route
/// - CLI tooling: print a re-authentication prompt and exit
///
/// Navigation is fire-and-forget from the core's perspective; host-internal
/// failures are the host's to handle, so the method is infallible.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Move the application to its login entry point.
    ///
    /// Called at most once per session invalidation. Implementations should
    /// tolerate being invoked while already on the login surface.
    async fn navigate_to_login(&self);
}
