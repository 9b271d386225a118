//! # Session Manager
//!
//! Application-facing surface for the portal session: sign-in, sign-out,
//! startup bootstrap, profile access, password reset, and the cross-instance
//! logout listener.
//!
//! ## Overview
//!
//! `SessionManager::new` assembles the whole session stack from a validated
//! [`CoreConfig`]: credential store, invalidator, and request gateway share
//! one event bus, and the manager exposes the gateway for arbitrary
//! authenticated calls.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_session::SessionManager;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://portal.example.com")?
//!     .navigator(Arc::new(MyNavigator))
//!     .build()?;
//!
//! let manager = SessionManager::new(config);
//! manager.listen_for_remote_logout();
//!
//! if manager.bootstrap().await?.is_none() {
//!     let user = manager.login("ana@example.edu", "hunter2").await?;
//!     println!("signed in as {}", user.name);
//! }
//! ```

use crate::credentials::CredentialStore;
use crate::endpoints;
use crate::error::{Result, SessionError};
use crate::gateway::RequestGateway;
use crate::invalidator::SessionInvalidator;
use crate::types::{
    ApiMessage, Credential, ForgotPasswordRequest, LoginRequest, PasswordResetRequest,
    TokenResponse, UserProfile, UserSummary,
};
use bridge_traits::broadcast::{SessionBroadcast, SessionSignal};
use bridge_traits::http::{HttpMethod, HttpRequest};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Session lifecycle orchestrator.
pub struct SessionManager {
    gateway: RequestGateway,
    credentials: Arc<CredentialStore>,
    invalidator: Arc<SessionInvalidator>,
    broadcast: Arc<dyn SessionBroadcast>,
    events: EventBus,
    signing_in: AtomicBool,
}

impl SessionManager {
    /// Assemble the session stack from a validated configuration.
    pub fn new(config: CoreConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let credentials = Arc::new(CredentialStore::new(config.secure_store.clone()));
        let invalidator = Arc::new(SessionInvalidator::new(
            credentials.clone(),
            config.navigator.clone(),
            config.broadcast.clone(),
            events.clone(),
        ));
        let gateway = RequestGateway::new(
            config.api_base_url.clone(),
            config.request_timeout,
            config.transport.clone(),
            credentials.clone(),
            invalidator.clone(),
            events.clone(),
        );

        Self {
            gateway,
            credentials,
            invalidator,
            broadcast: config.broadcast,
            events,
            signing_in: AtomicBool::new(false),
        }
    }

    /// The authenticated request gateway, for arbitrary backend calls.
    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// Handle to the event bus. Subscribe and watch for
    /// [`SessionEvent::Invalidated`] to react to forced logouts.
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Whether a credential is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.get().is_some()
    }

    /// Sign in with email and password.
    ///
    /// On success the returned token becomes the session credential, the
    /// profile is fetched, and `SignedIn` is emitted. A failure status from
    /// the login endpoint maps to [`SessionError::AuthenticationFailed`]
    /// carrying the backend message when one is present.
    ///
    /// Only one sign-in may be in progress at a time; concurrent calls get
    /// [`SessionError::LoginInProgress`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSummary> {
        if self.signing_in.swap(true, Ordering::SeqCst) {
            return Err(SessionError::LoginInProgress);
        }

        let result = self.login_inner(email, password).await;
        self.signing_in.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            let _ = self.events.emit(CoreEvent::Session(SessionEvent::AuthError {
                message: e.to_string(),
                recoverable: matches!(e, SessionError::Network(_)),
            }));
        }

        result
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<UserSummary> {
        info!("Signing in");

        let request = HttpRequest::new(HttpMethod::Post, endpoints::AUTH_LOGIN)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        let response = self.gateway.send_unauthenticated(request).await?;

        if !response.is_success() {
            let reason = response
                .json::<ApiMessage>()
                .ok()
                .and_then(|m| m.message)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            return Err(SessionError::AuthenticationFailed { reason });
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        self.credentials.set(Credential::new(token.token)).await;
        self.invalidator.rearm();

        // Load the profile immediately after login, as the UI expects.
        let profile = self.fetch_profile().await?;

        let _ = self.events.emit(CoreEvent::Session(SessionEvent::SignedIn {
            user_id: profile.user_id,
            name: profile.name.clone(),
        }));

        info!(user_id = profile.user_id, "Signed in");
        Ok(profile.to_summary())
    }

    /// Sign out.
    ///
    /// The backend call invalidating the server-side session is best-effort:
    /// local logout never blocks on it, matching the UI expectation that
    /// logout always succeeds immediately. Tears the session down fully
    /// (credential cleared, logout broadcast, navigation to login).
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::AUTH_LOGOUT);
        if let Err(e) = self.gateway.send(request).await {
            debug!(error = %e, "Logout endpoint call failed; proceeding with local logout");
        }

        let _ = self
            .events
            .emit(CoreEvent::Session(SessionEvent::SignedOut));

        self.invalidator.invalidate("user signed out").await;
    }

    /// Initialize the session at application startup.
    ///
    /// Rehydrates a persisted credential and verifies it by fetching the
    /// profile through the gateway, so an expired token refreshes
    /// transparently. Returns `Ok(None)` when there is no session to resume
    /// (nothing persisted, or the credential is beyond refresh — in which
    /// case the gateway has already invalidated).
    pub async fn bootstrap(&self) -> Result<Option<UserSummary>> {
        if !self.credentials.hydrate().await {
            return Ok(None);
        }
        self.invalidator.rearm();

        match self.fetch_profile().await {
            Ok(profile) => {
                let _ = self.events.emit(CoreEvent::Session(SessionEvent::SignedIn {
                    user_id: profile.user_id,
                    name: profile.name.clone(),
                }));
                Ok(Some(profile.to_summary()))
            }
            Err(SessionError::RefreshFailed(_)) | Err(SessionError::AuthorizationExpired) => {
                debug!("Persisted session is no longer valid");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Fetch the full profile of the signed-in user.
    pub async fn current_user(&self) -> Result<UserProfile> {
        if self.credentials.get().is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        self.fetch_profile().await
    }

    async fn fetch_profile(&self) -> Result<UserProfile> {
        let response = self
            .gateway
            .send(HttpRequest::new(HttpMethod::Get, endpoints::AUTH_ME))
            .await?;

        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status,
            });
        }

        response
            .json()
            .map_err(|e| SessionError::Decode(e.to_string()))
    }

    /// Ask the backend to email a password reset verification code.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::AUTH_FORGOT_PASSWORD)
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            })
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        let response = self.gateway.send_unauthenticated(request).await?;
        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status,
            });
        }
        Ok(())
    }

    /// Complete a password reset with the emailed verification code.
    pub async fn reset_password(
        &self,
        email: &str,
        verification_code: &str,
        new_password: &str,
    ) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, endpoints::AUTH_SUBMIT_PASSWORD_RESET)
            .json(&PasswordResetRequest {
                email: email.to_string(),
                verification_code: verification_code.to_string(),
                new_password: new_password.to_string(),
            })
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        let response = self.gateway.send_unauthenticated(request).await?;
        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status,
            });
        }
        Ok(())
    }

    /// Spawn the listener that keeps this instance in sync with logouts
    /// performed by other instances sharing the session.
    ///
    /// Reacting uses the non-broadcasting invalidation, so signals never
    /// echo back onto the channel.
    pub fn listen_for_remote_logout(&self) -> tokio::task::JoinHandle<()> {
        let mut subscription = self.broadcast.subscribe();
        let invalidator = self.invalidator.clone();

        tokio::spawn(async move {
            while let Some(signal) = subscription.recv().await {
                match signal {
                    SessionSignal::Logout => {
                        info!("Logout signaled by another instance");
                        invalidator
                            .invalidate_local("logout signaled by another instance")
                            .await;
                    }
                }
            }
        })
    }
}
