//! Authenticated Request Gateway
//!
//! Wraps the HTTP transport with credential attachment and transparent
//! recovery from expired authorization.
//!
//! ## The refresh state machine
//!
//! The coordinator has two states, `Idle` and `Refreshing`, guarded together
//! with the waiter queue by a single mutex. State checks and transitions
//! happen inside one lock scope before any suspension point, which gives the
//! same atomicity a single-threaded event loop would, on a multi-threaded
//! runtime.
//!
//! - First 401 while idle: that request claims the refresh, calls the
//!   refresh endpoint, and on success replays itself with the new
//!   credential.
//! - 401s arriving while a refresh is in flight enqueue a waiter (FIFO) and
//!   replay when the refresh settles.
//! - A refresh failure (error status, transport error, or timeout) rejects
//!   every waiter with `RefreshFailed` and invalidates the session.
//! - A replay that fails authorization again is terminal
//!   (`AuthorizationExpired`); a request is never retried twice.
//!
//! The refresh network call runs on a spawned task, so a caller aborting its
//! own request never tears down a refresh that other queued requests depend
//! on. Non-authorization failures bypass the machine entirely.

use crate::credentials::CredentialStore;
use crate::endpoints;
use crate::error::{Result, SessionError};
use crate::invalidator::SessionInvalidator;
use crate::types::{Credential, TokenResponse};
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use core_runtime::events::{CoreEvent, EventBus, GatewayEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

const STATUS_UNAUTHORIZED: u16 = 401;

/// A request that failed authorization while a refresh was already in
/// flight. Consumed exactly once when the refresh settles.
struct PendingAuthorization {
    id: u64,
    notify: oneshot::Sender<std::result::Result<Credential, String>>,
}

/// Refresh coordinator state: the single-flight flag plus the FIFO queue of
/// waiters. Mutated only inside short lock scopes, never across an await.
struct RefreshQueue {
    refreshing: bool,
    waiters: VecDeque<PendingAuthorization>,
}

struct Inner {
    base_url: Url,
    request_timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<CredentialStore>,
    invalidator: Arc<SessionInvalidator>,
    events: EventBus,
    refresh: Mutex<RefreshQueue>,
    next_waiter_id: AtomicU64,
}

/// What `recover_credential` decided inside the lock scope.
enum Role {
    Refresher,
    Waiter {
        id: u64,
        rx: oneshot::Receiver<std::result::Result<Credential, String>>,
    },
}

/// Authenticated request gateway.
///
/// Cloning yields a handle to the same coordinator; there is exactly one
/// refresh state machine per gateway instance.
#[derive(Clone)]
pub struct RequestGateway {
    inner: Arc<Inner>,
}

impl RequestGateway {
    pub fn new(
        base_url: Url,
        request_timeout: Duration,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<CredentialStore>,
        invalidator: Arc<SessionInvalidator>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url,
                request_timeout,
                transport,
                credentials,
                invalidator,
                events,
                refresh: Mutex::new(RefreshQueue {
                    refreshing: false,
                    waiters: VecDeque::new(),
                }),
                next_waiter_id: AtomicU64::new(0),
            }),
        }
    }

    /// Send an authenticated request.
    ///
    /// Equivalent to [`send_with_abort`](Self::send_with_abort) with a token
    /// that is never cancelled.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let abort = CancellationToken::new();
        self.send_with_abort(request, &abort).await
    }

    /// Send an authenticated request that the caller can abort.
    ///
    /// The current credential, if any, is attached to the `Authorization`
    /// header. A 401 response enters the refresh machine; any other status
    /// is returned as-is and transport failures propagate unchanged as
    /// [`SessionError::Network`].
    ///
    /// Cancelling `abort` resolves this call with [`SessionError::Aborted`]
    /// at the next suspension point. An abort only ever removes this
    /// request; an in-flight refresh and other queued requests are
    /// unaffected.
    #[instrument(skip(self, request, abort), fields(url = %request.url))]
    pub async fn send_with_abort(
        &self,
        request: HttpRequest,
        abort: &CancellationToken,
    ) -> Result<HttpResponse> {
        let request = self.prepare(request)?;

        let authenticated = match self.inner.credentials.get() {
            Some(credential) => with_credential(request.clone(), &credential),
            None => request.clone(),
        };

        let response = self.execute(authenticated, abort).await?;

        if response.status != STATUS_UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Authorization failure observed; entering refresh machine");

        // This request is now marked retried: the replay below is the only
        // second attempt it will ever get.
        let credential = self.recover_credential(abort).await?;

        if abort.is_cancelled() {
            return Err(SessionError::Aborted);
        }

        let _ = self
            .inner
            .events
            .emit(CoreEvent::Gateway(GatewayEvent::RequestReplayed {
                url: request.url.clone(),
            }));

        let replay = with_credential(request, &credential);
        let response = self.execute(replay, abort).await?;

        if response.status == STATUS_UNAUTHORIZED {
            // Second authorization failure on the same logical call chain:
            // terminal, never a second refresh.
            warn!("Replayed request failed authorization again");
            return Err(SessionError::AuthorizationExpired);
        }

        Ok(response)
    }

    /// Send a request without credential attachment or 401 interception.
    ///
    /// For the endpoints that exist outside a session: login, password
    /// reset. A 401 here means "wrong credentials", not "expired session",
    /// and must not trigger a refresh.
    pub async fn send_unauthenticated(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.prepare(request)?;
        let abort = CancellationToken::new();
        self.execute(request, &abort).await
    }

    /// Resolve the request URL against the configured base and stamp the
    /// default timeout. Callers may pass absolute URLs or set their own
    /// timeout; both are preserved.
    fn prepare(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
            let resolved = self
                .inner
                .base_url
                .join(&request.url)
                .map_err(|e| SessionError::Network(format!("Invalid request URL: {}", e)))?;
            request.url = resolved.to_string();
        }

        if request.timeout.is_none() {
            request.timeout = Some(self.inner.request_timeout);
        }

        Ok(request)
    }

    /// Forward to the transport, racing the caller's abort signal.
    async fn execute(
        &self,
        request: HttpRequest,
        abort: &CancellationToken,
    ) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            _ = abort.cancelled() => Err(SessionError::Aborted),
            result = self.inner.transport.execute(request) => {
                result.map_err(map_transport_error)
            }
        }
    }

    /// Obtain a fresh credential, either by performing the refresh or by
    /// queueing behind one already in flight.
    async fn recover_credential(&self, abort: &CancellationToken) -> Result<Credential> {
        // Single synchronous step: check the flag and either claim the
        // refresh or enqueue, atomically with respect to other failures.
        let role = {
            let mut state = self.inner.refresh.lock().expect("refresh lock poisoned");
            if state.refreshing {
                let id = self.inner.next_waiter_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(PendingAuthorization { id, notify: tx });
                debug!(waiter_id = id, "Refresh in flight; queued for replay");
                Role::Waiter { id, rx }
            } else {
                state.refreshing = true;
                Role::Refresher
            }
        };

        match role {
            Role::Refresher => {
                // The refresh runs on its own task: queued requests depend on
                // it, so the initiator aborting must not cancel it.
                let task = tokio::spawn({
                    let inner = Arc::clone(&self.inner);
                    async move { inner.run_refresh().await }
                });

                tokio::select! {
                    biased;
                    _ = abort.cancelled() => Err(SessionError::Aborted),
                    joined = task => match joined {
                        Ok(Ok(credential)) => Ok(credential),
                        Ok(Err(message)) => Err(SessionError::RefreshFailed(message)),
                        Err(e) => Err(SessionError::RefreshFailed(format!(
                            "Refresh task failed: {}",
                            e
                        ))),
                    },
                }
            }
            Role::Waiter { id, rx } => {
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => {
                        // Remove exactly this entry; the refresh and the
                        // other waiters are unaffected.
                        let mut state =
                            self.inner.refresh.lock().expect("refresh lock poisoned");
                        state.waiters.retain(|w| w.id != id);
                        debug!(waiter_id = id, "Queued request aborted by caller");
                        Err(SessionError::Aborted)
                    }
                    outcome = rx => match outcome {
                        Ok(Ok(credential)) => Ok(credential),
                        Ok(Err(message)) => Err(SessionError::RefreshFailed(message)),
                        // The refresher resolves every registered waiter; a
                        // closed channel means its task died.
                        Err(_) => Err(SessionError::RefreshFailed(
                            "Refresh abandoned".to_string(),
                        )),
                    },
                }
            }
        }
    }
}

impl Inner {
    /// Perform the refresh call and settle the queue. Always leaves the
    /// machine in `Idle`.
    async fn run_refresh(&self) -> std::result::Result<Credential, String> {
        let _ = self
            .events
            .emit(CoreEvent::Gateway(GatewayEvent::RefreshStarted));
        info!("Refreshing session credential");

        let outcome = self.call_refresh_endpoint().await;

        match outcome {
            Ok(credential) => {
                self.credentials.set(credential.clone()).await;
                self.invalidator.rearm();

                let woken = {
                    let mut state = self.refresh.lock().expect("refresh lock poisoned");
                    state.refreshing = false;
                    let waiters = std::mem::take(&mut state.waiters);
                    let woken = waiters.len();
                    // FIFO: waiters resolve in the order their failures were
                    // observed, so replays start in that order too.
                    for waiter in waiters {
                        let _ = waiter.notify.send(Ok(credential.clone()));
                    }
                    woken
                };

                info!(queued_replays = woken, "Credential refresh succeeded");
                let _ = self
                    .events
                    .emit(CoreEvent::Gateway(GatewayEvent::RefreshSucceeded {
                        queued_replays: woken,
                    }));

                Ok(credential)
            }
            Err(message) => {
                {
                    let mut state = self.refresh.lock().expect("refresh lock poisoned");
                    state.refreshing = false;
                    let waiters = std::mem::take(&mut state.waiters);
                    for waiter in waiters {
                        let _ = waiter.notify.send(Err(message.clone()));
                    }
                }

                warn!(error = %message, "Credential refresh failed; invalidating session");
                let _ = self
                    .events
                    .emit(CoreEvent::Gateway(GatewayEvent::RefreshFailed {
                        message: message.clone(),
                    }));

                self.invalidator.invalidate("session refresh failed").await;

                Err(message)
            }
        }
    }

    /// POST the refresh endpoint with the current credential attached,
    /// bound by the same timeout policy as ordinary requests.
    async fn call_refresh_endpoint(&self) -> std::result::Result<Credential, String> {
        let credential = self
            .credentials
            .get()
            .ok_or_else(|| "No credential to refresh".to_string())?;

        let url = self
            .base_url
            .join(endpoints::AUTH_REFRESH)
            .map_err(|e| format!("Invalid refresh URL: {}", e))?;

        let request = HttpRequest::new(HttpMethod::Post, url.to_string())
            .bearer_token(credential.secret())
            .timeout(self.request_timeout);

        let response = match tokio::time::timeout(self.request_timeout, self.transport.execute(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(BridgeError::Timeout)) => return Err("Refresh request timed out".to_string()),
            Ok(Err(e)) => return Err(format!("Refresh request failed: {}", e)),
            Err(_) => return Err("Refresh request timed out".to_string()),
        };

        if !response.is_success() {
            return Err(format!(
                "Refresh endpoint returned HTTP {}",
                response.status
            ));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| format!("Malformed refresh response: {}", e))?;

        Ok(Credential::new(token.token))
    }
}

/// Rewrite the request's authorization header with the given credential,
/// leaving method, body, and other headers untouched.
fn with_credential(mut request: HttpRequest, credential: &Credential) -> HttpRequest {
    request.headers.insert(
        "Authorization".to_string(),
        format!("Bearer {}", credential.secret()),
    );
    request
}

fn map_transport_error(error: BridgeError) -> SessionError {
    match error {
        BridgeError::Timeout => SessionError::Network("Request timed out".to_string()),
        other => SessionError::Network(other.to_string()),
    }
}
