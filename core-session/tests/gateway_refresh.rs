//! End-to-end tests for the authenticated request gateway: single-flight
//! refresh, FIFO replay, abort handling, and session teardown on refresh
//! failure, against a scripted in-memory backend.

use async_trait::async_trait;
use bridge_traits::broadcast::{SessionBroadcast, SessionSignal, SignalSubscription};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use bridge_traits::{Navigator, SecureStore};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, GatewayEvent};
use core_session::endpoints;
use core_session::{Credential, CredentialStore, RequestGateway, SessionError, SessionInvalidator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// How the fake backend's refresh endpoint behaves.
enum RefreshMode {
    /// Answer with a fresh token. `honored` controls whether the backend
    /// actually starts accepting it (false models a server that keeps
    /// rejecting even refreshed credentials).
    Grant {
        token: &'static str,
        honored: bool,
    },
    /// Answer with an error status.
    Reject(u16),
    /// Never answer within any reasonable timeout.
    Hang,
}

/// In-memory portal backend: accepts exactly one bearer token at a time and
/// serves a refresh endpoint according to the configured mode.
struct PortalBackend {
    refresh_mode: RefreshMode,
    refresh_calls: AtomicUsize,
    accepted_token: Mutex<String>,
    /// When set, the refresh endpoint blocks until the gate fires.
    refresh_gate: Mutex<Option<oneshot::Receiver<()>>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl PortalBackend {
    fn new(accepted_token: &str, refresh_mode: RefreshMode) -> Self {
        Self {
            refresh_mode,
            refresh_calls: AtomicUsize::new(0),
            accepted_token: Mutex::new(accepted_token.to_string()),
            refresh_gate: Mutex::new(None),
            log: Mutex::new(Vec::new()),
        }
    }

    fn gate_refresh(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.refresh_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn log(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }
}

#[async_trait]
impl HttpTransport for PortalBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.log.lock().unwrap().push(request.clone());

        if request.url.ends_with(endpoints::AUTH_REFRESH) {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);

            // Let the refresh linger long enough for concurrent failures to
            // queue behind it.
            tokio::time::sleep(Duration::from_millis(10)).await;

            let gate = self.refresh_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }

            return match &self.refresh_mode {
                RefreshMode::Grant { token, honored } => {
                    if *honored {
                        *self.accepted_token.lock().unwrap() = token.to_string();
                    }
                    Ok(Self::response(200, &format!(r#"{{"token":"{}"}}"#, token)))
                }
                RefreshMode::Reject(status) => Ok(Self::response(*status, "")),
                RefreshMode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Self::response(200, ""))
                }
            };
        }

        let expected = format!("Bearer {}", self.accepted_token.lock().unwrap());
        match request.headers.get("Authorization") {
            Some(auth) if *auth == expected => Ok(Self::response(200, r#"{"ok":true}"#)),
            _ => Ok(Self::response(401, "")),
        }
    }
}

// ---------------------------------------------------------------------------
// Counting bridges
// ---------------------------------------------------------------------------

struct CountingNavigator {
    calls: AtomicUsize,
}

#[async_trait]
impl Navigator for CountingNavigator {
    async fn navigate_to_login(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct CountingBroadcast {
    published: AtomicUsize,
}

struct NeverSubscription;

#[async_trait]
impl SignalSubscription for NeverSubscription {
    async fn recv(&mut self) -> Option<SessionSignal> {
        None
    }
}

#[async_trait]
impl SessionBroadcast for CountingBroadcast {
    async fn publish(&self, _signal: SessionSignal) -> BridgeResult<()> {
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn subscribe(&self) -> Box<dyn SignalSubscription> {
        Box::new(NeverSubscription)
    }
}

struct NullSecureStore;

#[async_trait]
impl SecureStore for NullSecureStore {
    async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
        Ok(())
    }
    async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    gateway: RequestGateway,
    credentials: Arc<CredentialStore>,
    backend: Arc<PortalBackend>,
    navigator: Arc<CountingNavigator>,
    broadcast: Arc<CountingBroadcast>,
    events: EventBus,
}

async fn harness(backend: PortalBackend, timeout: Duration) -> Harness {
    let backend = Arc::new(backend);
    let credentials = Arc::new(CredentialStore::new(Arc::new(NullSecureStore)));
    let navigator = Arc::new(CountingNavigator {
        calls: AtomicUsize::new(0),
    });
    let broadcast = Arc::new(CountingBroadcast {
        published: AtomicUsize::new(0),
    });
    let events = EventBus::new(64);

    let invalidator = Arc::new(SessionInvalidator::new(
        credentials.clone(),
        navigator.clone(),
        broadcast.clone(),
        events.clone(),
    ));

    let gateway = RequestGateway::new(
        Url::parse("https://portal.example.com").unwrap(),
        timeout,
        backend.clone(),
        credentials.clone(),
        invalidator,
        events.clone(),
    );

    credentials.set(Credential::new("t1")).await;

    Harness {
        gateway,
        credentials,
        backend,
        navigator,
        broadcast,
        events,
    }
}

fn tagged(tag: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, "/api/activities").header("X-Req", tag)
}

fn tags_of(requests: &[HttpRequest]) -> Vec<String> {
    requests
        .iter()
        .filter_map(|r| r.headers.get("X-Req").cloned())
        .collect()
}

// ---------------------------------------------------------------------------
// Scenario A: concurrent expiry, single refresh, FIFO replay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_failures_share_one_refresh_and_replay_fifo() {
    // Backend stops accepting t1 and will grant t2 on refresh.
    let fx = harness(
        PortalBackend::new("t0-already-rotated", RefreshMode::Grant {
            token: "t2",
            honored: true,
        }),
        Duration::from_secs(5),
    )
    .await;

    let mut event_stream = fx.events.subscribe();

    let (a, b, c) = tokio::join!(
        fx.gateway.send(tagged("a")),
        fx.gateway.send(tagged("b")),
        fx.gateway.send(tagged("c")),
    );

    // All three settle successfully with the refreshed credential.
    assert_eq!(a.unwrap().status, 200);
    assert_eq!(b.unwrap().status, 200);
    assert_eq!(c.unwrap().status, 200);

    // Exactly one refresh call was made for the three failures.
    assert_eq!(fx.backend.refresh_calls(), 1);
    assert_eq!(fx.credentials.get(), Some(Credential::new("t2")));

    // Three initial failures, one refresh, three replays — replays in the
    // original failure order, all carrying t2.
    let log = fx.backend.log();
    assert_eq!(log.len(), 7);
    assert_eq!(tags_of(&log[..3]), vec!["a", "b", "c"]);
    assert!(log[3].url.ends_with(endpoints::AUTH_REFRESH));
    assert_eq!(tags_of(&log[4..]), vec!["a", "b", "c"]);
    for replay in &log[4..] {
        assert_eq!(
            replay.headers.get("Authorization"),
            Some(&"Bearer t2".to_string())
        );
    }

    // The gateway announced the refresh and the two queued replays.
    let mut saw_started = false;
    let mut queued = None;
    while let Ok(event) = event_stream.try_recv() {
        match event {
            CoreEvent::Gateway(GatewayEvent::RefreshStarted) => saw_started = true,
            CoreEvent::Gateway(GatewayEvent::RefreshSucceeded { queued_replays }) => {
                queued = Some(queued_replays)
            }
            _ => {}
        }
    }
    assert!(saw_started);
    assert_eq!(queued, Some(2));
}

// ---------------------------------------------------------------------------
// Scenario B: refresh timeout rejects the queue and invalidates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_timeout_rejects_queue_and_invalidates_once() {
    let fx = harness(
        PortalBackend::new("t0-already-rotated", RefreshMode::Hang),
        Duration::from_millis(50),
    )
    .await;

    let (a, b, c) = tokio::join!(
        fx.gateway.send(tagged("a")),
        fx.gateway.send(tagged("b")),
        fx.gateway.send(tagged("c")),
    );

    for result in [a, b, c] {
        match result {
            Err(SessionError::RefreshFailed(message)) => {
                assert!(message.contains("timed out"), "unexpected: {}", message);
            }
            other => panic!("Expected RefreshFailed, got {:?}", other.map(|r| r.status)),
        }
    }

    assert_eq!(fx.backend.refresh_calls(), 1);

    // Session torn down exactly once: credential cleared, single broadcast,
    // single navigation.
    assert!(fx.credentials.get().is_none());
    assert_eq!(fx.broadcast.published.load(Ordering::SeqCst), 1);
    assert_eq!(fx.navigator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_error_status_rejects_queue_and_invalidates() {
    let fx = harness(
        PortalBackend::new("t0-already-rotated", RefreshMode::Reject(401)),
        Duration::from_secs(5),
    )
    .await;

    let (a, b) = tokio::join!(fx.gateway.send(tagged("a")), fx.gateway.send(tagged("b")));

    assert!(matches!(a, Err(SessionError::RefreshFailed(_))));
    assert!(matches!(b, Err(SessionError::RefreshFailed(_))));
    assert_eq!(fx.backend.refresh_calls(), 1);
    assert!(fx.credentials.get().is_none());
    assert_eq!(fx.navigator.calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Scenario C: replay fails authorization again — terminal, no second refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replayed_authorization_failure_is_terminal() {
    // Refresh "succeeds" but the backend never honors the new token.
    let fx = harness(
        PortalBackend::new("t0-already-rotated", RefreshMode::Grant {
            token: "t2",
            honored: false,
        }),
        Duration::from_secs(5),
    )
    .await;

    let result = fx.gateway.send(tagged("a")).await;

    assert!(matches!(result, Err(SessionError::AuthorizationExpired)));
    // One refresh, not two: the replayed request never loops back.
    assert_eq!(fx.backend.refresh_calls(), 1);

    // A terminal replay failure is not a refresh failure; the session was
    // not torn down by it.
    assert_eq!(fx.navigator.calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Abort semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aborting_a_queued_request_leaves_refresh_and_others_intact() {
    let backend = PortalBackend::new("t0-already-rotated", RefreshMode::Grant {
        token: "t2",
        honored: true,
    });
    // Hold the refresh open until both requests are positioned.
    let gate = backend.gate_refresh();

    let fx = harness(backend, Duration::from_secs(5)).await;

    let abort_b = CancellationToken::new();

    let task_a = tokio::spawn({
        let gateway = fx.gateway.clone();
        async move { gateway.send(tagged("a")).await }
    });
    let task_b = tokio::spawn({
        let gateway = fx.gateway.clone();
        let abort_b = abort_b.clone();
        async move { gateway.send_with_abort(tagged("b"), &abort_b).await }
    });

    // Let both requests fail authorization and enter the machine ("a" owns
    // the refresh, "b" is queued), then abort "b".
    tokio::time::sleep(Duration::from_millis(30)).await;
    abort_b.cancel();

    let result_b = task_b.await.unwrap();
    assert!(matches!(result_b, Err(SessionError::Aborted)));

    // Release the refresh; "a" completes normally.
    let _ = gate.send(());
    let result_a = task_a.await.unwrap();
    assert_eq!(result_a.unwrap().status, 200);

    assert_eq!(fx.backend.refresh_calls(), 1);

    // "b" was removed from the queue: the only replay (a request carrying
    // the refreshed credential) is "a"'s.
    let log = fx.backend.log();
    let replays: Vec<_> = log
        .iter()
        .filter(|r| {
            !r.url.ends_with(endpoints::AUTH_REFRESH)
                && r.headers.get("Authorization") == Some(&"Bearer t2".to_string())
        })
        .collect();
    assert_eq!(replays.len(), 1);
    assert_eq!(replays[0].headers.get("X-Req"), Some(&"a".to_string()));

    // Aborting is not an authorization failure: the session survived.
    assert_eq!(fx.credentials.get(), Some(Credential::new("t2")));
    assert_eq!(fx.navigator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn aborting_before_dispatch_never_reaches_the_network() {
    let fx = harness(
        PortalBackend::new("t1", RefreshMode::Reject(500)),
        Duration::from_secs(5),
    )
    .await;

    let abort = CancellationToken::new();
    abort.cancel();

    let result = fx.gateway.send_with_abort(tagged("a"), &abort).await;

    assert!(matches!(result, Err(SessionError::Aborted)));
    assert!(fx.backend.log().is_empty());
}

// ---------------------------------------------------------------------------
// Recovery after a successful refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn later_requests_use_the_refreshed_credential_without_refreshing() {
    let fx = harness(
        PortalBackend::new("t0-already-rotated", RefreshMode::Grant {
            token: "t2",
            honored: true,
        }),
        Duration::from_secs(5),
    )
    .await;

    fx.gateway.send(tagged("a")).await.unwrap();
    let second = fx.gateway.send(tagged("b")).await.unwrap();

    assert_eq!(second.status, 200);
    // Still only the one refresh from the first request.
    assert_eq!(fx.backend.refresh_calls(), 1);
}
