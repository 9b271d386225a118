use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport failure (connection drop, TLS, timeout). Propagated to the
    /// caller unchanged; never retried at this layer.
    #[error("Network failure: {0}")]
    Network(String),

    /// A replayed request failed authorization again. Terminal; a request is
    /// retried at most once.
    #[error("Authorization expired")]
    AuthorizationExpired,

    /// The refresh endpoint failed or timed out. Terminal for the session;
    /// every request queued behind the refresh receives this.
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    /// The caller cancelled its own request. Never a session-level error.
    #[error("Request aborted by caller")]
    Aborted,

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Sign-in already in progress")]
    LoginInProgress,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Unexpected response status: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Malformed response payload: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
