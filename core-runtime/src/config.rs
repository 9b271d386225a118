//! # Core Configuration Module
//!
//! Provides configuration management for the portal client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core
//! library. It enforces fail-fast validation to ensure all required bridges
//! are provided before initialization.
//!
//! ## Required Dependencies
//!
//! - `SecureStore` - credential persistence
//! - `Navigator` - login redirection on session invalidation
//! - `SessionBroadcast` - cross-instance logout propagation
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpTransport` - HTTP operations (desktop default: reqwest)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpTransport`, `SecureStore`, and `SessionBroadcast` are injected
//! automatically if not provided. `Navigator` is always host-supplied: only
//! the host knows what its login entry point looks like.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://portal.example.com")?
//!     .navigator(Arc::new(MyNavigator))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpTransport, Navigator, SecureStore, SessionBroadcast};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default timeout applied to every outbound request, refresh included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Core configuration for the portal client core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL every endpoint path is resolved against
    pub api_base_url: Url,

    /// Timeout for outbound requests. The refresh call is bound by the same
    /// policy as ordinary requests.
    pub request_timeout: Duration,

    /// Event bus buffer capacity
    pub event_capacity: usize,

    /// HTTP transport for all backend communication
    pub transport: Arc<dyn HttpTransport>,

    /// Secure credential persistence
    pub secure_store: Arc<dyn SecureStore>,

    /// Host navigation hook for login redirection
    pub navigator: Arc<dyn Navigator>,

    /// Cross-instance session signal channel
    pub broadcast: Arc<dyn SessionBroadcast>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("event_capacity", &self.event_capacity)
            .field("transport", &"HttpTransport { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("navigator", &"Navigator { ... }")
            .field("broadcast", &"SessionBroadcast { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`] with fail-fast capability validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<Url>,
    request_timeout: Option<Duration>,
    event_capacity: Option<usize>,
    transport: Option<Arc<dyn HttpTransport>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    broadcast: Option<Arc<dyn SessionBroadcast>>,
}

impl CoreConfigBuilder {
    /// Set the backend base URL (e.g. `https://portal.example.com`).
    pub fn api_base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let parsed = Url::parse(url.as_ref())
            .map_err(|e| Error::Config(format!("Invalid API base URL: {}", e)))?;
        self.api_base_url = Some(parsed);
        Ok(self)
    }

    /// Override the default request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Override the default event bus capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Inject a custom HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject a custom secure store.
    pub fn secure_store(mut self, secure_store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(secure_store);
        self
    }

    /// Inject the host navigator (always required).
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Inject a custom session broadcast channel.
    pub fn broadcast(mut self, broadcast: Arc<dyn SessionBroadcast>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Validates the configuration and builds the [`CoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the base URL was never set and
    /// `Error::CapabilityMissing` for any absent bridge without a platform
    /// default, with an actionable message naming the remedy.
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self
            .api_base_url
            .ok_or_else(|| Error::Config("API base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Self::default_transport()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => Self::default_secure_store()?,
        };

        let broadcast = match self.broadcast {
            Some(broadcast) => broadcast,
            None => Self::default_broadcast()?,
        };

        let navigator = self.navigator.ok_or_else(|| Error::CapabilityMissing {
            capability: "Navigator".to_string(),
            message: "No navigator provided. The host must inject a Navigator so the \
                      core can redirect to the login entry point on session invalidation."
                .to_string(),
        })?;

        Ok(CoreConfig {
            api_base_url,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            event_capacity: self
                .event_capacity
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            transport,
            secure_store,
            navigator,
            broadcast,
        })
    }

    #[cfg(feature = "desktop-shims")]
    fn default_transport() -> Result<Arc<dyn HttpTransport>> {
        Ok(Arc::new(bridge_desktop::ReqwestTransport::new()))
    }

    #[cfg(not(feature = "desktop-shims"))]
    fn default_transport() -> Result<Arc<dyn HttpTransport>> {
        Err(Error::CapabilityMissing {
            capability: "HttpTransport".to_string(),
            message: "No HTTP transport provided. Desktop: enable the desktop-shims \
                      feature. Other hosts: inject a platform-native adapter."
                .to_string(),
        })
    }

    #[cfg(feature = "desktop-shims")]
    fn default_secure_store() -> Result<Arc<dyn SecureStore>> {
        Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
    }

    #[cfg(not(feature = "desktop-shims"))]
    fn default_secure_store() -> Result<Arc<dyn SecureStore>> {
        Err(Error::CapabilityMissing {
            capability: "SecureStore".to_string(),
            message: "No secure store provided. Desktop: enable the desktop-shims \
                      feature. Other hosts: inject a platform-native adapter."
                .to_string(),
        })
    }

    #[cfg(feature = "desktop-shims")]
    fn default_broadcast() -> Result<Arc<dyn SessionBroadcast>> {
        Ok(Arc::new(bridge_desktop::InProcessBroadcast::new()))
    }

    #[cfg(not(feature = "desktop-shims"))]
    fn default_broadcast() -> Result<Arc<dyn SessionBroadcast>> {
        Err(Error::CapabilityMissing {
            capability: "SessionBroadcast".to_string(),
            message: "No session broadcast provided. Desktop: enable the desktop-shims \
                      feature. Other hosts: inject an IPC-backed implementation."
                .to_string(),
        })
    }
}
