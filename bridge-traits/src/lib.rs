//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the portal client core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be provided differently per host (desktop
//! shell, CLI tooling, embedded webview host).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpTransport`](http::HttpTransport) - Async HTTP operations with retry and TLS
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//!
//! ### Application Integration
//! - [`Navigator`](navigation::Navigator) - Moves the host UI to its login entry point
//! - [`SessionBroadcast`](broadcast::SessionBroadcast) - Cross-instance session signals
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and provide actionable messages. The core fails fast with descriptive
//! errors when a required capability is missing; see `core-runtime::config`
//! for the builder that enforces this.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod broadcast;
pub mod error;
pub mod http;
pub mod navigation;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use broadcast::{SessionBroadcast, SessionSignal, SignalSubscription};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use navigation::Navigator;
pub use storage::SecureStore;
