//! # Desktop Bridge Implementations
//!
//! Desktop-ready implementations of the `bridge-traits` contracts:
//! - [`ReqwestTransport`] - HTTP via reqwest with connection pooling and retry
//! - [`KeyringSecureStore`] - credential persistence via the OS keyring
//! - [`InProcessBroadcast`] - session signals for single-instance deployments
//!
//! Multi-process hosts that want logout to propagate across processes should
//! supply their own `SessionBroadcast` backed by OS-level IPC; everything else
//! here works unchanged.

pub mod broadcast;
pub mod http;
#[cfg(feature = "secure-store")]
pub mod secure_store;

pub use broadcast::InProcessBroadcast;
pub use http::ReqwestTransport;
#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
