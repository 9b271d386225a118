//! # Session Module
//!
//! Authenticated request gateway and session lifecycle for the portal client.
//!
//! ## Overview
//!
//! This crate owns everything between application code and the portal's REST
//! backend that has to do with being signed in:
//!
//! - [`CredentialStore`] - single source of truth for the session credential,
//!   with secure persistence and reload rehydration
//! - [`RequestGateway`] - attaches the credential to outbound requests and
//!   recovers transparently from expired authorization: a single-flight
//!   refresh, FIFO queueing of concurrent failures, and at-most-one replay
//!   per request
//! - [`SessionInvalidator`] - tears the session down when refresh becomes
//!   unrecoverable: clears the credential, notifies subscribers, broadcasts
//!   logout to other instances, and sends the host to its login entry point
//! - [`SessionManager`] - the application-facing surface: login, logout,
//!   bootstrap, profile fetch, password reset, and the cross-instance logout
//!   listener
//!
//! ## Credential binding
//!
//! Credentials are opaque bearer tokens carried in the `Authorization`
//! header. The refresh endpoint is called with the current (possibly
//! expired) credential attached and answers with a fresh token.

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod invalidator;
pub mod manager;
pub mod types;

pub use credentials::CredentialStore;
pub use error::{Result, SessionError};
pub use gateway::RequestGateway;
pub use invalidator::SessionInvalidator;
pub use manager::SessionManager;
pub use types::{Credential, LoginRequest, TokenResponse, UserProfile, UserSummary};
