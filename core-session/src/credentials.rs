//! Credential Store
//!
//! Single source of truth for the session credential, with secure
//! persistence.
//!
//! The in-memory slot is authoritative and readable synchronously — the
//! request dispatcher must never block on a credential lookup. The secure
//! store is a best-effort persistence layer behind it: when it is
//! unavailable the session simply becomes memory-only and will not survive
//! an application reload, which is an inconvenience, never a failure.

use crate::types::Credential;
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Key under which the credential is persisted in the secure store.
const CREDENTIAL_KEY: &str = "portal_credential";

/// Serializable wrapper for the persisted credential.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
}

/// In-memory credential slot backed by secure persistence.
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self {
            secure_store,
            current: RwLock::new(None),
        }
    }

    /// Current credential, if any. Synchronous; no side effects.
    pub fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .expect("credential lock poisoned")
            .clone()
    }

    /// Store a new credential in memory and persist it.
    ///
    /// Persistence failure is non-fatal: the credential stays available in
    /// memory and the failure is logged.
    pub async fn set(&self, credential: Credential) {
        {
            let mut slot = self.current.write().expect("credential lock poisoned");
            *slot = Some(credential.clone());
        }

        let stored = StoredCredential {
            token: credential.secret().to_string(),
        };

        let json = match serde_json::to_vec(&stored) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize credential; running memory-only");
                return;
            }
        };

        if let Err(e) = self.secure_store.set_secret(CREDENTIAL_KEY, &json).await {
            warn!(error = %e, "Failed to persist credential; running memory-only");
        } else {
            debug!("Credential persisted");
        }
    }

    /// Remove the credential from memory and persistence. Idempotent.
    pub async fn clear(&self) {
        {
            let mut slot = self.current.write().expect("credential lock poisoned");
            *slot = None;
        }

        if let Err(e) = self.secure_store.delete_secret(CREDENTIAL_KEY).await {
            warn!(error = %e, "Failed to delete persisted credential");
        }
    }

    /// Load a persisted credential into memory at startup.
    ///
    /// Returns `true` when a credential was restored. Corrupt persisted data
    /// is discarded; an unavailable secure store leaves the session signed
    /// out. Neither is fatal.
    pub async fn hydrate(&self) -> bool {
        let data = match self.secure_store.get_secret(CREDENTIAL_KEY).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No persisted credential found");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Secure store unavailable during hydration");
                return false;
            }
        };

        let stored: StoredCredential = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Persisted credential corrupted; discarding");
                if let Err(delete_err) = self.secure_store.delete_secret(CREDENTIAL_KEY).await {
                    warn!(error = %delete_err, "Failed to delete corrupted credential");
                }
                return false;
            }
        };

        {
            let mut slot = self.current.write().expect("credential lock poisoned");
            *slot = Some(Credential::new(stored.token));
        }

        debug!("Credential rehydrated from secure storage");
        true
    }
}
