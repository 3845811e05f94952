//! Session store - the single source of truth for "who is logged in."
//!
//! Holds the authentication token and minimal identity fields, persists them
//! synchronously to durable storage, and rehydrates once at startup. The
//! external provider token for repository import lives in its own storage
//! namespace but is cascade-cleared on logout, since import has no meaning
//! without an active session.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::storage::{Storage, StorageError};

/// Storage namespace for the serialized session blob.
pub const SESSION_STORAGE_KEY: &str = "auth-storage";

/// Storage namespace for the external provider access token.
pub const EXTERNAL_TOKEN_KEY: &str = "github_access_token";

/// The authenticated identity held by the client.
///
/// The authentication invariant - authenticated iff the token is present -
/// is enforced by construction: there is no stored flag that could drift
/// out of sync with the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned user id, set on login.
    pub id: Option<String>,
    /// Bearer token for the remote API, set on login.
    pub token: Option<String>,
}

impl Session {
    /// An unauthenticated session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session for a server-confirmed login payload.
    pub fn authenticated(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            token: Some(token.into()),
        }
    }

    /// True iff a token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Wire shape of the persisted session blob.
///
/// The flag is written for the benefit of external readers of the blob but
/// is ignored on load; authentication is always re-derived from the token.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    id: Option<String>,
    token: Option<String>,
    is_authenticated: bool,
}

/// Process-wide session store.
///
/// Mutation is an atomic replace-of-state under a lock; readers never see a
/// partially updated session. All mutations persist synchronously so a
/// reload restores session state without re-authentication.
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    session: RwLock<Session>,
}

impl SessionStore {
    /// Opens the store, rehydrating any persisted session.
    ///
    /// A corrupt or unreadable blob is discarded and treated as logged out.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let session = match storage.get(SESSION_STORAGE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<PersistedSession>(&blob) {
                Ok(persisted) => Session {
                    id: persisted.id,
                    token: persisted.token,
                },
                Err(err) => {
                    tracing::warn!("discarding corrupt session blob: {err}");
                    Session::anonymous()
                }
            },
            Ok(None) => Session::anonymous(),
            Err(err) => {
                tracing::warn!("could not read persisted session: {err}");
                Session::anonymous()
            }
        };

        Self {
            storage,
            session: RwLock::new(session),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the session from a server-confirmed login payload and persists
    /// it. Accepts whatever the server returned; no local validation.
    pub fn login(&self, id: &str, token: &str) -> Result<(), StorageError> {
        let session = Session::authenticated(id, token);
        *self.write() = session.clone();
        self.persist(&session)
    }

    /// Clears the session and the external provider token, removing both
    /// persisted entries. Redirecting afterwards is the caller's concern.
    pub fn logout(&self) -> Result<(), StorageError> {
        *self.write() = Session::anonymous();
        self.storage.remove(SESSION_STORAGE_KEY)?;
        self.storage.remove(EXTERNAL_TOKEN_KEY)?;
        Ok(())
    }

    /// Logout variant for the HTTP pipeline's auth-expiry handling.
    ///
    /// Returns `true` only for the call that actually transitioned the
    /// store from authenticated to anonymous, so concurrent 401 responses
    /// collapse to a single notification and redirect. Storage cleanup is
    /// best-effort here; the in-memory state is authoritative.
    pub fn expire(&self) -> bool {
        {
            let mut guard = self.write();
            if !guard.is_authenticated() {
                return false;
            }
            *guard = Session::anonymous();
        }

        if let Err(err) = self.storage.remove(SESSION_STORAGE_KEY) {
            tracing::warn!("could not remove persisted session: {err}");
        }
        if let Err(err) = self.storage.remove(EXTERNAL_TOKEN_KEY) {
            tracing::warn!("could not remove external provider token: {err}");
        }
        true
    }

    /// Synchronous token read for the HTTP pipeline.
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.read().clone()
    }

    /// True iff a token is held.
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Persists the external provider token under its own namespace.
    pub fn connect_external(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(EXTERNAL_TOKEN_KEY, token)
    }

    /// Returns the external provider token, if one is stored.
    pub fn external_token(&self) -> Option<String> {
        match self.storage.get(EXTERNAL_TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!("could not read external provider token: {err}");
                None
            }
        }
    }

    /// True iff an external provider token is stored.
    pub fn is_external_connected(&self) -> bool {
        self.external_token().is_some()
    }

    /// Revokes the external provider token without touching the session.
    pub fn disconnect_external(&self) -> Result<(), StorageError> {
        self.storage.remove(EXTERNAL_TOKEN_KEY)
    }

    fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let persisted = PersistedSession {
            id: session.id.clone(),
            token: session.token.clone(),
            is_authenticated: session.is_authenticated(),
        };
        // Serialization of this shape cannot fail; fall back to an empty
        // object rather than poisoning the login path.
        let blob = serde_json::to_string(&persisted).unwrap_or_else(|_| "{}".to_string());
        self.storage.set(SESSION_STORAGE_KEY, &blob)
    }
}
