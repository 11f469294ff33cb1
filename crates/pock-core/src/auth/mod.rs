//! Signed-in session lifecycle.
//!
//! The identity provider hands back an [`AuthSession`]; [`SessionManager`]
//! owns it from there, persisting it through a [`SessionPersistence`] store
//! and exposing the current user to the rest of the client.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Profile of the signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl UserIdentity {
    /// Build an identity, rejecting blank ids and names
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
        photo_url: Option<String>,
    ) -> Result<Self> {
        let id = id.into().trim().to_string();
        let name = name.into().trim().to_string();
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidInput(format!("Invalid user id: {id:?}")));
        }
        if name.is_empty() {
            return Err(Error::InvalidInput("User name cannot be empty".to_string()));
        }
        let photo_url = crate::util::normalize_text_option(photo_url);
        if let Some(url) = photo_url.as_deref() {
            if !crate::util::is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "Photo URL must start with http:// or https://: {url}"
                )));
            }
        }
        Ok(Self {
            id,
            name,
            email: crate::util::normalize_text_option(email),
            photo_url,
        })
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: UserIdentity,
    pub id_token: String,
    /// Unix seconds; `None` for sessions that never expire
    pub expires_at: Option<i64>,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("user", &self.user)
            .field("id_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> Result<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> Result<()>;
    fn clear_session(&self) -> Result<()>;
}

/// Process-local session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> Result<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Owner of the current session, passed to whatever needs the signed-in user
#[derive(Debug)]
pub struct SessionManager<S: SessionPersistence> {
    store: S,
    current: Mutex<Option<AuthSession>>,
}

impl<S: SessionPersistence> SessionManager<S> {
    /// Create a signed-out manager backed by `store`
    pub const fn new(store: S) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    /// Load a persisted session. Expired sessions are cleared.
    pub fn restore(&self) -> Result<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if stored.is_expired() {
            tracing::warn!(user_id = %stored.user.id, "Persisted session expired, signing out");
            self.store.clear_session()?;
            *self.lock() = None;
            return Ok(None);
        }

        tracing::debug!(user_id = %stored.user.id, "Restored session");
        *self.lock() = Some(stored.clone());
        Ok(Some(stored))
    }

    /// Adopt a session obtained from the identity provider
    pub fn sign_in(&self, session: AuthSession) -> Result<AuthSession> {
        if session.id_token.trim().is_empty() {
            return Err(Error::InvalidInput("ID token cannot be empty".to_string()));
        }
        if session.is_expired() {
            return Err(Error::InvalidInput("Session has already expired".to_string()));
        }

        self.store.save_session(&session)?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        *self.lock() = Some(session.clone());
        Ok(session)
    }

    /// Forget the current session, locally and in the store
    pub fn sign_out(&self) -> Result<()> {
        self.store.clear_session()?;
        if let Some(previous) = self.lock().take() {
            tracing::info!(user_id = %previous.user.id, "Signed out");
        }
        Ok(())
    }

    /// Current session, if any and not expired
    pub fn current(&self) -> Option<AuthSession> {
        self.lock()
            .as_ref()
            .filter(|session| !session.is_expired())
            .cloned()
    }

    /// Current user, or `NotSignedIn`
    pub fn require_user(&self) -> Result<UserIdentity> {
        self.current()
            .map(|session| session.user)
            .ok_or(Error::NotSignedIn)
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<AuthSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}
