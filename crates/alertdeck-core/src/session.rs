// ── Session token holder ──
//
// The session is an explicit value handed to the rest of the subsystem,
// never ambient global state. Transitions (sign-in, logout, detected
// expiry) are discrete events observable through a `watch` channel so the
// channel manager and console react to them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::info;

/// An authenticated operator session.
///
/// Carries the bearer token, the operator's assigned region (extracted
/// from the token by the credential collaborator), and the expiry instant.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    region: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SecretString, region: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            region: region.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether two sessions carry the same credential for the same region.
    /// Used by the channel manager to make repeated `connect` a no-op.
    pub(crate) fn same_credential(&self, other: &Session) -> bool {
        self.region == other.region
            && self.token.expose_secret() == other.token.expose_secret()
    }
}

/// Owner of the current session.
///
/// Invariant: a subscriber never observes an expired session -- `current()`
/// detects expiry, clears the slot, and reports signed-out.
pub struct SessionHolder {
    tx: watch::Sender<Option<Arc<Session>>>,
}

impl SessionHolder {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Install a freshly verified session.
    pub fn authenticate(
        &self,
        token: SecretString,
        region: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(token, region, expires_at));
        let _ = self.tx.send(Some(Arc::clone(&session)));
        info!(region = session.region(), "session established");
        session
    }

    /// Clear all session state.
    pub fn logout(&self) {
        let _ = self.tx.send(None);
        info!("session cleared");
    }

    /// The current session, or `None` when signed out.
    ///
    /// An expired session is cleared on detection, exactly as an explicit
    /// logout would clear it.
    pub fn current(&self) -> Option<Arc<Session>> {
        let session = self.tx.borrow().clone()?;
        if session.is_expired() {
            let _ = self.tx.send(None);
            info!("session expired, cleared");
            return None;
        }
        Some(session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Observe session transitions (sign-in, logout, expiry).
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.tx.subscribe()
    }
}

impl Default for SessionHolder {
    fn default() -> Self {
        Self::new()
    }
}
