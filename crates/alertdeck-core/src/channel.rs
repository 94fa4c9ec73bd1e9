// ── Push channel manager ──
//
// Owns the lifecycle of the one authenticated push connection per session.
// Gates `PushChannel` on session validity, makes repeated connects for the
// same credential a no-op, and tears the channel down when the session is
// invalidated, the region changes, or the consuming view unmounts.

use std::sync::Arc;
use std::sync::Mutex;

use alertdeck_api::model::Alert;
use alertdeck_api::push::{ChannelState, PushChannel, ReconnectPolicy};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;
use crate::session::Session;

struct ActiveChannel {
    session: Arc<Session>,
    channel: PushChannel,
    cancel: CancellationToken,
}

/// Session-gated owner of the push channel.
pub struct ChannelManager {
    ws_url: Url,
    reconnect: ReconnectPolicy,
    active: Mutex<Option<ActiveChannel>>,
}

impl ChannelManager {
    pub fn new(ws_url: Url, reconnect: ReconnectPolicy) -> Self {
        Self {
            ws_url,
            reconnect,
            active: Mutex::new(None),
        }
    }

    /// Open the channel for an authenticated session.
    ///
    /// No-op when already connecting/connected for the same credential.
    /// A different credential (re-authentication or region change) tears
    /// down the old connection first.
    pub fn connect(&self, session: &Arc<Session>) -> Result<(), CoreError> {
        if session.is_expired() {
            return Err(CoreError::SessionExpired);
        }

        let mut active = self.active.lock().expect("channel manager lock");

        if let Some(existing) = active.as_ref() {
            let state = *existing.channel.state().borrow();
            if existing.session.same_credential(session)
                && matches!(state, ChannelState::Connecting | ChannelState::Connected)
            {
                debug!("push channel already up for this session");
                return Ok(());
            }
            // Stale, errored, or different-session channel: replace it.
            existing.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let channel = PushChannel::open(
            self.ws_url.clone(),
            session.token().clone(),
            session.region(),
            self.reconnect.clone(),
            cancel.clone(),
        );

        info!(region = session.region(), "push channel opened");
        *active = Some(ActiveChannel {
            session: Arc::clone(session),
            channel,
            cancel,
        });
        Ok(())
    }

    /// Tear down the connection and all subscriptions. Idempotent.
    pub fn disconnect(&self) {
        let mut active = self.active.lock().expect("channel manager lock");
        if let Some(existing) = active.take() {
            existing.cancel.cancel();
            debug!("push channel disconnected");
        }
    }

    /// Subscribe to the alert fan-out. Every subscriber sees every event.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<Arc<Alert>>, CoreError> {
        let active = self.active.lock().expect("channel manager lock");
        active
            .as_ref()
            .map(|a| a.channel.subscribe())
            .ok_or(CoreError::ChannelUnavailable {
                reason: "not connected".into(),
            })
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ChannelState {
        let active = self.active.lock().expect("channel manager lock");
        active
            .as_ref()
            .map_or(ChannelState::Disconnected, |a| *a.channel.state().borrow())
    }

    /// Observe connection state transitions of the active channel.
    pub fn state_receiver(&self) -> Option<tokio::sync::watch::Receiver<ChannelState>> {
        let active = self.active.lock().expect("channel manager lock");
        active.as_ref().map(|a| a.channel.state())
    }
}
