//! WebSocket push channel for realtime alert delivery.
//!
//! Opens one authenticated connection per session, subscribes to the
//! operator's region topic plus the global topic, and streams parsed
//! [`Alert`](crate::model::Alert) frames through a
//! [`tokio::sync::broadcast`] channel so every subscriber sees every
//! event. Reconnects with bounded exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use alertdeck_api::push::{PushChannel, ReconnectPolicy};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("wss://alerts.example.org/ws")?;
//!
//! let channel = PushChannel::open(ws_url, token, "Mumbai", ReconnectPolicy::default(), cancel.clone());
//! let mut rx = channel.subscribe();
//!
//! while let Ok(alert) = rx.recv().await {
//!     println!("{}: {:?}", alert.alert_type, alert.location);
//! }
//!
//! channel.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::model::Alert;

// ── Topics ───────────────────────────────────────────────────────────

/// Topic delivering alerts to every operator regardless of region.
pub const GLOBAL_TOPIC: &str = "/topic/admin/alerts/GLOBAL";

/// Topic scoped to one operator's assigned region.
pub fn region_topic(region: &str) -> String {
    format!("/topic/admin/alerts/{region}")
}

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Exponential backoff configuration for channel reconnection.
///
/// `max_retries: Some(0)` disables reconnection entirely: a transport
/// error settles the channel at [`ChannelState::Errored`] until a fresh
/// connect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(5),
        }
    }
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Handle to a running push channel.
///
/// Holds the broadcast sender side for fan-out subscription and a
/// cancellation token for teardown. Dropping the handle does not stop
/// the background task -- call [`shutdown`](Self::shutdown).
pub struct PushChannel {
    event_rx: broadcast::Receiver<Arc<Alert>>,
    state_rx: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
}

impl PushChannel {
    /// Open the channel and spawn the connection loop.
    ///
    /// Returns immediately once the background task is spawned; the
    /// handshake happens asynchronously. Observe progress through
    /// [`state`](Self::state) and consume alerts through
    /// [`subscribe`](Self::subscribe).
    pub fn open(
        ws_url: Url,
        token: SecretString,
        region: &str,
        reconnect: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);

        let topics = vec![region_topic(region), GLOBAL_TOPIC.to_owned()];
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            channel_loop(ws_url, token, topics, event_tx, state_tx, reconnect, task_cancel).await;
        });

        Self {
            event_rx,
            state_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the alert stream.
    ///
    /// Multiple consumers can subscribe concurrently; every consumer sees
    /// every frame. A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Alert>> {
        self.event_rx.resubscribe()
    }

    /// Observe connection state transitions.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down.
    ///
    /// Idempotent. No further alerts are delivered to subscribers once
    /// the task observes the cancellation.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background connection loop ───────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn channel_loop(
    ws_url: Url,
    token: SecretString,
    topics: Vec<String>,
    event_tx: broadcast::Sender<Arc<Alert>>,
    state_tx: watch::Sender<ChannelState>,
    reconnect: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let _ = state_tx.send(ChannelState::Connecting);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &token, &topics, &event_tx, &state_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset the attempt counter and reconnect immediately.
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("push channel disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push channel error");
                        let _ = state_tx.send(ChannelState::Errored);

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "push channel reconnection limit reached, giving up"
                                );
                                // Settles at Errored; only a fresh connect
                                // (session re-authentication) revives it.
                                return;
                            }
                        }

                        let delay = backoff_delay(attempt, &reconnect);
                        tracing::info!(?delay, attempt, "waiting before reconnect");

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    let _ = state_tx.send(ChannelState::Disconnected);
    tracing::debug!("push channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection, subscribe, read until it drops.
///
/// The bearer token is injected as an `Authorization` header on the
/// upgrade request. Each topic gets its own subscribe frame; a failed
/// subscribe send is logged and does not tear down the connection.
async fn connect_and_read(
    url: &Url,
    token: &SecretString,
    topics: &[String],
    event_tx: &broadcast::Sender<Arc<Alert>>,
    state_tx: &watch::Sender<ChannelState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri)
        .with_header("Authorization", format!("Bearer {}", token.expose_secret()));

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("push channel connected");

    let (mut write, mut read) = ws_stream.split();

    // Subscriptions are independent: losing one topic must not cost the
    // other, so per-topic send failures are logged and skipped.
    for topic in topics {
        let frame = subscribe_frame(topic);
        if let Err(e) = write.send(tungstenite::Message::text(frame)).await {
            tracing::warn!(%topic, error = %e, "subscribe frame failed");
        } else {
            tracing::debug!(%topic, "subscribed");
        }
    }

    let _ = state_tx.send(ChannelState::Connected);

    loop {
        tokio::select! {
            biased;
            // Cancellation wins over a frame racing it: nothing is parsed
            // or broadcast after disconnect.
            _ = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite replies with pong automatically
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push channel close frame received"
                            );
                        } else {
                            tracing::info!("push channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("push channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// Build the JSON subscribe frame for a topic.
fn subscribe_frame(topic: &str) -> String {
    serde_json::json!({ "type": "SUBSCRIBE", "destination": topic }).to_string()
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse a text frame as a JSON-encoded alert and broadcast it.
///
/// Malformed frames are logged and dropped; they never crash the channel
/// and never mutate consumer state.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<Alert>>) {
    let alert: Alert = match serde_json::from_str(text) {
        Ok(alert) => alert,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparseable push frame");
            return;
        }
    };

    // Ignore send errors -- just means no active subscribers right now
    let _ = event_tx.send(Arc::new(alert));
}

// ── Backoff ──────────────────────────────────────────────────────────

/// Delay before reconnect attempt number `attempt`.
///
/// Doubles from `initial_delay` until `max_delay`, then spreads the
/// result by a +-25% factor derived from the attempt number, so a fleet
/// of clients that lost the same broker does not reconnect in lockstep.
/// The spread is a pure function of `attempt`: no RNG, reproducible in
/// tests.
fn backoff_delay(attempt: u32, policy: &ReconnectPolicy) -> Duration {
    let doubled = policy.initial_delay.as_secs_f64() * 2.0_f64.powf(f64::from(attempt));
    let capped = doubled.min(policy.max_delay.as_secs_f64());
    let spread = 0.25 * (f64::from(attempt) * 7.3).sin();

    Duration::from_secs_f64(capped * (1.0 + spread))
}

// ── Tests ────────────────────────────────────────────────────────────
