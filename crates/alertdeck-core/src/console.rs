// ── Console abstraction ──
//
// Wires the subsystem together for one operator session: builds the REST
// client, opens the push channel, fans events out to the notification
// dispatcher and the alert list reconciler, and drives paginated loading
// through the filter controller.

use std::sync::Arc;

use alertdeck_api::client::AlertsClient;
use alertdeck_api::model::{Alert, Severity};
use alertdeck_api::push::ChannelState;
use alertdeck_api::transport::TransportConfig;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ChannelManager;
use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::notify::{Notice, NotificationDispatcher};
use crate::query::FilterController;
use crate::reconciler::AlertListReconciler;
use crate::session::{Session, SessionHolder};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Manages the connection
/// lifecycle and exposes the reactive state the presentation layer reads.
#[derive(Clone)]
pub struct AlertConsole {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    dispatcher: Arc<NotificationDispatcher>,
    reconciler: Arc<AlertListReconciler>,
    filters: std::sync::Mutex<FilterController>,
    channel: ChannelManager,
    conn: Mutex<Option<ActiveConn>>,
}

struct ActiveConn {
    session: Arc<Session>,
    client: Arc<AlertsClient>,
    cancel: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl AlertConsole {
    /// Create a console from configuration. Does NOT connect -- call
    /// [`connect()`](Self::connect) with an authenticated session.
    pub fn new(config: ConsoleConfig) -> Self {
        let channel = ChannelManager::new(config.ws_url.clone(), config.reconnect.clone());
        let filters = std::sync::Mutex::new(FilterController::new(config.page_size));
        let reconciler = Arc::new(AlertListReconciler::new(config.page_size));

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                dispatcher: Arc::new(NotificationDispatcher::new()),
                reconciler,
                filters,
                channel,
                conn: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect for an authenticated session.
    ///
    /// Builds the REST client, opens the push channel, spawns one consumer
    /// task per subscriber, and performs the initial page load. No-op when
    /// already connected for the same credential; a different credential
    /// replaces the old connection.
    pub async fn connect(&self, session: &Arc<Session>) -> Result<(), CoreError> {
        if session.is_expired() {
            return Err(CoreError::SessionExpired);
        }

        {
            let mut conn = self.inner.conn.lock().await;

            if let Some(active) = conn.as_ref() {
                if active.session.same_credential(session) {
                    debug!("console already connected for this session");
                    return Ok(());
                }
                // Re-authentication or region change: replace the connection.
                Self::teardown(&self.inner.channel, conn.take()).await;
            }

            let transport = TransportConfig {
                tls: self.inner.config.tls.clone(),
                timeout: self.inner.config.timeout,
            };
            let client = Arc::new(AlertsClient::new(
                self.inner.config.base_url.clone(),
                session.token(),
                &transport,
            )?);

            self.inner.channel.connect(session)?;

            let cancel = CancellationToken::new();
            let mut task_handles = Vec::new();

            // Fan-out: each consumer gets its own receiver and sees every
            // event the channel delivers.
            let notices_rx = self.inner.channel.subscribe()?;
            task_handles.push(tokio::spawn(dispatcher_task(
                Arc::clone(&self.inner.dispatcher),
                notices_rx,
                cancel.clone(),
            )));

            let merge_rx = self.inner.channel.subscribe()?;
            task_handles.push(tokio::spawn(reconciler_task(
                Arc::clone(&self.inner.reconciler),
                merge_rx,
                cancel.clone(),
            )));

            *conn = Some(ActiveConn {
                session: Arc::clone(session),
                client,
                cancel,
                task_handles,
            });
        }

        // Initial data load
        self.refresh().await?;

        info!(region = session.region(), "console connected");
        Ok(())
    }

    /// Disconnect: stop consumer tasks, close the channel. Idempotent.
    ///
    /// No further events reach the dispatcher or reconciler after this
    /// returns.
    pub async fn disconnect(&self) {
        let mut conn = self.inner.conn.lock().await;
        Self::teardown(&self.inner.channel, conn.take()).await;
    }

    async fn teardown(channel: &ChannelManager, conn: Option<ActiveConn>) {
        let Some(mut active) = conn else { return };

        active.cancel.cancel();
        channel.disconnect();
        for handle in active.task_handles.drain(..) {
            let _ = handle.await;
        }
        debug!("console disconnected");
    }

    /// React to session transitions: connect on sign-in, disconnect on
    /// logout or expiry. Reconnect after a channel failure happens only
    /// through a fresh session event arriving here.
    pub fn watch_session(&self, holder: &SessionHolder) -> JoinHandle<()> {
        let console = self.clone();
        let mut rx = holder.subscribe();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                match session {
                    Some(session) => {
                        if let Err(e) = console.connect(&session).await {
                            warn!(error = %e, "connect on session event failed");
                        }
                    }
                    None => console.disconnect().await,
                }
            }
        })
    }

    // ── Paginated loading ────────────────────────────────────────────

    /// Re-fetch the current filters/page.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let client = self.client().await?;
        let query = {
            let mut filters = self.inner.filters.lock().expect("filter lock");
            filters.take_dirty();
            filters.query()
        };

        self.inner.reconciler.load_page(&client, query).await?;

        let total = self.inner.reconciler.total_pages();
        self.inner
            .filters
            .lock()
            .expect("filter lock")
            .set_total_pages(total);
        Ok(())
    }

    /// Change the severity filter; resets to page 0 and re-fetches.
    pub async fn set_severity_filter(&self, severity: Option<Severity>) -> Result<(), CoreError> {
        let dirty = {
            let mut filters = self.inner.filters.lock().expect("filter lock");
            filters.set_severity(severity);
            filters.is_dirty()
        };
        if dirty { self.refresh().await } else { Ok(()) }
    }

    /// Change the acknowledged filter; resets to page 0 and re-fetches.
    pub async fn set_acknowledged_filter(
        &self,
        acknowledged: Option<bool>,
    ) -> Result<(), CoreError> {
        let dirty = {
            let mut filters = self.inner.filters.lock().expect("filter lock");
            filters.set_acknowledged(acknowledged);
            filters.is_dirty()
        };
        if dirty { self.refresh().await } else { Ok(()) }
    }

    /// Navigate to a page (clamped); filters are kept.
    pub async fn goto_page(&self, page: u32) -> Result<(), CoreError> {
        let dirty = {
            let mut filters = self.inner.filters.lock().expect("filter lock");
            filters.set_page(page);
            filters.is_dirty()
        };
        if dirty { self.refresh().await } else { Ok(()) }
    }

    pub async fn next_page(&self) -> Result<(), CoreError> {
        let page = self.page().saturating_add(1);
        self.goto_page(page).await
    }

    pub async fn prev_page(&self) -> Result<(), CoreError> {
        let page = self.page().saturating_sub(1);
        self.goto_page(page).await
    }

    // ── Acknowledgment ───────────────────────────────────────────────

    /// Acknowledge an alert (optimistic, reconciled against the command
    /// response by the reconciler).
    pub async fn acknowledge(&self, id: &str) -> Result<(), CoreError> {
        let client = self.client().await?;
        self.inner.reconciler.acknowledge(&client, id).await
    }

    // ── State observation ────────────────────────────────────────────

    /// Current alert list snapshot.
    pub fn alerts(&self) -> Arc<Vec<Arc<Alert>>> {
        self.inner.reconciler.alerts()
    }

    /// Observe alert list changes.
    pub fn subscribe_alerts(&self) -> watch::Receiver<Arc<Vec<Arc<Alert>>>> {
        self.inner.reconciler.subscribe()
    }

    /// Current unread count.
    pub fn unread(&self) -> u64 {
        self.inner.dispatcher.unread()
    }

    /// Observe unread counter changes.
    pub fn unread_receiver(&self) -> watch::Receiver<u64> {
        self.inner.dispatcher.unread_receiver()
    }

    /// Reset the unread counter; the view calls this once per visit to
    /// the alert list.
    pub fn reset_unread(&self) {
        self.inner.dispatcher.reset_unread();
    }

    /// Subscribe to transient notices.
    pub fn notices(&self) -> broadcast::Receiver<Arc<Notice>> {
        self.inner.dispatcher.notices()
    }

    /// Push channel connection state.
    pub fn channel_state(&self) -> ChannelState {
        self.inner.channel.state()
    }

    pub fn page(&self) -> u32 {
        self.inner.filters.lock().expect("filter lock").page()
    }

    pub fn total_pages(&self) -> u32 {
        self.inner.filters.lock().expect("filter lock").total_pages()
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn client(&self) -> Result<Arc<AlertsClient>, CoreError> {
        self.inner
            .conn
            .lock()
            .await
            .as_ref()
            .map(|c| Arc::clone(&c.client))
            .ok_or(CoreError::Unauthenticated)
    }
}

// ── Consumer tasks ───────────────────────────────────────────────────

/// Feed push events to the notification dispatcher.
async fn dispatcher_task(
    dispatcher: Arc<NotificationDispatcher>,
    mut rx: broadcast::Receiver<Arc<Alert>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(alert) => dispatcher.on_alert(&alert),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notice consumer lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Feed push events to the alert list reconciler.
async fn reconciler_task(
    reconciler: Arc<AlertListReconciler>,
    mut rx: broadcast::Receiver<Arc<Alert>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(alert) => reconciler.merge_push(&alert),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "merge consumer lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tokio_test::assert_ok;

    use super::*;

    fn alert(id: &str) -> Arc<Alert> {
        Arc::new(Alert {
            id: id.into(),
            alert_type: "FLOOD".into(),
            severity: Severity::High,
            location: Some("Mumbai".into()),
            timestamp: Utc::now(),
            acknowledged: false,
        })
    }

    // A frame racing teardown: by the time the consumer tasks poll, the
    // token is cancelled and an event sits in the broadcast queue. The
    // biased select means neither consumer applies it.
    #[tokio::test]
    async fn cancelled_consumers_never_apply_queued_events() {
        let reconciler = Arc::new(AlertListReconciler::new(10));
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let (tx, _keep_open) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let merge = tokio::spawn(reconciler_task(
            Arc::clone(&reconciler),
            tx.subscribe(),
            cancel.clone(),
        ));
        let notify = tokio::spawn(dispatcher_task(
            Arc::clone(&dispatcher),
            tx.subscribe(),
            cancel.clone(),
        ));

        cancel.cancel();
        let _ = tx.send(alert("late"));

        assert_ok!(merge.await);
        assert_ok!(notify.await);

        assert!(reconciler.alerts().is_empty());
        assert_eq!(dispatcher.unread(), 0);
    }
}
