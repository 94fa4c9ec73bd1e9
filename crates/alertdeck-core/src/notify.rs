// ── Notification dispatcher ──
//
// Raises a transient notice and bumps the unread counter for each inbound
// push alert. Best-effort UI feedback: notice delivery never blocks and
// never fails core state.

use std::sync::Arc;
use std::time::Duration;

use alertdeck_api::model::Alert;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::debug;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// How long a notice stays up before auto-dismissing.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// A transient, auto-expiring notice for one push alert.
///
/// The view renders it (critical alerts get distinct styling), dismisses it
/// early on interaction, and navigates to the alert list on dismissal.
#[derive(Debug, Clone)]
pub struct Notice {
    pub alert_type: String,
    pub location: Option<String>,
    pub critical: bool,
    pub raised_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Notice {
    fn for_alert(alert: &Alert) -> Self {
        Self {
            alert_type: alert.alert_type.clone(),
            location: alert.location.clone(),
            critical: alert.severity.is_critical(),
            raised_at: Utc::now(),
            ttl: NOTICE_TTL,
        }
    }

    /// Whether the notice has outlived its TTL at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.raised_at >= ttl,
            Err(_) => false,
        }
    }
}

/// Per-session notice fan-out and unread counter.
///
/// The counter increments once per distinct inbound push alert and resets
/// only by explicit view action (once per visit to the alert list, not on
/// every render).
pub struct NotificationDispatcher {
    unread: watch::Sender<u64>,
    notices: broadcast::Sender<Arc<Notice>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        let (unread, _) = watch::channel(0);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { unread, notices }
    }

    /// Handle one inbound push alert: bump the counter, raise a notice.
    ///
    /// Query-batch alerts never come through here -- only push frames.
    pub fn on_alert(&self, alert: &Alert) {
        self.unread.send_modify(|n| *n += 1);

        let notice = Notice::for_alert(alert);
        debug!(
            alert_type = notice.alert_type,
            critical = notice.critical,
            "notice raised"
        );
        // Ignore send errors -- just means nothing is rendering notices
        let _ = self.notices.send(Arc::new(notice));
    }

    /// Reset the unread counter to zero. Idempotent.
    pub fn reset_unread(&self) {
        let _ = self.unread.send(0);
    }

    /// Current unread count.
    pub fn unread(&self) -> u64 {
        *self.unread.borrow()
    }

    /// Observe unread counter changes.
    pub fn unread_receiver(&self) -> watch::Receiver<u64> {
        self.unread.subscribe()
    }

    /// Subscribe to the notice stream.
    pub fn notices(&self) -> broadcast::Receiver<Arc<Notice>> {
        self.notices.subscribe()
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
