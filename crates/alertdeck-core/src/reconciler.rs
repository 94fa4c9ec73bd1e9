// ── Alert list reconciler ──
//
// Merges paginated query results with realtime push events into one
// ordered, deduplicated view model, and reconciles optimistic
// acknowledgment edits against the command collaborator's response.
//
// Ordering/consistency rules:
//   - identity is the alert `id`; the view model never holds duplicates
//   - a page response replaces the base contents wholesale and is
//     authoritative for every id it contains; push-only entries it does
//     not contain are retained at the head
//   - a stale page response (superseded by a newer request) is discarded
//     before any mutation: last response wins
//   - an optimistic acknowledgment is applied strictly before the command
//     is dispatched; on failure the marker is cleared and one
//     authoritative re-fetch restores ground truth (no field rollback)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;

use alertdeck_api::client::AlertsClient;
use alertdeck_api::model::{Alert, AlertPage, AlertQuery};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Marker for an optimistic acknowledgment awaiting server confirmation.
#[derive(Debug, Clone)]
pub struct PendingAck {
    pub alert_id: String,
    pub submitted_at: DateTime<Utc>,
}

struct Inner {
    /// Ordered view model: push-originated entries newest-first at the
    /// head, then the current base page.
    entries: Vec<Arc<Alert>>,
    /// Ids that entered via push and are not yet represented in a page
    /// response. Retained across wholesale page replacement.
    push_ids: HashSet<String>,
    pending_acks: HashMap<String, PendingAck>,
    total_pages: u32,
    /// Bumped per `load_page`; responses carrying an older generation
    /// are discarded.
    generation: u64,
    /// Filters/page of the most recent load, used for the authoritative
    /// re-fetch after a failed acknowledgment.
    current_query: AlertQuery,
}

/// Client-side state reconciliation for the alert list.
pub struct AlertListReconciler {
    inner: Mutex<Inner>,
    snapshot: watch::Sender<Arc<Vec<Arc<Alert>>>>,
}

impl AlertListReconciler {
    pub fn new(page_size: u32) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                push_ids: HashSet::new(),
                pending_acks: HashMap::new(),
                total_pages: 0,
                generation: 0,
                current_query: AlertQuery::first_page(page_size),
            }),
            snapshot,
        }
    }

    // ── Paginated loading ────────────────────────────────────────────

    /// Issue one paginated query and apply the response.
    ///
    /// On success the base page is replaced wholesale, then re-merged
    /// with push entries not represented in the response. On failure the
    /// view model is left untouched. A response superseded by a newer
    /// `load_page` call is discarded without any mutation.
    pub async fn load_page(
        &self,
        client: &AlertsClient,
        query: AlertQuery,
    ) -> Result<(), CoreError> {
        let generation = {
            let mut inner = self.inner.lock().expect("reconciler lock");
            inner.generation += 1;
            inner.current_query = query.clone();
            inner.generation
        };

        let result = client.list_alerts(&query).await;

        let mut inner = self.inner.lock().expect("reconciler lock");
        if inner.generation != generation {
            debug!(generation, "discarding superseded page response");
            return Ok(());
        }

        let page = result.map_err(CoreError::query)?;
        Self::apply_page(&mut inner, page);
        self.publish(&inner);
        Ok(())
    }

    /// Replace the base page and re-merge retained push entries.
    fn apply_page(inner: &mut Inner, page: AlertPage) {
        let page_ids: HashSet<String> = page.content.iter().map(|a| a.id.clone()).collect();

        // Push-only entries not in this page stay at the head, in order.
        let mut merged: Vec<Arc<Alert>> = inner
            .entries
            .iter()
            .filter(|e| inner.push_ids.contains(&e.id) && !page_ids.contains(&e.id))
            .cloned()
            .collect();

        for mut alert in page.content {
            // An unresolved optimistic acknowledgment stays visible until
            // its command settles; the failure path re-fetches anyway.
            if !alert.acknowledged && inner.pending_acks.contains_key(&alert.id) {
                alert.acknowledged = true;
            }
            merged.push(Arc::new(alert));
        }

        // Ids now represented by the query source are no longer push-only.
        inner.push_ids.retain(|id| !page_ids.contains(id));
        inner.entries = merged;
        inner.total_pages = page.total_pages;
    }

    // ── Push merging ─────────────────────────────────────────────────

    /// Merge one push-originated alert into the view model.
    ///
    /// Head-inserts when the id is new. For an existing entry only the
    /// acknowledgment flag follows the push event; every other field
    /// keeps its query-sourced value.
    pub fn merge_push(&self, alert: &Arc<Alert>) {
        let mut inner = self.inner.lock().expect("reconciler lock");

        if let Some(pos) = inner.entries.iter().position(|e| e.id == alert.id) {
            if inner.entries[pos].acknowledged != alert.acknowledged {
                let mut updated = (*inner.entries[pos]).clone();
                updated.acknowledged = alert.acknowledged;
                inner.entries[pos] = Arc::new(updated);
                self.publish(&inner);
            }
            return;
        }

        inner.entries.insert(0, Arc::clone(alert));
        inner.push_ids.insert(alert.id.clone());
        self.publish(&inner);
    }

    // ── Acknowledgment ───────────────────────────────────────────────

    /// Acknowledge an alert: optimistic local flip, then the command.
    ///
    /// No-op (no command issued) when the entry is already acknowledged.
    /// On command failure the pending marker is cleared and exactly one
    /// authoritative re-fetch of the current filters/page is issued.
    pub async fn acknowledge(&self, client: &AlertsClient, id: &str) -> Result<(), CoreError> {
        {
            let mut inner = self.inner.lock().expect("reconciler lock");

            let Some(pos) = inner.entries.iter().position(|e| e.id == id) else {
                return Err(CoreError::AlertNotFound { id: id.to_owned() });
            };
            if inner.entries[pos].acknowledged {
                debug!(id, "alert already acknowledged, skipping command");
                return Ok(());
            }

            let mut updated = (*inner.entries[pos]).clone();
            updated.acknowledged = true;
            inner.entries[pos] = Arc::new(updated);
            inner.pending_acks.insert(
                id.to_owned(),
                PendingAck {
                    alert_id: id.to_owned(),
                    submitted_at: Utc::now(),
                },
            );
            self.publish(&inner);
        }
        // Optimistic state is visible strictly before the command goes out.

        let result = client.acknowledge(id).await;

        {
            let mut inner = self.inner.lock().expect("reconciler lock");
            inner.pending_acks.remove(id);
        }

        match result {
            Ok(_confirmed) => Ok(()),
            Err(e) => {
                warn!(id, error = %e, "acknowledge failed, re-fetching authoritative page");
                let query = {
                    let inner = self.inner.lock().expect("reconciler lock");
                    inner.current_query.clone()
                };
                if let Err(fetch_err) = self.load_page(client, query).await {
                    warn!(error = %fetch_err, "authoritative re-fetch failed");
                }
                Err(CoreError::command(e))
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Current view model snapshot (cheap `Arc` clone).
    pub fn alerts(&self) -> Arc<Vec<Arc<Alert>>> {
        self.snapshot.borrow().clone()
    }

    /// Observe view model changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Alert>>>> {
        self.snapshot.subscribe()
    }

    /// View model changes as a `Stream` for `StreamExt` combinators.
    pub fn stream(&self) -> WatchStream<Arc<Vec<Arc<Alert>>>> {
        WatchStream::new(self.snapshot.subscribe())
    }

    /// Total pages reported by the most recent page response.
    pub fn total_pages(&self) -> u32 {
        self.inner.lock().expect("reconciler lock").total_pages
    }

    /// Filters/page of the most recent load.
    pub fn current_query(&self) -> AlertQuery {
        self.inner
            .lock()
            .expect("reconciler lock")
            .current_query
            .clone()
    }

    /// Whether an acknowledgment for this id is still awaiting its
    /// command response.
    pub fn has_pending_ack(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("reconciler lock")
            .pending_acks
            .contains_key(id)
    }

    fn publish(&self, inner: &Inner) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot
            .send_modify(|snap| *snap = Arc::new(inner.entries.clone()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alertdeck_api::model::Severity;

    fn alert(id: &str, acknowledged: bool) -> Arc<Alert> {
        Arc::new(Alert {
            id: id.into(),
            alert_type: "FLOOD".into(),
            severity: Severity::High,
            location: Some("Mumbai".into()),
            timestamp: Utc::now(),
            acknowledged,
        })
    }

    fn ids(reconciler: &AlertListReconciler) -> Vec<String> {
        reconciler.alerts().iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn merge_push_never_duplicates_ids() {
        let reconciler = AlertListReconciler::new(10);

        for id in ["1", "2", "1", "3", "2", "1"] {
            reconciler.merge_push(&alert(id, false));
        }

        let seen = ids(&reconciler);
        assert_eq!(seen, vec!["3", "2", "1"]);
    }

    #[test]
    fn merge_push_inserts_newest_first() {
        let reconciler = AlertListReconciler::new(10);
        reconciler.merge_push(&alert("a", false));
        reconciler.merge_push(&alert("b", false));

        assert_eq!(ids(&reconciler), vec!["b", "a"]);
    }

    #[test]
    fn duplicate_push_keeps_existing_fields() {
        let reconciler = AlertListReconciler::new(10);
        reconciler.merge_push(&alert("1", false));

        let mut other = (*alert("1", false)).clone();
        other.alert_type = "CYCLONE".into();
        other.location = Some("Chennai".into());
        reconciler.merge_push(&Arc::new(other));

        let snapshot = reconciler.alerts();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].alert_type, "FLOOD");
        assert_eq!(snapshot[0].location.as_deref(), Some("Mumbai"));
    }

    #[test]
    fn duplicate_push_refreshes_acknowledgment_state() {
        let reconciler = AlertListReconciler::new(10);
        reconciler.merge_push(&alert("1", false));
        reconciler.merge_push(&alert("1", true));

        let snapshot = reconciler.alerts();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].acknowledged);
        // Other fields untouched either way.
        assert_eq!(snapshot[0].alert_type, "FLOOD");
    }

    #[test]
    fn apply_page_is_authoritative_and_retains_push_entries() {
        let reconciler = AlertListReconciler::new(10);
        // Push-inserted entry, unacknowledged.
        reconciler.merge_push(&alert("42", false));
        reconciler.merge_push(&alert("99", false));

        let mut inner = reconciler.inner.lock().unwrap();
        AlertListReconciler::apply_page(
            &mut inner,
            AlertPage {
                content: vec![(*alert("42", true)).clone(), (*alert("7", false)).clone()],
                total_pages: 1,
            },
        );
        drop(inner);
        reconciler.publish(&reconciler.inner.lock().unwrap());

        let snapshot = reconciler.alerts();
        let seen: Vec<&str> = snapshot.iter().map(|a| a.id.as_str()).collect();
        // Push-only "99" retained at head; "42" now the authoritative
        // query version (acknowledged); "7" from the page.
        assert_eq!(seen, vec!["99", "42", "7"]);
        assert!(snapshot[1].acknowledged);
    }

    #[test]
    fn apply_page_replaces_base_wholesale() {
        let reconciler = AlertListReconciler::new(10);

        let mut inner = reconciler.inner.lock().unwrap();
        AlertListReconciler::apply_page(
            &mut inner,
            AlertPage {
                content: vec![(*alert("1", false)).clone(), (*alert("2", false)).clone()],
                total_pages: 2,
            },
        );
        AlertListReconciler::apply_page(
            &mut inner,
            AlertPage {
                content: vec![(*alert("3", false)).clone()],
                total_pages: 2,
            },
        );

        let seen: Vec<&str> = inner.entries.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(seen, vec!["3"]);
        assert_eq!(inner.total_pages, 2);
    }

    #[tokio::test]
    async fn acknowledge_already_acked_is_a_noop() {
        let reconciler = AlertListReconciler::new(10);
        reconciler.merge_push(&alert("7", true));

        // Client pointing nowhere: a no-op must not issue any request.
        let client = AlertsClient::with_client(
            reqwest::Client::new(),
            "http://127.0.0.1:9/".parse().unwrap(),
        );

        reconciler
            .acknowledge(&client, "7")
            .await
            .expect("no-op ack must succeed");
        assert!(!reconciler.has_pending_ack("7"));
    }

    #[tokio::test]
    async fn acknowledge_unknown_id_is_an_error() {
        let reconciler = AlertListReconciler::new(10);
        let client = AlertsClient::with_client(
            reqwest::Client::new(),
            "http://127.0.0.1:9/".parse().unwrap(),
        );

        let err = reconciler
            .acknowledge(&client, "missing")
            .await
            .expect_err("unknown id must fail");
        assert!(matches!(err, CoreError::AlertNotFound { .. }));
    }
}
