// ── Query/filter controller ──
//
// Holds the current filters and page index. Any filter mutation resets
// the page to 0 and marks the view model for refetch; page navigation is
// clamped to the known page range and marks for refetch without touching
// filters. Pure orchestration, no other invariants.

use alertdeck_api::model::{AlertQuery, Severity};

#[derive(Debug, Clone)]
pub struct FilterController {
    severity: Option<Severity>,
    acknowledged: Option<bool>,
    page: u32,
    page_size: u32,
    total_pages: u32,
    dirty: bool,
}

impl FilterController {
    pub fn new(page_size: u32) -> Self {
        Self {
            severity: None,
            acknowledged: None,
            page: 0,
            page_size,
            total_pages: 0,
            // A fresh controller wants an initial fetch.
            dirty: true,
        }
    }

    // ── Filter mutation (resets page) ────────────────────────────────

    pub fn set_severity(&mut self, severity: Option<Severity>) {
        if self.severity != severity {
            self.severity = severity;
            self.page = 0;
            self.dirty = true;
        }
    }

    pub fn set_acknowledged(&mut self, acknowledged: Option<bool>) {
        if self.acknowledged != acknowledged {
            self.acknowledged = acknowledged;
            self.page = 0;
            self.dirty = true;
        }
    }

    // ── Page navigation (keeps filters) ──────────────────────────────

    /// Jump to a page, clamped to `[0, total_pages - 1]`.
    pub fn set_page(&mut self, page: u32) {
        let clamped = page.min(self.total_pages.saturating_sub(1));
        if clamped != self.page {
            self.page = clamped;
            self.dirty = true;
        }
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Record the page count reported by the latest query response.
    pub fn set_total_pages(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
    }

    // ── Refetch handshake ────────────────────────────────────────────

    /// Whether a mutation since the last `take_dirty` requires a refetch.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Consume the refetch mark.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// The outbound query for the current filters and page.
    pub fn query(&self) -> AlertQuery {
        AlertQuery {
            page: self.page,
            size: self.page_size,
            severity: self.severity,
            acknowledged: self.acknowledged,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_change_resets_page_and_marks_dirty() {
        let mut filters = FilterController::new(10);
        filters.set_total_pages(5);
        filters.take_dirty();
        filters.set_page(2);
        filters.take_dirty();

        filters.set_severity(Some(Severity::Critical));
        assert_eq!(filters.page(), 0);
        assert!(filters.is_dirty());
    }

    #[test]
    fn unchanged_filter_does_not_mark_dirty() {
        let mut filters = FilterController::new(10);
        filters.take_dirty();

        filters.set_severity(None);
        filters.set_acknowledged(None);
        assert!(!filters.is_dirty());
    }

    #[test]
    fn page_navigation_is_clamped() {
        let mut filters = FilterController::new(10);
        filters.set_total_pages(3);
        filters.take_dirty();

        filters.set_page(99);
        assert_eq!(filters.page(), 2);
        assert!(filters.take_dirty());

        filters.next_page();
        assert_eq!(filters.page(), 2);
        assert!(!filters.is_dirty());

        filters.prev_page();
        assert_eq!(filters.page(), 1);
        assert!(filters.is_dirty());
    }

    #[test]
    fn page_navigation_keeps_filters() {
        let mut filters = FilterController::new(10);
        filters.set_total_pages(4);
        filters.set_acknowledged(Some(false));
        filters.take_dirty();

        filters.next_page();
        let query = filters.query();
        assert_eq!(query.page, 1);
        assert_eq!(query.acknowledged, Some(false));
    }

    #[test]
    fn empty_listing_stays_on_page_zero() {
        let mut filters = FilterController::new(10);
        // total_pages still 0
        filters.next_page();
        assert_eq!(filters.page(), 0);
    }

    #[test]
    fn query_carries_page_size() {
        let filters = FilterController::new(25);
        assert_eq!(filters.query().size, 25);
        assert_eq!(filters.query().page, 0);
    }
}
