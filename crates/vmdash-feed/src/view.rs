use crate::filter::ViewFilter;
use vmdash_common::types::{Alert, AlertChange};

/// How an applied change affected the visible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// The record was not visible before and is now.
    Added,
    /// A visible record was replaced in place.
    Replaced,
    /// A visible record stopped matching the filter.
    Removed,
    /// Nothing visible changed.
    Unchanged,
}

/// A viewer's visible alert list: filtered, newest first by
/// `triggered_at`, at most one entry per id, truncated to the page limit.
#[derive(Debug, Clone)]
pub struct AlertView {
    filter: ViewFilter,
    items: Vec<Alert>,
}

impl AlertView {
    pub fn new(filter: ViewFilter) -> Self {
        Self {
            filter,
            items: Vec::new(),
        }
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    pub fn items(&self) -> &[Alert] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.items.iter().find(|a| a.id == id)
    }

    /// Replaces the list with a freshly fetched page. Rows the local filter
    /// rejects are dropped so the list agrees with [`AlertView::apply`].
    pub fn reset(&mut self, alerts: Vec<Alert>) {
        self.items.clear();
        let matching: Vec<Alert> = alerts
            .into_iter()
            .filter(|a| self.filter.matches(a))
            .collect();
        for alert in matching {
            self.upsert(alert);
        }
        self.items.truncate(self.filter.page_limit());
    }

    /// Applies one feed event. Inserts and updates are handled alike:
    /// the record replaces any entry with the same id.
    pub fn apply(&mut self, change: &AlertChange) -> ViewChange {
        let record = change.record();
        let was_visible = self.remove(&record.id);

        if !self.filter.matches(record) {
            return if was_visible {
                ViewChange::Removed
            } else {
                ViewChange::Unchanged
            };
        }

        self.upsert(record.clone());
        let limit = self.filter.page_limit();
        self.items.truncate(limit);
        match (was_visible, self.get(&record.id).is_some()) {
            (true, true) => ViewChange::Replaced,
            (true, false) => ViewChange::Removed,
            (false, true) => ViewChange::Added,
            (false, false) => ViewChange::Unchanged,
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|a| a.id != id);
        self.items.len() != before
    }

    /// Inserts at the position that keeps the list newest first; ties keep
    /// the newer arrival in front.
    fn upsert(&mut self, alert: Alert) {
        self.remove(&alert.id);
        let pos = self
            .items
            .iter()
            .position(|a| a.triggered_at <= alert.triggered_at)
            .unwrap_or(self.items.len());
        self.items.insert(pos, alert);
    }
}
