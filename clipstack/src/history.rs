//! In-memory clipboard history with dedup, pinning, retention and a count
//! limit.
//!
//! The store itself is a plain data structure; `ClipboardService` serializes
//! access to it. Items sit in recency order (front = newest touch) with
//! pinned items mixed in; sorted projections put pinned items first.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::interface::Category;
use crate::models::ClipboardItem;

/// What `add_item` did with the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New entry inserted at the front.
    Inserted,
    /// Candidate folded into an existing entry (use count bumped).
    Folded,
}

pub struct HistoryStore {
    items: Vec<ClipboardItem>,
    max_items: usize,
    retention_days: i64,
}

impl HistoryStore {
    pub fn new(max_items: usize, retention_days: i64) -> Self {
        Self {
            items: Vec::new(),
            max_items,
            retention_days,
        }
    }

    /// Seed the store from persisted items, then apply the startup sweep the
    /// same way every add does: expiry first, then the count limit.
    pub fn with_items(items: Vec<ClipboardItem>, max_items: usize, retention_days: i64) -> Self {
        let mut store = Self {
            items,
            max_items,
            retention_days,
        };
        store.sweep_expired(Utc::now());
        store.enforce_limit();
        store
    }

    pub fn set_limits(&mut self, max_items: usize, retention_days: i64) {
        self.max_items = max_items;
        self.retention_days = retention_days;
    }

    /// Add a capture. A duplicate per the dedup predicate folds into the
    /// existing entry: the old entry is removed and an updated copy (bumped
    /// use count, fresh timestamp, the new capture's source app) reinserted
    /// at the front. Expiry then the count limit run after every insert.
    pub fn add_item(&mut self, candidate: ClipboardItem) -> AddOutcome {
        let outcome = match self
            .items
            .iter()
            .position(|existing| existing.is_duplicate_of(&candidate))
        {
            Some(index) => {
                let existing = self.items.remove(index);
                self.items.insert(0, existing.folded_with(&candidate));
                AddOutcome::Folded
            }
            None => {
                self.items.insert(0, candidate);
                AddOutcome::Inserted
            }
        };

        self.sweep_expired(Utc::now());
        self.enforce_limit();
        outcome
    }

    /// Remove an item unconditionally, pinned or not.
    pub fn delete_item(&mut self, id: &Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != *id);
        self.items.len() != before
    }

    /// Flip the pinned flag. Sort position changes only on the next sorted
    /// projection, not here.
    pub fn toggle_pin(&mut self, id: &Uuid) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == *id)?;
        item.is_pinned = !item.is_pinned;
        Some(item.is_pinned)
    }

    /// Bump an item's use count (paste path).
    pub fn touch_use(&mut self, id: &Uuid) -> Option<ClipboardItem> {
        let item = self.items.iter_mut().find(|item| item.id == *id)?;
        item.use_count += 1;
        Some(item.clone())
    }

    /// Remove all unpinned items.
    pub fn clear_history(&mut self) {
        self.items.retain(|item| item.is_pinned);
    }

    /// Replace the whole history (import path).
    pub fn replace_all(&mut self, items: Vec<ClipboardItem>) {
        self.items = items;
        self.sweep_expired(Utc::now());
        self.enforce_limit();
    }

    pub fn get(&self, id: &Uuid) -> Option<&ClipboardItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pinned_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_pinned).count()
    }

    /// Category projection: filter, then stable sort by (pinned desc,
    /// timestamp desc). Pinned items therefore order by recency among
    /// themselves.
    pub fn filtered(&self, category: Category) -> Vec<ClipboardItem> {
        let mut filtered: Vec<ClipboardItem> = self
            .items
            .iter()
            .filter(|item| category.matches(item.content_type))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(b.timestamp.cmp(&a.timestamp))
        });
        filtered
    }

    /// First `n` of the filtered view (menu-bar quick access).
    pub fn recent(&self, category: Category, n: usize) -> Vec<ClipboardItem> {
        let mut items = self.filtered(category);
        items.truncate(n);
        items
    }

    /// Drop unpinned items older than the retention window. Pinned items are
    /// exempt regardless of age.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.retention_days);
        let before = self.items.len();
        self.items
            .retain(|item| item.is_pinned || item.timestamp >= cutoff);
        let removed = before - self.items.len();
        if removed > 0 {
            debug!(removed, days = self.retention_days, "expired history items swept");
        }
        removed
    }

    /// Enforce the count limit. Pinned items are never evicted; if pinned
    /// count alone meets or exceeds the limit, every unpinned item goes.
    /// Otherwise the most recent `max - pinned` unpinned items survive.
    pub fn enforce_limit(&mut self) -> usize {
        let before = self.items.len();
        let pinned_count = self.pinned_count();

        if pinned_count >= self.max_items {
            self.items.retain(|item| item.is_pinned);
        } else if self.items.len() > self.max_items {
            let allowed_unpinned = self.max_items - pinned_count;
            // Unpinned items are already in recency order within `items`;
            // keep the first `allowed_unpinned` of them.
            let mut kept_unpinned = 0;
            self.items.retain(|item| {
                if item.is_pinned {
                    true
                } else if kept_unpinned < allowed_unpinned {
                    kept_unpinned += 1;
                    true
                } else {
                    false
                }
            });
        }

        let removed = before - self.items.len();
        if removed > 0 {
            debug!(removed, max = self.max_items, "count limit enforced");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClipboardItem;

    fn text_item(text: &str) -> ClipboardItem {
        ClipboardItem::from_text(text, "TestApp")
    }

    fn store(max: usize) -> HistoryStore {
        HistoryStore::new(max, 30)
    }

    #[test]
    fn test_insert_order_newest_first() {
        let mut history = store(10);
        history.add_item(text_item("first"));
        history.add_item(text_item("second"));
        assert_eq!(history.items()[0].plain_text.as_deref(), Some("second"));
        assert_eq!(history.items()[1].plain_text.as_deref(), Some("first"));
    }

    #[test]
    fn test_duplicate_folds_into_single_entry() {
        let mut history = store(10);
        let first = text_item("same content");
        let first_id = first.id;
        history.add_item(first);
        history.add_item(text_item("spacer"));

        let second = text_item("same content");
        let outcome = history.add_item(second);

        assert_eq!(outcome, AddOutcome::Folded);
        assert_eq!(history.len(), 2);
        // Folded entry keeps its identity, moves to the front, bumps use.
        assert_eq!(history.items()[0].id, first_id);
        assert_eq!(history.items()[0].use_count, 1);
    }

    #[test]
    fn test_fold_updates_source_app_and_timestamp() {
        let mut history = store(10);
        history.add_item(ClipboardItem::from_text("shared", "Mail"));
        let newer = ClipboardItem::from_text("shared", "Notes");
        let newer_ts = newer.timestamp;
        history.add_item(newer);

        let entry = &history.items()[0];
        assert_eq!(entry.source_app, "Notes");
        assert_eq!(entry.timestamp, newer_ts);
    }

    #[test]
    fn test_different_types_never_fold() {
        let mut history = store(10);
        history.add_item(text_item("/tmp/file"));
        // Same plain text, different content type.
        let mut other = text_item("placeholder");
        other.plain_text = Some("/tmp/file".to_string());
        let outcome = history.add_item(other);
        assert_eq!(outcome, AddOutcome::Inserted);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_count_limit_evicts_oldest_unpinned() {
        // maxItems=2: add A, B, C -> [C, B], A evicted.
        let mut history = store(2);
        history.add_item(text_item("A"));
        history.add_item(text_item("B"));
        history.add_item(text_item("C"));

        let texts: Vec<_> = history
            .items()
            .iter()
            .map(|item| item.plain_text.clone().unwrap())
            .collect();
        assert_eq!(texts, vec!["C", "B"]);
    }

    #[test]
    fn test_pinned_survives_count_limit() {
        // Pin A, add B, C with maxItems=2 -> [A(pinned), C], B evicted.
        let mut history = store(2);
        let a = text_item("A");
        let a_id = a.id;
        history.add_item(a);
        history.toggle_pin(&a_id);
        history.add_item(text_item("B"));
        history.add_item(text_item("C"));

        assert_eq!(history.len(), 2);
        let view = history.filtered(Category::All);
        assert_eq!(view[0].plain_text.as_deref(), Some("A"));
        assert!(view[0].is_pinned);
        assert_eq!(view[1].plain_text.as_deref(), Some("C"));
    }

    #[test]
    fn test_pinned_count_at_limit_drops_all_unpinned() {
        let mut history = store(2);
        for text in ["A", "B"] {
            let item = text_item(text);
            let id = item.id;
            history.add_item(item);
            history.toggle_pin(&id);
        }
        history.add_item(text_item("C"));

        assert_eq!(history.len(), 2);
        assert!(history.items().iter().all(|item| item.is_pinned));
    }

    #[test]
    fn test_limit_floor_never_below_pinned_count() {
        // Seed pre-pinned: pinning through add_item would let the limit
        // evict the still-unpinned newcomer first.
        let items = ["A", "B", "C", "D"]
            .into_iter()
            .map(|text| {
                let mut item = text_item(text);
                item.is_pinned = true;
                item
            })
            .collect();
        let history = HistoryStore::with_items(items, 3, 30);

        // Four pinned items against a limit of three: all pinned retained.
        assert_eq!(history.len(), 4);
        assert_eq!(history.pinned_count(), 4);
    }

    #[test]
    fn test_retention_never_removes_pinned() {
        let old_pinned = {
            let mut item = text_item("ancient pinned");
            item.timestamp = Utc::now() - Duration::days(365);
            item.is_pinned = true;
            item
        };
        let old_unpinned = {
            let mut item = text_item("ancient unpinned");
            item.timestamp = Utc::now() - Duration::days(365);
            item
        };
        // Seed under a wide retention window, then shrink it; going through
        // add_item would sweep the aged items on insert.
        let mut history = HistoryStore::with_items(vec![old_pinned, old_unpinned], 10, 1000);
        assert_eq!(history.len(), 2);
        history.set_limits(10, 30);

        let removed = history.sweep_expired(Utc::now());
        assert_eq!(removed, 1);
        assert_eq!(history.len(), 1);
        assert!(history.items()[0].is_pinned);
    }

    #[test]
    fn test_toggle_pin_is_involutive() {
        let mut history = store(10);
        let item = text_item("pin me");
        let id = item.id;
        history.add_item(item);

        assert_eq!(history.toggle_pin(&id), Some(true));
        assert_eq!(history.toggle_pin(&id), Some(false));
        assert!(!history.items()[0].is_pinned);
    }

    #[test]
    fn test_delete_removes_even_pinned() {
        let mut history = store(10);
        let item = text_item("pinned");
        let id = item.id;
        history.add_item(item);
        history.toggle_pin(&id);

        assert!(history.delete_item(&id));
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear_history_keeps_pinned() {
        let mut history = store(10);
        let keep = text_item("keep");
        let keep_id = keep.id;
        history.add_item(keep);
        history.toggle_pin(&keep_id);
        history.add_item(text_item("drop"));

        history.clear_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.items()[0].id, keep_id);
    }

    #[test]
    fn test_filtered_by_category() {
        let mut history = store(10);
        history.add_item(text_item("plain words"));
        history.add_item(text_item("https://rust-lang.org"));
        history.add_item(text_item("const x = 1;"));

        let links = history.filtered(Category::Link);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].plain_text.as_deref(), Some("https://rust-lang.org"));

        let code = history.filtered(Category::Code);
        assert_eq!(code.len(), 1);

        assert_eq!(history.filtered(Category::All).len(), 3);
    }

    #[test]
    fn test_filtered_sort_pinned_first_then_recency() {
        let mut history = store(10);
        let oldest = text_item("oldest");
        let oldest_id = oldest.id;
        history.add_item(oldest);
        history.add_item(text_item("middle"));
        history.add_item(text_item("newest"));
        history.toggle_pin(&oldest_id);

        let view = history.filtered(Category::All);
        assert_eq!(view[0].id, oldest_id);
        assert_eq!(view[1].plain_text.as_deref(), Some("newest"));
        assert_eq!(view[2].plain_text.as_deref(), Some("middle"));
    }

    #[test]
    fn test_recent_caps_length() {
        let mut history = store(10);
        for i in 0..8 {
            history.add_item(text_item(&format!("item {i}")));
        }
        assert_eq!(history.recent(Category::All, 5).len(), 5);
    }
}
