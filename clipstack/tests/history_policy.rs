//! End-to-end history policy: dedup folding, pinning, retention and the
//! count limit interacting across a realistic capture sequence.

use chrono::{Duration, Utc};

use clipstack::history::{AddOutcome, HistoryStore};
use clipstack::interface::Category;
use clipstack::models::ClipboardItem;

fn capture(text: &str) -> ClipboardItem {
    ClipboardItem::from_text(text, "TestApp")
}

#[test]
fn limit_two_keeps_two_newest() {
    let mut history = HistoryStore::new(2, 30);
    history.add_item(capture("A"));
    history.add_item(capture("B"));
    history.add_item(capture("C"));

    let texts: Vec<_> = history
        .filtered(Category::All)
        .into_iter()
        .map(|item| item.plain_text.unwrap())
        .collect();
    assert_eq!(texts, vec!["C", "B"]);
}

#[test]
fn pinned_item_survives_limit_pressure() {
    let mut history = HistoryStore::new(2, 30);
    let a = capture("A");
    let a_id = a.id;
    history.add_item(a);
    history.toggle_pin(&a_id);
    history.add_item(capture("B"));
    history.add_item(capture("C"));

    let texts: Vec<_> = history
        .filtered(Category::All)
        .into_iter()
        .map(|item| item.plain_text.unwrap())
        .collect();
    assert_eq!(texts, vec!["A", "C"]);
}

#[test]
fn expiry_runs_before_limit_enforcement() {
    // An expired item must not count against the limit: with maxItems=2,
    // one expired entry plus two fresh ones leaves both fresh entries.
    let expired = {
        let mut item = capture("stale");
        item.timestamp = Utc::now() - Duration::days(90);
        item
    };
    let mut history = HistoryStore::with_items(
        vec![capture("fresh-1"), capture("fresh-2"), expired],
        2,
        30,
    );

    assert_eq!(history.len(), 2);
    assert!(history
        .items()
        .iter()
        .all(|item| item.plain_text.as_deref() != Some("stale")));

    // And the same ordering holds on the live add path.
    history.add_item(capture("fresh-3"));
    assert_eq!(history.len(), 2);
}

#[test]
fn repeated_copy_folds_instead_of_duplicating() {
    let mut history = HistoryStore::new(10, 30);
    let first = capture("same text");
    let id = first.id;
    history.add_item(first);
    history.add_item(capture("other"));

    for _ in 0..3 {
        let outcome = history.add_item(capture("same text"));
        assert_eq!(outcome, AddOutcome::Folded);
    }

    assert_eq!(history.len(), 2);
    let front = &history.items()[0];
    assert_eq!(front.id, id);
    assert_eq!(front.use_count, 3);
}

#[test]
fn clear_then_repin_cycle() {
    let mut history = HistoryStore::new(10, 30);
    let keeper = capture("keeper");
    let keeper_id = keeper.id;
    history.add_item(keeper);
    history.add_item(capture("ephemeral-1"));
    history.add_item(capture("ephemeral-2"));
    history.toggle_pin(&keeper_id);

    history.clear_history();
    assert_eq!(history.len(), 1);

    // Unpin and clear again: now nothing survives.
    history.toggle_pin(&keeper_id);
    history.clear_history();
    assert!(history.is_empty());
}

#[test]
fn category_views_are_disjoint_projections() {
    let mut history = HistoryStore::new(20, 30);
    history.add_item(capture("plain thought"));
    history.add_item(capture("https://docs.rs/tokio"));
    history.add_item(capture("let total = 0;"));
    history.add_item(ClipboardItem::from_image(vec![1, 2, 3], "Preview"));
    history.add_item(ClipboardItem::from_file(
        "file:///tmp/report.pdf",
        "/tmp/report.pdf",
        "Finder",
    ));

    assert_eq!(history.filtered(Category::All).len(), 5);
    assert_eq!(history.filtered(Category::Text).len(), 1);
    assert_eq!(history.filtered(Category::Link).len(), 1);
    assert_eq!(history.filtered(Category::Code).len(), 1);
    assert_eq!(history.filtered(Category::Image).len(), 1);
    assert_eq!(history.filtered(Category::File).len(), 1);
}
