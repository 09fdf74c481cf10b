// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::seen::SeenSet;
use super::store::StateStore;
use super::{Decision, STATE_MODELS};
use crate::modules::database::manager::DatabaseManager;

const MAILBOX: &str = "reader@example.com@imap.example.com/INBOX";

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_seen_set_evicts_least_recently_added() {
    let mut seen = SeenSet::new(3);
    assert!(seen.insert("a".into()));
    assert!(seen.insert("b".into()));
    assert!(seen.insert("c".into()));
    assert!(!seen.insert("a".into()));
    assert!(seen.insert("d".into()));

    assert!(!seen.contains("a"));
    assert!(seen.contains("b"));
    assert!(seen.contains("d"));
    assert_eq!(seen.to_persisted(), ids(&["b", "c", "d"]));
}

#[test]
fn test_seen_set_restores_within_capacity() {
    let seen = SeenSet::from_persisted(ids(&["a", "b", "c", "d"]), 2);
    assert_eq!(seen.len(), 2);
    assert!(seen.contains("c"));
    assert!(seen.contains("d"));
}

#[tokio::test]
async fn test_marker_never_moves_backwards() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    let mut store = StateStore::load(db, MAILBOX, 100).await.unwrap();
    store.rebase(7);

    store.record(&ids(&["uid:7:10"]), 10, Decision::Accepted);
    store.record(&ids(&["uid:7:4"]), 4, Decision::Rejected);
    assert_eq!(store.marker(), 10);

    let state = store.state();
    assert_eq!(state.processed, 2);
    assert_eq!(state.accepted, 1);
    assert_eq!(state.rejected, 1);
}

#[tokio::test]
async fn test_checkpoint_survives_reload() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    {
        let mut store = StateStore::load(db.clone(), MAILBOX, 100).await.unwrap();
        store.rebase(7);
        store.record(&ids(&["uid:7:1", "mid:a@example.com"]), 1, Decision::Accepted);
        store.record(&ids(&["uid:7:2"]), 2, Decision::Skipped);
        store.record_failure(&ids(&["uid:7:3"]), 3, "fetch timed out");
        store.checkpoint().await.unwrap();

        // not checkpointed, lost on "crash"
        store.record(&ids(&["uid:7:4"]), 4, Decision::Accepted);
    }

    let store = StateStore::load(db, MAILBOX, 100).await.unwrap();
    assert_eq!(store.marker(), 3);
    assert_eq!(store.uid_validity(), Some(7));
    assert!(store.has_seen("mid:a@example.com"));
    assert!(store.has_seen("uid:7:3"));
    assert!(!store.has_seen("uid:7:4"));

    let state = store.state();
    assert_eq!(state.processed, 1);
    assert_eq!(state.failed, 1);
    assert_eq!(state.recent_failures.len(), 1);
    assert_eq!(state.recent_failures[0].id, "uid:7:3");
}

#[tokio::test]
async fn test_uid_validity_change_restarts_cursor_but_keeps_message_ids() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    let mut store = StateStore::load(db, MAILBOX, 100).await.unwrap();
    store.rebase(7);
    store.record(&ids(&["uid:7:40", "mid:x@example.com"]), 40, Decision::Accepted);

    store.rebase(7);
    assert_eq!(store.marker(), 40);

    store.rebase(9);
    assert_eq!(store.marker(), 0);
    assert_eq!(store.uid_validity(), Some(9));
    assert!(store.has_seen("mid:x@example.com"));
}

#[tokio::test]
async fn test_reset_forgets_everything() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    let mut store = StateStore::load(db.clone(), MAILBOX, 100).await.unwrap();
    store.rebase(7);
    store.record(&ids(&["uid:7:5"]), 5, Decision::Accepted);
    store.checkpoint().await.unwrap();

    store.reset().await.unwrap();
    assert_eq!(store.marker(), 0);
    assert!(!store.has_seen("uid:7:5"));

    let reloaded = StateStore::load(db, MAILBOX, 100).await.unwrap();
    assert_eq!(reloaded.marker(), 0);
    assert_eq!(reloaded.state().processed, 0);
}

#[tokio::test]
async fn test_seen_capacity_bounds_persisted_set() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    let mut store = StateStore::load(db.clone(), MAILBOX, 3).await.unwrap();
    for uid in 1..=5u32 {
        store.record(&[format!("uid:1:{}", uid)], uid, Decision::Rejected);
    }
    store.checkpoint().await.unwrap();

    let reloaded = StateStore::load(db, MAILBOX, 3).await.unwrap();
    assert_eq!(reloaded.seen_len(), 3);
    assert!(!reloaded.has_seen("uid:1:2"));
    assert!(reloaded.has_seen("uid:1:5"));
    assert_eq!(reloaded.marker(), 5);
}

#[test]
fn test_seen_lookup_does_not_refresh_position() {
    let mut seen = SeenSet::new(2);
    seen.insert("a".into());
    seen.insert("b".into());
    assert!(seen.contains("a"));
    seen.insert("c".into());

    assert!(!seen.contains("a"));
    assert_eq!(seen.to_persisted(), ids(&["b", "c"]));
}

#[tokio::test]
async fn test_fetch_deferrals_persist_until_decided() {
    let db = DatabaseManager::in_memory(&STATE_MODELS).unwrap();
    {
        let mut store = StateStore::load(db.clone(), MAILBOX, 100).await.unwrap();
        store.rebase(7);
        assert_eq!(store.note_deferral("uid:7:3"), 1);
        assert_eq!(store.note_deferral("uid:7:3"), 2);
        assert_eq!(store.note_deferral("uid:7:4"), 1);
        store.checkpoint().await.unwrap();
    }

    let mut store = StateStore::load(db, MAILBOX, 100).await.unwrap();
    assert_eq!(store.note_deferral("uid:7:3"), 3);

    store.record_failure(&ids(&["uid:7:3"]), 3, "connection reset");
    let pending = store.state().pending_fetches;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "uid:7:4");

    // a new UID epoch makes the old keys meaningless
    store.rebase(8);
    assert!(store.state().pending_fetches.is_empty());
}
