//! Integration tests for the stockroom-engine crate.
//!
//! Exercise the allocation properties — FIFO order, conservation,
//! best-effort under-fulfillment, retention idempotence, and the
//! statistic windows — against an on-disk SQLite database.

use chrono::{DateTime, Duration, Utc};
use stockroom_engine::InventoryEngine;
use stockroom_store::{Database, InventoryStore};

const FMT: &str = "email|emailpass|login|pass|reftoken|clientid";

fn at(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap()
}

async fn setup() -> (InventoryEngine, InventoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_and_migrate(dir.path().join("test.db"))
        .await
        .unwrap();
    let store = InventoryStore::new(db);
    let engine = InventoryEngine::new(store.clone());
    engine.create_category("US", at(0)).await.unwrap();
    engine.register_format(FMT).await.unwrap();
    (engine, store, dir)
}

// ═══════════════════════════════════════════════════════════════════════
//  FIFO allocation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn withdraw_returns_oldest_k_in_order_and_leaves_the_rest() {
    let (engine, _store, _dir) = setup().await;

    // A1..A5 inserted at increasing timestamps.
    for (i, name) in ["A1", "A2", "A3", "A4", "A5"].iter().enumerate() {
        engine
            .add_batch("US", vec![name.to_string()], FMT, at(100 + i as i64))
            .await
            .unwrap();
    }

    let got = engine.withdraw("US", 3, at(1_000)).await.unwrap();
    assert_eq!(got, vec!["A1", "A2", "A3"]);

    // The remainder comes out in the same order on the next call.
    let rest = engine.withdraw("US", 10, at(1_001)).await.unwrap();
    assert_eq!(rest, vec!["A4", "A5"]);
}

#[tokio::test]
async fn withdraw_is_fifo_for_identical_timestamps() {
    let (engine, _store, _dir) = setup().await;

    // One batch: all five accounts share a timestamp, so ordering
    // falls back to insertion id.
    engine
        .add_batch(
            "US",
            vec!["B1".into(), "B2".into(), "B3".into(), "B4".into(), "B5".into()],
            FMT,
            at(100),
        )
        .await
        .unwrap();

    let first = engine.withdraw("US", 2, at(200)).await.unwrap();
    let second = engine.withdraw("US", 3, at(201)).await.unwrap();
    assert_eq!(first, vec!["B1", "B2"]);
    assert_eq!(second, vec!["B3", "B4", "B5"]);
}

// ═══════════════════════════════════════════════════════════════════════
//  Conservation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn withdrawal_conserves_accounts() {
    let (engine, store, _dir) = setup().await;

    engine
        .add_batch(
            "US",
            (0..7).map(|i| format!("acc{i}")).collect(),
            FMT,
            at(100),
        )
        .await
        .unwrap();

    let active_before = store.count_active().await.unwrap();
    let history_before = store.count_history().await.unwrap();

    let withdrawn = engine.withdraw("US", 4, at(200)).await.unwrap();

    let active_after = store.count_active().await.unwrap();
    let history_after = store.count_history().await.unwrap();

    assert_eq!(active_before, active_after + withdrawn.len() as i64);
    assert_eq!(history_after, history_before + withdrawn.len() as i64);
}

// ═══════════════════════════════════════════════════════════════════════
//  Under-fulfillment and empty categories
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn withdraw_more_than_stocked_returns_all_without_error() {
    let (engine, store, _dir) = setup().await;

    engine
        .add_batch("US", vec!["x1".into(), "x2".into()], FMT, at(100))
        .await
        .unwrap();

    let got = engine.withdraw("US", 10, at(200)).await.unwrap();
    assert_eq!(got, vec!["x1", "x2"]);
    assert_eq!(store.count_active().await.unwrap(), 0);
}

#[tokio::test]
async fn withdraw_from_empty_category_returns_empty() {
    let (engine, _store, _dir) = setup().await;

    let got = engine.withdraw("US", 5, at(100)).await.unwrap();
    assert!(got.is_empty());

    // Unknown categories behave like empty ones.
    let got = engine.withdraw("ZZ", 5, at(100)).await.unwrap();
    assert!(got.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
//  Retention
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn retention_sweep_is_idempotent() {
    let (engine, store, _dir) = setup().await;

    let now = at(100 * 86_400);

    // One withdrawal 5 days ago (expired), one an hour ago (kept).
    engine
        .add_batch("US", vec!["old".into()], FMT, now - Duration::days(6))
        .await
        .unwrap();
    engine
        .withdraw("US", 1, now - Duration::days(5))
        .await
        .unwrap();
    engine
        .add_batch("US", vec!["new".into()], FMT, now - Duration::hours(2))
        .await
        .unwrap();
    engine
        .withdraw("US", 1, now - Duration::hours(1))
        .await
        .unwrap();

    let removed = engine.retention_sweep(now).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count_history().await.unwrap(), 1);

    // Second sweep with no new history changes nothing.
    let removed = engine.retention_sweep(now).await.unwrap();
    assert_eq!(removed, 0);
    assert_eq!(store.count_history().await.unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Statistic windows
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn recent_account_counts_toward_all_windows() {
    let (engine, _store, _dir) = setup().await;

    let now = at(100 * 86_400);
    engine
        .add_batch("US", vec!["fresh".into()], FMT, now - Duration::hours(2))
        .await
        .unwrap();

    let stats = engine.statistics(now).await.unwrap();
    assert_eq!(stats.added.day, 1);
    assert_eq!(stats.added.week, 1);
    assert_eq!(stats.added.month, 1);
}

#[tokio::test]
async fn ancient_account_counts_toward_no_window() {
    let (engine, _store, _dir) = setup().await;

    let now = at(100 * 86_400);
    engine
        .add_batch("US", vec!["stale".into()], FMT, now - Duration::days(40))
        .await
        .unwrap();

    let stats = engine.statistics(now).await.unwrap();
    assert_eq!(stats.added.day, 0);
    assert_eq!(stats.added.week, 0);
    assert_eq!(stats.added.month, 0);
}

#[tokio::test]
async fn withdrawn_accounts_count_in_retrieved_windows() {
    let (engine, _store, _dir) = setup().await;

    let now = at(100 * 86_400);
    engine
        .add_batch("US", vec!["a".into(), "b".into()], FMT, now - Duration::days(10))
        .await
        .unwrap();
    engine
        .withdraw("US", 1, now - Duration::days(8))
        .await
        .unwrap();
    engine
        .withdraw("US", 1, now - Duration::hours(3))
        .await
        .unwrap();

    let stats = engine.statistics(now).await.unwrap();
    // One withdrawal 8 days ago: month only. One 3 hours ago: all.
    assert_eq!(stats.retrieved.day, 1);
    assert_eq!(stats.retrieved.week, 1);
    assert_eq!(stats.retrieved.month, 2);
    // The two accounts themselves were added 10 days ago: month only.
    assert_eq!(stats.added.day, 0);
    assert_eq!(stats.added.week, 0);
    // Both left the active table; added windows count active rows only.
    assert_eq!(stats.added.month, 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  History paging
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn history_pages_are_newest_first() {
    let (engine, _store, _dir) = setup().await;

    for i in 0..12 {
        engine
            .add_batch("US", vec![format!("h{i}")], FMT, at(100 + i))
            .await
            .unwrap();
        engine.withdraw("US", 1, at(1_000 + i)).await.unwrap();
    }

    let page1 = engine.history_page("US", 1).await.unwrap();
    assert_eq!(page1.len(), 10);
    assert_eq!(page1.first().map(String::as_str), Some("h11"));

    let page2 = engine.history_page("US", 2).await.unwrap();
    assert_eq!(page2, vec!["h1", "h0"]);
}
