//! Unit tests for the `PendingActionStore` backends.
//!
//! Every behaviour is checked against both the `SQLite` repository and
//! the JSON document fallback.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use reorder_gate::models::pending::{
    default_ttl, ActionKind, ActionStatus, BatchLineItem, PendingAction,
};
use reorder_gate::persistence::{db, JsonPendingStore, PendingActionStore, SqlitePendingStore};
use reorder_gate::AppError;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time")
}

fn line(sku: &str, qty: u64) -> BatchLineItem {
    BatchLineItem {
        sku: sku.to_owned(),
        vendor: "Acme".to_owned(),
        quantity: qty,
        total_cost: qty as f64 * 2.5,
        external_ref: Some(format!("page-{sku}")),
    }
}

fn batch(token: &str) -> PendingAction {
    PendingAction::batch(token.to_owned(), vec![line("A", 10), line("B", 4)])
}

async fn sqlite_store() -> Arc<dyn PendingActionStore> {
    let pool = db::connect_memory().await.expect("db");
    Arc::new(SqlitePendingStore::new(Arc::new(pool)))
}

fn json_store(dir: &tempfile::TempDir) -> Arc<dyn PendingActionStore> {
    Arc::new(JsonPendingStore::open(&dir.path().join("pending.json")).expect("json store"))
}

/// Run `check` against both backends.
async fn each_backend<F, Fut>(check: F)
where
    F: Fn(Arc<dyn PendingActionStore>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    check(sqlite_store().await).await;
    let dir = tempfile::tempdir().expect("tempdir");
    check(json_store(&dir)).await;
}

#[tokio::test]
async fn store_then_fetch_round_trips_fields() {
    each_backend(|store| async move {
        let stored = store.store(batch("tok-1"), default_ttl(), t0()).await.expect("store");
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.expires_at, t0() + Duration::hours(24));
        assert_eq!(stored.status, ActionStatus::Pending);
        assert_eq!(stored.attempts, 0);

        let fetched = store
            .fetch_active("tok-1", t0() + Duration::minutes(5))
            .await
            .expect("fetch")
            .expect("active");
        assert_eq!(fetched, stored, "backend {}", store.backend());
        assert_eq!(fetched.kind, ActionKind::BatchReorder);
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.quantity, 14);
    })
    .await;
}

#[tokio::test]
async fn expiry_boundary_is_exclusive() {
    each_backend(|store| async move {
        store.store(batch("tok-exp"), default_ttl(), t0()).await.expect("store");
        let expires = t0() + default_ttl();

        let before = store
            .fetch_active("tok-exp", expires - Duration::nanoseconds(1))
            .await
            .expect("fetch");
        assert!(before.is_some(), "backend {}", store.backend());

        let at = store.fetch_active("tok-exp", expires).await.expect("fetch");
        assert!(at.is_none(), "backend {}", store.backend());
    })
    .await;
}

#[tokio::test]
async fn unknown_token_is_absent() {
    each_backend(|store| async move {
        assert!(store.fetch_active("nope", t0()).await.expect("fetch").is_none());
        assert!(store.lookup("nope").await.expect("lookup").is_none());
        assert!(store.claim("nope", t0()).await.expect("claim").is_none());
    })
    .await;
}

#[tokio::test]
async fn transition_hides_action_from_fetch_but_not_lookup() {
    each_backend(|store| async move {
        store.store(batch("tok-t"), default_ttl(), t0()).await.expect("store");
        store
            .transition("tok-t", ActionStatus::Rejected)
            .await
            .expect("transition");

        assert!(store.fetch_active("tok-t", t0()).await.expect("fetch").is_none());
        let raw = store.lookup("tok-t").await.expect("lookup").expect("exists");
        assert_eq!(raw.status, ActionStatus::Rejected);

        // Unknown tokens are accepted silently.
        store
            .transition("missing", ActionStatus::Approved)
            .await
            .expect("no existence check");
    })
    .await;
}

#[tokio::test]
async fn claim_succeeds_once() {
    each_backend(|store| async move {
        store.store(batch("tok-c"), default_ttl(), t0()).await.expect("store");

        let first = store.claim("tok-c", t0()).await.expect("claim");
        let claimed = first.expect("first claim wins");
        assert_eq!(claimed.status, ActionStatus::InProgress);
        assert_eq!(claimed.attempts, 1);

        let second = store.claim("tok-c", t0()).await.expect("claim");
        assert!(second.is_none(), "backend {}", store.backend());
        assert!(store.fetch_active("tok-c", t0()).await.expect("fetch").is_none());
    })
    .await;
}

#[tokio::test]
async fn claim_rejects_expired_action() {
    each_backend(|store| async move {
        store.store(batch("tok-old"), default_ttl(), t0()).await.expect("store");
        let late = t0() + default_ttl() + Duration::seconds(1);
        assert!(store.claim("tok-old", late).await.expect("claim").is_none());
    })
    .await;
}

#[tokio::test]
async fn release_allows_retry_until_attempts_run_out() {
    each_backend(|store| async move {
        store.store(batch("tok-r"), default_ttl(), t0()).await.expect("store");

        store.claim("tok-r", t0()).await.expect("claim").expect("claimed");
        let status = store.release("tok-r", 2).await.expect("release");
        assert_eq!(status, ActionStatus::Pending);
        assert!(store.fetch_active("tok-r", t0()).await.expect("fetch").is_some());

        let again = store.claim("tok-r", t0()).await.expect("claim").expect("claimed");
        assert_eq!(again.attempts, 2);
        let status = store.release("tok-r", 2).await.expect("release");
        assert_eq!(status, ActionStatus::Failed);
        assert!(store.fetch_active("tok-r", t0()).await.expect("fetch").is_none());
    })
    .await;
}

#[tokio::test]
async fn release_of_unclaimed_action_is_not_found() {
    each_backend(|store| async move {
        store.store(batch("tok-u"), default_ttl(), t0()).await.expect("store");
        let err = store.release("tok-u", 2).await.expect_err("not claimed");
        assert!(matches!(err, AppError::NotFound(_)));
    })
    .await;
}

#[tokio::test]
async fn store_replaces_existing_token() {
    each_backend(|store| async move {
        store.store(batch("tok-dup"), default_ttl(), t0()).await.expect("store");
        store
            .transition("tok-dup", ActionStatus::Approved)
            .await
            .expect("transition");

        let later = t0() + Duration::hours(1);
        let replacement = PendingAction::batch("tok-dup".to_owned(), vec![line("C", 1)]);
        store.store(replacement, default_ttl(), later).await.expect("replace");

        let active = store
            .fetch_active("tok-dup", later)
            .await
            .expect("fetch")
            .expect("active again");
        assert_eq!(active.items.len(), 1);
        assert_eq!(active.items[0].sku, "C");
        assert_eq!(active.created_at, later);
    })
    .await;
}

#[tokio::test]
async fn purge_removes_only_expired_actions() {
    each_backend(|store| async move {
        store.store(batch("old"), Duration::hours(1), t0()).await.expect("store");
        store.store(batch("fresh"), default_ttl(), t0()).await.expect("store");

        let removed = store
            .purge_expired(t0() + Duration::hours(2))
            .await
            .expect("purge");
        assert_eq!(removed, 1, "backend {}", store.backend());
        assert!(store.lookup("old").await.expect("lookup").is_none());
        assert!(store.lookup("fresh").await.expect("lookup").is_some());
    })
    .await;
}

#[tokio::test]
async fn json_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pending.json");

    {
        let store = JsonPendingStore::open(&path).expect("open");
        store.store(batch("persist"), default_ttl(), t0()).await.expect("store");
    }

    let reopened = JsonPendingStore::open(&path).expect("reopen");
    let action = reopened
        .fetch_active("persist", t0())
        .await
        .expect("fetch")
        .expect("persisted");
    assert_eq!(action.items.len(), 2);
}

#[tokio::test]
async fn json_handles_on_one_file_see_each_others_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pending.json");
    let server = JsonPendingStore::open(&path).expect("server handle");
    let pruner = JsonPendingStore::open(&path).expect("pruner handle");

    server.store(batch("old"), default_ttl(), t0()).await.expect("store old");
    let later = t0() + Duration::hours(30);
    pruner.store(batch("new"), default_ttl(), later).await.expect("store new");
    assert!(server.fetch_active("new", later).await.expect("fetch").is_some());

    assert_eq!(pruner.purge_expired(later).await.expect("purge"), 1);

    // A later write from the other handle must not resurrect the purged
    // action or drop the one it never stored itself.
    server.transition("new", ActionStatus::Rejected).await.expect("transition");
    let reopened = JsonPendingStore::open(&path).expect("reopen");
    assert!(reopened.lookup("old").await.expect("lookup").is_none());
    let new = reopened.lookup("new").await.expect("lookup").expect("kept");
    assert_eq!(new.status, ActionStatus::Rejected);
}

#[tokio::test]
async fn sqlite_store_survives_reconnect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data").join("pending.db");

    {
        let pool = db::connect(&path).await.expect("connect");
        let store = SqlitePendingStore::new(Arc::new(pool.clone()));
        store.store(batch("persist"), default_ttl(), t0()).await.expect("store");
        pool.close().await;
    }

    let pool = db::connect(&path).await.expect("reconnect");
    let store = SqlitePendingStore::new(Arc::new(pool));
    assert!(store.fetch_active("persist", t0()).await.expect("fetch").is_some());
}
