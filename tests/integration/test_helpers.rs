//! Shared test helpers for workflow, cycle and HTTP integration tests.
//!
//! Provides an in-memory `SQLite` store, a temp-dir outbox and recording
//! collaborators so individual test modules can focus on behaviour.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use reorder_gate::actions::{ActionEntry, ActionEvent, ActionLog, JsonlActionLog};
use reorder_gate::collaborators::snapshot::Snapshot;
use reorder_gate::collaborators::{
    ApprovalNotifier, CallFuture, Collaborators, InventorySource, OrderConfirmation, OrderStatus,
    PageStatusUpdater, SheetStatusUpdate, SheetStatusUpdater, SnapshotSource, Supplier,
};
use reorder_gate::config::GlobalConfig;
use reorder_gate::models::decision::ReorderDecision;
use reorder_gate::models::pending::{
    default_ttl, ActionStatus, BatchLineItem, PendingAction,
};
use reorder_gate::orchestrator::ReorderCycle;
use reorder_gate::outbox::writer::JsonlOutboxWriter;
use reorder_gate::outbox::RecomputeOutbox;
use reorder_gate::persistence::{db, PendingActionStore, SqlitePendingStore, StoreFuture};
use reorder_gate::workflow::{ApprovalWorkflow, WorkflowSettings};
use reorder_gate::AppError;

/// Shared secret configured for every harness.
pub const SECRET: &str = "test-secret";

/// Minimal `GlobalConfig` rooted at `data_dir`.
pub fn test_config(data_dir: &str) -> GlobalConfig {
    let toml = format!(
        r#"
data_dir = '{root}'
http_port = 0
webhook_base_url = "http://reorder.test/"
approval_recipient = "buyer@example.com"

[timeouts]
collaborator_seconds = 2
cycle_interval_seconds = 60
"#,
        root = data_dir.replace('\\', "\\\\"),
    );
    let mut config = GlobalConfig::from_toml_str(&toml).expect("valid test config");
    config.webhook_secret = SECRET.to_owned();
    config
}

// ── Recording collaborators ──────────────────────────────────

/// Supplier that fails for selected SKUs and counts calls.
#[derive(Default)]
pub struct FakeSupplier {
    failing: HashSet<String>,
    calls: AtomicUsize,
    orders: Mutex<Vec<(String, String, u64)>>,
}

impl FakeSupplier {
    pub fn failing(skus: &[&str]) -> Self {
        Self {
            failing: skus.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successful orders as `(vendor, sku, quantity)`.
    pub fn orders(&self) -> Vec<(String, String, u64)> {
        self.orders.lock().expect("lock").clone()
    }
}

impl Supplier for FakeSupplier {
    fn place_order(
        &self,
        vendor: &str,
        sku: &str,
        quantity: u64,
    ) -> CallFuture<'_, OrderConfirmation> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let vendor = vendor.to_owned();
        let sku = sku.to_owned();
        Box::pin(async move {
            if self.failing.contains(&sku) {
                return Err(AppError::Downstream(format!("supplier refused {sku}")));
            }
            self.orders
                .lock()
                .expect("lock")
                .push((vendor, sku.clone(), quantity));
            Ok(OrderConfirmation {
                order_id: format!("PO-{n}"),
                delivery_date: None,
            })
        })
    }
}

/// Page updater recording every status change.
#[derive(Default)]
pub struct RecordingPages {
    pub updates: Mutex<Vec<(String, OrderStatus, BTreeMap<String, String>)>>,
}

impl PageStatusUpdater for RecordingPages {
    fn upsert_reorder_page(&self, decision: &ReorderDecision) -> CallFuture<'_, String> {
        let page_ref = format!("page-{}", decision.sku);
        Box::pin(async move { Ok(page_ref) })
    }

    fn update_page_status(
        &self,
        page_ref: &str,
        status: OrderStatus,
        fields: BTreeMap<String, String>,
    ) -> CallFuture<'_, ()> {
        let page_ref = page_ref.to_owned();
        Box::pin(async move {
            self.updates
                .lock()
                .expect("lock")
                .push((page_ref, status, fields));
            Ok(())
        })
    }
}

/// Sheet updater recording every row update.
#[derive(Default)]
pub struct RecordingSheets {
    pub updates: Mutex<Vec<SheetStatusUpdate>>,
}

impl RecordingSheets {
    /// Statuses recorded for `sku`, in order.
    pub fn statuses(&self, sku: &str) -> Vec<OrderStatus> {
        self.updates
            .lock()
            .expect("lock")
            .iter()
            .filter(|u| u.sku == sku)
            .map(|u| u.status)
            .collect()
    }
}

impl SheetStatusUpdater for RecordingSheets {
    fn update_sheet_status(&self, update: SheetStatusUpdate) -> CallFuture<'_, ()> {
        Box::pin(async move {
            self.updates.lock().expect("lock").push(update);
            Ok(())
        })
    }
}

/// A recorded approval notification.
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub token: String,
    pub items: usize,
    pub approve_url: String,
    pub reject_url: String,
}

/// Notifier recording each request.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentNotification>>,
}

impl ApprovalNotifier for RecordingNotifier {
    fn notify_approval_required(
        &self,
        recipient: &str,
        request: &PendingAction,
        approve_url: &str,
        reject_url: &str,
    ) -> CallFuture<'_, String> {
        let sent = SentNotification {
            recipient: recipient.to_owned(),
            token: request.token.clone(),
            items: request.lines().len(),
            approve_url: approve_url.to_owned(),
            reject_url: reject_url.to_owned(),
        };
        Box::pin(async move {
            self.sent.lock().expect("lock").push(sent);
            Ok("msg-1".to_owned())
        })
    }
}

// ── Harness ──────────────────────────────────────────────────

/// Fully wired workflow and cycle over recording collaborators.
pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub config: Arc<GlobalConfig>,
    pub store: Arc<dyn PendingActionStore>,
    pub outbox: Arc<JsonlOutboxWriter>,
    pub actions: Arc<JsonlActionLog>,
    pub supplier: Arc<FakeSupplier>,
    pub pages: Arc<RecordingPages>,
    pub sheets: Arc<RecordingSheets>,
    pub notifier: Arc<RecordingNotifier>,
    pub workflow: Arc<ApprovalWorkflow>,
    pub cycle: Arc<ReorderCycle>,
}

impl Harness {
    /// Harness with an empty inventory source.
    pub async fn new(failing: &[&str]) -> Self {
        Self::with_snapshot(Snapshot::default(), failing).await
    }

    /// Harness whose inventory source serves `snapshot`.
    pub async fn with_snapshot(snapshot: Snapshot, failing: &[&str]) -> Self {
        Self::build(snapshot, failing, |_| {}).await
    }

    /// Harness with a config tweak applied before wiring.
    pub async fn build(
        snapshot: Snapshot,
        failing: &[&str],
        tweak: impl FnOnce(&mut GlobalConfig),
    ) -> Self {
        Self::assemble(Arc::new(SnapshotSource::new(snapshot)), failing, tweak, |s| s).await
    }

    /// Harness reading inventory from `inventory`.
    pub async fn with_inventory(inventory: Arc<dyn InventorySource>, failing: &[&str]) -> Self {
        Self::assemble(inventory, failing, |_| {}, |s| s).await
    }

    /// Harness whose store is wrapped by `wrap_store` before wiring.
    pub async fn with_store(
        failing: &[&str],
        wrap_store: impl FnOnce(Arc<dyn PendingActionStore>) -> Arc<dyn PendingActionStore>,
    ) -> Self {
        Self::assemble(Arc::new(SnapshotSource::empty()), failing, |_| {}, wrap_store).await
    }

    async fn assemble(
        inventory: Arc<dyn InventorySource>,
        failing: &[&str],
        tweak: impl FnOnce(&mut GlobalConfig),
        wrap_store: impl FnOnce(Arc<dyn PendingActionStore>) -> Arc<dyn PendingActionStore>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(dir.path().to_str().expect("utf8 path"));
        tweak(&mut config);
        let config = Arc::new(config);

        let pool = db::connect_memory().await.expect("db");
        let store = wrap_store(Arc::new(SqlitePendingStore::new(Arc::new(pool))));
        let outbox = Arc::new(JsonlOutboxWriter::new(config.outbox_dir()).expect("outbox"));
        let actions = Arc::new(JsonlActionLog::new(config.actions_dir()).expect("action log"));

        let supplier = Arc::new(FakeSupplier::failing(failing));
        let pages = Arc::new(RecordingPages::default());
        let sheets = Arc::new(RecordingSheets::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let collaborators = Collaborators {
            inventory,
            supplier: Arc::clone(&supplier) as Arc<dyn Supplier>,
            pages: Arc::clone(&pages) as Arc<dyn PageStatusUpdater>,
            sheets: Arc::clone(&sheets) as Arc<dyn SheetStatusUpdater>,
            notifier: Arc::clone(&notifier) as Arc<dyn ApprovalNotifier>,
        };

        let workflow = Arc::new(ApprovalWorkflow::new(
            WorkflowSettings::from_config(&config),
            Arc::clone(&store),
            collaborators.clone(),
            Arc::clone(&outbox) as Arc<dyn RecomputeOutbox>,
            Arc::clone(&actions) as Arc<dyn ActionLog>,
        ));
        let cycle = Arc::new(ReorderCycle::new(
            Arc::clone(&config),
            Arc::clone(&workflow),
            collaborators,
            Arc::clone(&outbox) as Arc<dyn RecomputeOutbox>,
            Arc::clone(&actions) as Arc<dyn ActionLog>,
        ));

        Self {
            _dir: dir,
            config,
            store,
            outbox,
            actions,
            supplier,
            pages,
            sheets,
            notifier,
            workflow,
            cycle,
        }
    }

    /// Store a single-SKU action and return its stored form.
    pub async fn submit_single(&self, token: &str, sku: &str, now: DateTime<Utc>) -> PendingAction {
        self.workflow
            .submit(single_action(token, sku), now)
            .await
            .expect("submit single")
    }

    /// Store a batch action over `skus` and return its stored form.
    pub async fn submit_batch(&self, token: &str, skus: &[&str], now: DateTime<Utc>) -> PendingAction {
        let items = skus.iter().map(|s| line(s)).collect();
        self.workflow
            .submit(PendingAction::batch(token.to_owned(), items), now)
            .await
            .expect("submit batch")
    }

    /// Action log entries recorded today, in write order.
    pub fn recorded(&self) -> Vec<ActionEntry> {
        self.actions
            .read_day(Utc::now().date_naive())
            .expect("read action log")
    }

    /// Recorded `(event, sku)` pairs, in write order.
    pub fn recorded_events(&self) -> Vec<(ActionEvent, String)> {
        self.recorded()
            .into_iter()
            .map(|e| (e.event, e.sku))
            .collect()
    }

    /// Raw stored status of `token`.
    pub async fn status_of(&self, token: &str) -> ActionStatus {
        self.store
            .lookup(token)
            .await
            .expect("lookup")
            .expect("token exists")
            .status
    }
}

// ── Store wrapper ────────────────────────────────────────────

/// Store whose `release` always fails; everything else is delegated.
pub struct ReleaseFailingStore {
    inner: Arc<dyn PendingActionStore>,
}

impl ReleaseFailingStore {
    pub fn wrap(inner: Arc<dyn PendingActionStore>) -> Arc<dyn PendingActionStore> {
        Arc::new(Self { inner })
    }
}

impl PendingActionStore for ReleaseFailingStore {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    fn store(
        &self,
        action: PendingAction,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PendingAction> {
        self.inner.store(action, ttl, now)
    }

    fn fetch_active(&self, token: &str, now: DateTime<Utc>) -> StoreFuture<'_, Option<PendingAction>> {
        self.inner.fetch_active(token, now)
    }

    fn transition(&self, token: &str, status: ActionStatus) -> StoreFuture<'_, ()> {
        self.inner.transition(token, status)
    }

    fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreFuture<'_, Option<PendingAction>> {
        self.inner.claim(token, now)
    }

    fn release(&self, _token: &str, _max_attempts: u32) -> StoreFuture<'_, ActionStatus> {
        Box::pin(async { Err(AppError::Db("store went away".to_owned())) })
    }

    fn lookup(&self, token: &str) -> StoreFuture<'_, Option<PendingAction>> {
        self.inner.lookup(token)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64> {
        self.inner.purge_expired(now)
    }
}

/// Batch line ordering 10 units of `sku` from Acme.
pub fn line(sku: &str) -> BatchLineItem {
    BatchLineItem {
        sku: sku.to_owned(),
        vendor: "Acme".to_owned(),
        quantity: 10,
        total_cost: 100.0,
        external_ref: Some(format!("page-{sku}")),
    }
}

/// Single-SKU action ordering 10 units of `sku` from Acme.
pub fn single_action(token: &str, sku: &str) -> PendingAction {
    PendingAction::single(token.to_owned(), line(sku), format!("{sku} below reorder point"))
}

/// Instant just past the default lifetime of an action stored at `now`.
pub fn after_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + default_ttl() + Duration::seconds(1)
}
