//! One decision cycle: evaluate every SKU, auto-order what qualifies and
//! collect the rest into a single batch approval request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::actions::{record_or_warn, ActionEntry, ActionEvent, ActionLog};
use crate::collaborators::{
    bounded, Collaborators, OrderConfirmation, OrderStatus, SheetStatusUpdate,
};
use crate::models::decision::ReorderDecision;
use crate::models::inventory::InventoryItem;
use crate::models::pending::{BatchLineItem, PendingAction};
use crate::models::vendor::Vendor;
use crate::outbox::{RecomputeOutbox, RecomputeTask};
use crate::policy::auto_order::AutoOrderEvaluator;
use crate::policy::reorder::ReorderPolicy;
use crate::workflow::ApprovalWorkflow;
use crate::{AppError, GlobalConfig, Result};

/// Totals reported at the end of a cycle.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CycleSummary {
    /// SKUs evaluated (including failures).
    pub processed_skus: usize,
    /// Decisions that recommended a reorder.
    pub reorders_recommended: usize,
    /// Orders placed without approval.
    pub auto_orders_placed: usize,
    /// Lines sent for approval.
    pub approvals_pending: usize,
    /// Token of the batch approval request, if one was created.
    pub approval_token: Option<String>,
    /// Per-SKU or per-step failures.
    pub errors: Vec<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs decision cycles against the configured collaborators.
pub struct ReorderCycle {
    config: Arc<GlobalConfig>,
    policy: ReorderPolicy,
    workflow: Arc<ApprovalWorkflow>,
    collaborators: Collaborators,
    outbox: Arc<dyn RecomputeOutbox>,
    actions: Arc<dyn ActionLog>,
}

impl ReorderCycle {
    /// Assemble a cycle runner.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        workflow: Arc<ApprovalWorkflow>,
        collaborators: Collaborators,
        outbox: Arc<dyn RecomputeOutbox>,
        actions: Arc<dyn ActionLog>,
    ) -> Self {
        let policy = ReorderPolicy::new(config.policy.clone());
        Self {
            config,
            policy,
            workflow,
            collaborators,
            outbox,
            actions,
        }
    }

    /// Execute one cycle.
    ///
    /// With `dry_run` every SKU is evaluated and logged but nothing is
    /// ordered, stored, notified, acknowledged or written to the action log.
    ///
    /// # Errors
    ///
    /// Returns an error only when the inventory source cannot be read;
    /// per-SKU and per-step failures are counted in the summary.
    pub async fn run(&self, dry_run: bool) -> Result<CycleSummary> {
        let span = info_span!("reorder_cycle", dry_run);
        self.run_inner(dry_run).instrument(span).await
    }

    async fn run_inner(&self, dry_run: bool) -> Result<CycleSummary> {
        let started = Instant::now();
        let limit = self.config.timeouts.collaborator();
        let source = &self.collaborators.inventory;
        let mut summary = CycleSummary::default();

        // ── 1. Gather inputs ─────────────────────────────────
        let items = bounded("fetch_inventory", limit, source.fetch_inventory()).await?;
        let window = self.config.policy.transaction_window_days;
        let transactions =
            bounded("fetch_transactions", limit, source.fetch_transactions(window)).await?;
        let vendors = bounded("fetch_vendors", limit, source.fetch_vendors()).await?;
        info!(
            items = items.len(),
            transactions = transactions.len(),
            vendors = vendors.len(),
            "cycle inputs loaded"
        );

        // ── 2. Recompute requests from rejections ────────────
        let recompute = match self.outbox.read_unacknowledged() {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(%err, "failed to read recompute outbox");
                summary.errors.push(err.to_string());
                Vec::new()
            }
        };
        let excluded = excluded_vendors(&recompute);

        // ── 3. Evaluate ──────────────────────────────────────
        let today = Utc::now().date_naive();
        let evaluations = self.policy.evaluate_all_with(
            &items,
            &transactions,
            |item| vendors_for(item, &vendors, &excluded),
            today,
        );
        summary.processed_skus = evaluations.len();

        // ── 4. Auto-order or collect ─────────────────────────
        let mut pending_lines = Vec::new();
        for evaluation in evaluations {
            let decision = match evaluation.outcome {
                Ok(decision) => decision,
                Err(err) => {
                    if !dry_run {
                        self.record(
                            ActionEntry::new(ActionEvent::ProcessError, &evaluation.sku)
                                .with_detail(err.to_string()),
                        );
                    }
                    summary.errors.push(format!("{}: {err}", evaluation.sku));
                    continue;
                }
            };
            info!(sku = %decision.sku, "{}", decision.evidence_summary);
            if !decision.needs_reorder {
                continue;
            }
            summary.reorders_recommended += 1;
            if dry_run {
                continue;
            }

            let page_ref = self.upsert_page(&decision, limit).await;
            let verdict = AutoOrderEvaluator::check(&decision, &self.config.auto_order, dry_run);

            if verdict.auto_approved {
                let entry = |event| {
                    ActionEntry::new(event, &decision.sku).with_order_line(
                        decision.vendor.as_deref().unwrap_or_default(),
                        decision.quantity,
                        decision.order_value,
                    )
                };
                match self.auto_order(&decision, page_ref.as_deref(), limit).await {
                    Ok(order) => {
                        self.record(
                            entry(ActionEvent::AutoOrderPlaced).with_order_id(order.order_id),
                        );
                        summary.auto_orders_placed += 1;
                        continue;
                    }
                    Err(err) => {
                        error!(sku = %decision.sku, %err, "auto-order failed, requesting approval");
                        self.record(entry(ActionEvent::AutoOrderFailed).with_detail(err.to_string()));
                        summary.errors.push(format!("{}: {err}", decision.sku));
                    }
                }
            } else {
                info!(sku = %decision.sku, reason = %verdict.reason, "approval required");
            }

            if let Some(line) = BatchLineItem::from_decision(&decision, page_ref) {
                pending_lines.push(line);
            }
        }

        // ── 5. One batch approval request ────────────────────
        if !pending_lines.is_empty() {
            summary.approvals_pending = pending_lines.len();
            let requested = pending_lines.clone();
            match self.request_approval(pending_lines, limit).await {
                Ok(token) => {
                    for line in &requested {
                        self.record(
                            ActionEntry::new(ActionEvent::ApprovalRequested, &line.sku)
                                .with_order_line(&line.vendor, line.quantity, line.total_cost)
                                .with_token(&token),
                        );
                    }
                    summary.approval_token = Some(token);
                }
                Err(err) => {
                    error!(%err, "failed to request approval");
                    for line in &requested {
                        self.record(
                            ActionEntry::new(ActionEvent::ProcessError, &line.sku)
                                .with_order_line(&line.vendor, line.quantity, line.total_cost)
                                .with_detail(format!("approval request failed: {err}")),
                        );
                    }
                    summary.errors.push(err.to_string());
                }
            }
        }

        // ── 6. Acknowledge consumed recompute requests ───────
        if !dry_run && !recompute.is_empty() {
            let ids: Vec<String> = recompute.iter().map(|t| t.id.clone()).collect();
            if let Err(err) = self.outbox.acknowledge(&ids) {
                warn!(%err, "failed to acknowledge recompute tasks");
                summary.errors.push(err.to_string());
            }
        }

        summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            processed = summary.processed_skus,
            reorders = summary.reorders_recommended,
            auto_orders = summary.auto_orders_placed,
            approvals = summary.approvals_pending,
            errors = summary.errors.len(),
            duration_ms = summary.duration_ms,
            "reorder cycle complete"
        );
        Ok(summary)
    }

    fn record(&self, entry: ActionEntry) {
        record_or_warn(self.actions.as_ref(), entry);
    }

    async fn upsert_page(&self, decision: &ReorderDecision, limit: Duration) -> Option<String> {
        let call = self.collaborators.pages.upsert_reorder_page(decision);
        match bounded("upsert_reorder_page", limit, call).await {
            Ok(page_ref) => Some(page_ref),
            Err(err) => {
                warn!(sku = %decision.sku, %err, "reorder page upsert failed");
                None
            }
        }
    }

    async fn auto_order(
        &self,
        decision: &ReorderDecision,
        page_ref: Option<&str>,
        limit: Duration,
    ) -> Result<OrderConfirmation> {
        let vendor = decision
            .vendor
            .as_deref()
            .ok_or_else(|| AppError::Input(format!("{} has no vendor", decision.sku)))?;
        let call = self
            .collaborators
            .supplier
            .place_order(vendor, &decision.sku, decision.quantity);
        let order = bounded("place_order", limit, call).await?;
        info!(sku = %decision.sku, %vendor, order_id = %order.order_id, "auto-order placed");

        if let Some(page_ref) = page_ref {
            let mut fields = std::collections::BTreeMap::new();
            fields.insert("order_id".to_owned(), order.order_id.clone());
            let call = self
                .collaborators
                .pages
                .update_page_status(page_ref, OrderStatus::AutoOrdered, fields);
            if let Err(err) = bounded("update_page_status", limit, call).await {
                warn!(sku = %decision.sku, %err, "page status update failed");
            }
        }

        let call = self.collaborators.sheets.update_sheet_status(SheetStatusUpdate {
            sku: decision.sku.clone(),
            status: OrderStatus::AutoOrdered,
            vendor: vendor.to_owned(),
            quantity: decision.quantity,
            order_id: Some(order.order_id.clone()),
            note: None,
        });
        if let Err(err) = bounded("update_sheet_status", limit, call).await {
            warn!(sku = %decision.sku, %err, "sheet status update failed");
        }
        Ok(order)
    }

    async fn request_approval(&self, lines: Vec<BatchLineItem>, limit: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let action = self
            .workflow
            .submit(PendingAction::batch(token.clone(), lines), Utc::now())
            .await?;

        for line in &action.items {
            let call = self.collaborators.sheets.update_sheet_status(SheetStatusUpdate {
                sku: line.sku.clone(),
                status: OrderStatus::PendingApproval,
                vendor: line.vendor.clone(),
                quantity: line.quantity,
                order_id: None,
                note: Some(format!("token {token}")),
            });
            if let Err(err) = bounded("update_sheet_status", limit, call).await {
                warn!(sku = %line.sku, %err, "sheet status update failed");
            }
        }

        let approve_url = self.callback_url("approve-batch", &token)?;
        let reject_url = self.callback_url("reject-batch", &token)?;
        let call = self.collaborators.notifier.notify_approval_required(
            &self.config.approval_recipient,
            &action,
            approve_url.as_str(),
            reject_url.as_str(),
        );
        let message_id = bounded("notify_approval_required", limit, call).await?;
        info!(%token, %message_id, lines = action.items.len(), "approval requested");
        Ok(token)
    }

    /// `{webhook_base_url}/webhook/{endpoint}?token=..&secret=..`
    fn callback_url(&self, endpoint: &str, token: &str) -> Result<Url> {
        let base = self.config.webhook_base_url.trim_end_matches('/');
        Url::parse_with_params(
            &format!("{base}/webhook/{endpoint}"),
            &[("token", token), ("secret", self.config.webhook_secret.as_str())],
        )
        .map_err(|e| AppError::Config(format!("invalid webhook_base_url: {e}")))
    }
}

/// Vendors rejected per SKU by pending recompute requests (lowercase).
fn excluded_vendors(tasks: &[RecomputeTask]) -> HashMap<String, HashSet<String>> {
    let mut map: HashMap<String, HashSet<String>> = HashMap::new();
    for task in tasks {
        map.entry(task.sku.clone())
            .or_default()
            .insert(task.original_vendor.to_lowercase());
    }
    map
}

/// Vendor list for `item`, dropping rejected vendors while any alternative remains.
fn vendors_for(
    item: &InventoryItem,
    vendors: &[Vendor],
    excluded: &HashMap<String, HashSet<String>>,
) -> Vec<Vendor> {
    let Some(rejected) = excluded.get(&item.sku) else {
        return vendors.to_vec();
    };
    let remaining: Vec<Vendor> = vendors
        .iter()
        .filter(|v| !rejected.contains(&v.name.to_lowercase()))
        .cloned()
        .collect();
    if remaining.is_empty() {
        info!(sku = %item.sku, "no alternative vendor after rejection, keeping full list");
        vendors.to_vec()
    } else {
        info!(sku = %item.sku, excluded = rejected.len(), "recompute excludes rejected vendors");
        remaining
    }
}
