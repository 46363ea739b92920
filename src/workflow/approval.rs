//! Approve and reject callbacks for pending actions.
//!
//! Every callback runs the same authorization sequence: shared secret,
//! active lookup, kind check, then an atomic claim. Only the caller that
//! wins the claim executes side effects, so a double-clicked link places
//! one order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{error, info, info_span, warn, Instrument};

use super::{ActionView, ApprovedLine, BatchOutcome, FailedLine, RejectOutcome, SingleOutcome};
use crate::actions::{record_or_warn, ActionEntry, ActionEvent, ActionLog};
use crate::collaborators::{
    bounded, CallFuture, Collaborators, OrderConfirmation, OrderStatus, SheetStatusUpdate,
};
use crate::models::pending::{default_ttl, ActionKind, ActionStatus, BatchLineItem, PendingAction};
use crate::outbox::{RecomputeOutbox, RecomputeTask};
use crate::persistence::PendingActionStore;
use crate::{AppError, GlobalConfig, Result};

const INVALID_TOKEN: &str = "invalid or expired token";

/// Explicit settings for the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Shared secret every callback must present.
    pub secret: String,
    /// Lifetime of newly stored actions.
    pub ttl: chrono::Duration,
    /// Claims allowed before a failing single action becomes `failed`.
    pub max_attempts: u32,
    /// Upper bound for each collaborator call.
    pub collaborator_timeout: Duration,
}

impl WorkflowSettings {
    /// Derive settings from loaded configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            secret: config.webhook_secret.clone(),
            ttl: default_ttl(),
            max_attempts: config.approval.max_attempts,
            collaborator_timeout: config.timeouts.collaborator(),
        }
    }
}

/// Executes approval and rejection callbacks against the store and collaborators.
pub struct ApprovalWorkflow {
    settings: WorkflowSettings,
    store: Arc<dyn PendingActionStore>,
    collaborators: Collaborators,
    outbox: Arc<dyn RecomputeOutbox>,
    actions: Arc<dyn ActionLog>,
}

impl ApprovalWorkflow {
    /// Assemble a workflow from its dependencies.
    #[must_use]
    pub fn new(
        settings: WorkflowSettings,
        store: Arc<dyn PendingActionStore>,
        collaborators: Collaborators,
        outbox: Arc<dyn RecomputeOutbox>,
        actions: Arc<dyn ActionLog>,
    ) -> Self {
        Self {
            settings,
            store,
            collaborators,
            outbox,
            actions,
        }
    }

    /// Store a new pending action with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn submit(&self, action: PendingAction, now: DateTime<Utc>) -> Result<PendingAction> {
        let stored = self.store.store(action, self.settings.ttl, now).await?;
        info!(
            token = %stored.token,
            kind = stored.kind.as_str(),
            backend = self.store.backend(),
            expires_at = %stored.expires_at,
            "pending action stored"
        );
        Ok(stored)
    }

    /// Approve a single-SKU action and place its order.
    ///
    /// On placement failure the claim is released so the link can be used
    /// again until attempts run out.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad secret, `NotFound` for an unknown, expired
    /// or already claimed token, `Input` for a batch token, and
    /// `Downstream`/`Timeout` when the order cannot be placed.
    pub async fn approve_single(
        &self,
        token: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<SingleOutcome> {
        let span = info_span!("approve_single", token = %token);
        async {
            let action = self
                .authorize_and_claim(token, secret, ActionKind::SingleReorder, now)
                .await?;

            // ── 1. Place order (blocking step) ───────────────
            let placed = self
                .call(
                    "place_order",
                    self.collaborators
                        .supplier
                        .place_order(&action.vendor, &action.sku, action.quantity),
                )
                .await;

            let order = match placed {
                Ok(order) => order,
                Err(err) => {
                    for line in action.lines() {
                        self.record(line_entry(ActionEvent::OrderFailed, token, &line).with_detail(
                            format!("attempt {}: {err}", action.attempts),
                        ));
                    }
                    match self.store.release(token, self.settings.max_attempts).await {
                        Ok(released) => {
                            error!(%err, released = released.as_str(), "order placement failed");
                            if released == ActionStatus::Failed {
                                for line in action.lines() {
                                    self.mark_line(
                                        &line,
                                        OrderStatus::OrderFailed,
                                        None,
                                        Some(err.to_string()),
                                    )
                                    .await;
                                }
                            }
                        }
                        Err(release_err) => {
                            error!(%err, %release_err, "order placement failed and the claim could not be released");
                        }
                    }
                    return Err(err);
                }
            };

            // ── 2. Page and sheet (best effort) ──────────────
            for line in action.lines() {
                self.record(
                    line_entry(ActionEvent::OrderApproved, token, &line)
                        .with_order_id(order.order_id.clone()),
                );
                self.mark_line(&line, OrderStatus::Ordered, Some(&order), None)
                    .await;
            }

            // ── 3. Resolve token ─────────────────────────────
            self.store.transition(token, ActionStatus::Approved).await?;
            info!(order_id = %order.order_id, "single reorder approved");

            Ok(SingleOutcome {
                token: action.token.clone(),
                sku: action.sku.clone(),
                vendor: action.vendor.clone(),
                quantity: action.quantity,
                order,
            })
        }
        .instrument(span)
        .await
    }

    /// Approve a batch action, placing each line independently.
    ///
    /// The token is resolved as approved even if every line fails.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `NotFound` or `Input` from authorization, or a store
    /// error from the final transition.
    pub async fn approve_batch(
        &self,
        token: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome> {
        let span = info_span!("approve_batch", token = %token);
        async {
            let action = self
                .authorize_and_claim(token, secret, ActionKind::BatchReorder, now)
                .await?;

            let mut approved = Vec::new();
            let mut failed = Vec::new();

            for item in action.items {
                let placed = self
                    .call(
                        "place_order",
                        self.collaborators
                            .supplier
                            .place_order(&item.vendor, &item.sku, item.quantity),
                    )
                    .await;

                match placed {
                    Ok(order) => {
                        self.record(
                            line_entry(ActionEvent::OrderApproved, token, &item)
                                .with_order_id(order.order_id.clone()),
                        );
                        self.mark_line(&item, OrderStatus::Ordered, Some(&order), None)
                            .await;
                        approved.push(ApprovedLine { item, order });
                    }
                    Err(err) => {
                        warn!(sku = %item.sku, %err, "batch line order failed");
                        self.record(
                            line_entry(ActionEvent::OrderFailed, token, &item)
                                .with_detail(err.to_string()),
                        );
                        self.mark_line(&item, OrderStatus::OrderFailed, None, Some(err.to_string()))
                            .await;
                        failed.push(FailedLine {
                            item,
                            error: err.to_string(),
                        });
                    }
                }
            }

            self.store.transition(token, ActionStatus::Approved).await?;
            info!(
                approved = approved.len(),
                failed = failed.len(),
                "batch reorder approved"
            );

            Ok(BatchOutcome {
                token: token.to_owned(),
                approved,
                failed,
            })
        }
        .instrument(span)
        .await
    }

    /// Reject a single-SKU action.
    ///
    /// # Errors
    ///
    /// See [`Self::reject`].
    pub async fn reject_single(
        &self,
        token: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<RejectOutcome> {
        self.reject(token, secret, ActionKind::SingleReorder, now)
            .instrument(info_span!("reject_single", token = %token))
            .await
    }

    /// Reject a batch action.
    ///
    /// # Errors
    ///
    /// See [`Self::reject`].
    pub async fn reject_batch(
        &self,
        token: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<RejectOutcome> {
        self.reject(token, secret, ActionKind::BatchReorder, now)
            .instrument(info_span!("reject_batch", token = %token))
            .await
    }

    /// Reject an action: mark lines rejected, resolve the token and raise
    /// one recompute task per line.
    ///
    /// Page, sheet and outbox failures are logged and never fail the call.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `NotFound` or `Input` from authorization, or a store
    /// error from the final transition.
    pub async fn reject(
        &self,
        token: &str,
        secret: &str,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Result<RejectOutcome> {
        let action = self.authorize_and_claim(token, secret, kind, now).await?;
        let lines = action.lines();

        for line in &lines {
            self.mark_line(line, OrderStatus::Rejected, None, None).await;
        }

        self.store.transition(token, ActionStatus::Rejected).await?;

        let mut enqueued = 0;
        for line in &lines {
            self.record(line_entry(ActionEvent::Rejected, token, line));
            let task = RecomputeTask::rejected(token, &line.sku, &line.vendor, line.quantity);
            match self.outbox.enqueue(&task) {
                Ok(()) => enqueued += 1,
                Err(err) => warn!(sku = %line.sku, %err, "failed to enqueue recompute task"),
            }
        }

        info!(lines = lines.len(), enqueued, "pending action rejected");
        Ok(RejectOutcome {
            token: token.to_owned(),
            skus: lines.into_iter().map(|l| l.sku).collect(),
            recompute_enqueued: enqueued,
        })
    }

    /// Operator probe reporting the raw state of a token.
    ///
    /// Unlike the callbacks this distinguishes expired from resolved tokens.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad secret, `NotFound` for an unknown token.
    pub async fn status(&self, token: &str, secret: &str, now: DateTime<Utc>) -> Result<ActionView> {
        self.authorize(secret)?;
        let action = self
            .store
            .lookup(token)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown token {token}")))?;

        let status = if action.status == ActionStatus::Pending && action.expires_at <= now {
            "expired".to_owned()
        } else {
            action.status.as_str().to_owned()
        };

        Ok(ActionView {
            token: action.token,
            sku: action.sku,
            status,
            expires_at: action.expires_at,
        })
    }

    /// Check the presented secret in constant time.
    fn authorize(&self, presented: &str) -> Result<()> {
        if self.settings.secret.is_empty() || !secrets_match(&self.settings.secret, presented) {
            warn!("callback presented an invalid secret");
            return Err(AppError::Unauthorized("invalid secret".into()));
        }
        Ok(())
    }

    async fn authorize_and_claim(
        &self,
        token: &str,
        secret: &str,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Result<PendingAction> {
        // ── 1. Secret ────────────────────────────────────────
        self.authorize(secret)?;

        // ── 2. Active lookup ─────────────────────────────────
        let Some(action) = self.store.fetch_active(token, now).await? else {
            info!("token not active");
            return Err(AppError::NotFound(INVALID_TOKEN.into()));
        };

        // ── 3. Kind ──────────────────────────────────────────
        if action.kind != kind {
            warn!(
                expected = kind.as_str(),
                actual = action.kind.as_str(),
                "token used on the wrong endpoint"
            );
            return Err(AppError::Input(format!(
                "token is not a {} request",
                kind.as_str()
            )));
        }

        // ── 4. Claim ─────────────────────────────────────────
        let Some(claimed) = self.store.claim(token, now).await? else {
            info!("token claimed by another callback");
            return Err(AppError::NotFound(INVALID_TOKEN.into()));
        };
        info!(attempt = claimed.attempts, "pending action claimed");
        Ok(claimed)
    }

    fn record(&self, entry: ActionEntry) {
        record_or_warn(self.actions.as_ref(), entry);
    }

    /// Run a collaborator call under the configured timeout.
    async fn call<T>(&self, what: &str, fut: CallFuture<'_, T>) -> Result<T> {
        bounded(what, self.settings.collaborator_timeout, fut).await
    }

    /// Best-effort page and sheet update for one line.
    async fn mark_line(
        &self,
        line: &BatchLineItem,
        status: OrderStatus,
        order: Option<&OrderConfirmation>,
        note: Option<String>,
    ) {
        if let Some(ref page_ref) = line.external_ref {
            let mut fields = BTreeMap::new();
            if let Some(order) = order {
                fields.insert("order_id".to_owned(), order.order_id.clone());
                if let Some(date) = order.delivery_date {
                    fields.insert("delivery_date".to_owned(), date.to_string());
                }
            }
            if let Some(ref note) = note {
                fields.insert("note".to_owned(), note.clone());
            }
            let update = self
                .collaborators
                .pages
                .update_page_status(page_ref, status, fields);
            if let Err(err) = self.call("update_page_status", update).await {
                warn!(sku = %line.sku, %page_ref, %err, "page status update failed");
            }
        }

        let update = SheetStatusUpdate {
            sku: line.sku.clone(),
            status,
            vendor: line.vendor.clone(),
            quantity: line.quantity,
            order_id: order.map(|o| o.order_id.clone()),
            note,
        };
        let call = self.collaborators.sheets.update_sheet_status(update);
        if let Err(err) = self.call("update_sheet_status", call).await {
            warn!(sku = %line.sku, %err, "sheet status update failed");
        }
    }
}

fn line_entry(event: ActionEvent, token: &str, line: &BatchLineItem) -> ActionEntry {
    ActionEntry::new(event, &line.sku)
        .with_order_line(&line.vendor, line.quantity, line.total_cost)
        .with_token(token)
}

/// Compare secrets without an early exit on the first differing byte.
fn secrets_match(expected: &str, presented: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(presented.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
