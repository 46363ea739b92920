//! Collaborators that only log what they would do.
//!
//! Used when no real integration is configured so the full cycle and
//! approval flow can run end to end.

use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use super::{
    ApprovalNotifier, CallFuture, OrderConfirmation, OrderStatus, PageStatusUpdater,
    SheetStatusUpdater, SheetStatusUpdate, Supplier,
};
use crate::models::decision::ReorderDecision;
use crate::models::pending::PendingAction;

/// Supplier that accepts every order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSupplier;

impl Supplier for LoggingSupplier {
    fn place_order(
        &self,
        vendor: &str,
        sku: &str,
        quantity: u64,
    ) -> CallFuture<'_, OrderConfirmation> {
        let order_id = format!("PO-{}", short_id());
        info!(%vendor, %sku, quantity, %order_id, "order placed");
        Box::pin(async move {
            Ok(OrderConfirmation {
                order_id,
                delivery_date: None,
            })
        })
    }
}

/// Page updater that derives page references from the SKU.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPages;

impl PageStatusUpdater for LoggingPages {
    fn upsert_reorder_page(&self, decision: &ReorderDecision) -> CallFuture<'_, String> {
        let page_ref = format!("page-{}", decision.sku);
        info!(sku = %decision.sku, %page_ref, urgency = decision.urgency.label(), "reorder page upserted");
        Box::pin(async move { Ok(page_ref) })
    }

    fn update_page_status(
        &self,
        page_ref: &str,
        status: OrderStatus,
        fields: BTreeMap<String, String>,
    ) -> CallFuture<'_, ()> {
        info!(%page_ref, status = status.label(), ?fields, "page status updated");
        Box::pin(async { Ok(()) })
    }
}

/// Spreadsheet updater.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSheets;

impl SheetStatusUpdater for LoggingSheets {
    fn update_sheet_status(&self, update: SheetStatusUpdate) -> CallFuture<'_, ()> {
        info!(
            sku = %update.sku,
            status = update.status.label(),
            vendor = %update.vendor,
            quantity = update.quantity,
            order_id = ?update.order_id,
            "sheet status updated"
        );
        Box::pin(async { Ok(()) })
    }
}

/// Notifier that logs the approval links.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl ApprovalNotifier for LoggingNotifier {
    fn notify_approval_required(
        &self,
        recipient: &str,
        request: &PendingAction,
        approve_url: &str,
        reject_url: &str,
    ) -> CallFuture<'_, String> {
        let message_id = format!("msg-{}", short_id());
        info!(
            %recipient,
            token = %request.token,
            items = request.lines().len(),
            total_cost = request.total_cost,
            %approve_url,
            %reject_url,
            %message_id,
            "approval requested"
        );
        Box::pin(async move { Ok(message_id) })
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id.to_uppercase()
}
