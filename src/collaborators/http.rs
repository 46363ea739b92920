//! Approval notifier that POSTs the request to a webhook.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{ApprovalNotifier, CallFuture};
use crate::models::pending::{BatchLineItem, PendingAction};
use crate::{AppError, Result};

/// JSON body sent to the webhook.
#[derive(Debug, Serialize)]
struct ApprovalPayload<'a> {
    recipient: &'a str,
    token: &'a str,
    kind: &'static str,
    sku: &'a str,
    vendor: &'a str,
    quantity: u64,
    total_cost: f64,
    rationale: &'a str,
    items: Vec<BatchLineItem>,
    expires_at: DateTime<Utc>,
    approve_url: &'a str,
    reject_url: &'a str,
}

/// Sends approval requests to an HTTP endpoint (chat bridge, mail relay).
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    /// Construct a notifier posting to `url` with a request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

impl ApprovalNotifier for HttpNotifier {
    fn notify_approval_required(
        &self,
        recipient: &str,
        request: &PendingAction,
        approve_url: &str,
        reject_url: &str,
    ) -> CallFuture<'_, String> {
        let payload = ApprovalPayload {
            recipient,
            token: &request.token,
            kind: request.kind.as_str(),
            sku: &request.sku,
            vendor: &request.vendor,
            quantity: request.quantity,
            total_cost: request.total_cost,
            rationale: &request.rationale,
            items: request.lines(),
            expires_at: request.expires_at,
            approve_url,
            reject_url,
        };
        let body = serde_json::to_value(&payload);
        let token = request.token.clone();

        Box::pin(async move {
            let body = body?;
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::Downstream(format!("approval webhook unreachable: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                warn!(%status, %token, "approval webhook rejected request");
                return Err(AppError::Downstream(format!(
                    "approval webhook returned {status}"
                )));
            }

            info!(%token, "approval request delivered");
            Ok(format!("webhook-{token}"))
        })
    }
}
