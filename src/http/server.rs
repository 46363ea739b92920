//! axum router and server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{render, AppState};
use crate::{AppError, Result};

/// Query string carried by callback links.
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    token: Option<String>,
    secret: Option<String>,
}

/// Query string for the status probe.
#[derive(Debug, Default, Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// Handler for `GET /health`: 200 OK with a plain-text body.
async fn health() -> &'static str {
    "ok"
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_page(err: &AppError) -> Response {
    let status = status_of(err);
    let message = match err {
        AppError::Unauthorized(_) => "The link secret is not valid.".to_owned(),
        AppError::NotFound(_) => "This link is invalid, expired or already used.".to_owned(),
        AppError::Input(msg) => msg.clone(),
        AppError::Downstream(_) | AppError::Timeout(_) => {
            "The order could not be placed. You can retry the link.".to_owned()
        }
        _ => "The request could not be completed.".to_owned(),
    };
    warn!(status = status.as_u16(), %err, "callback failed");
    (status, Html(render::error(status.as_u16(), &message))).into_response()
}

/// Split the query into `(token, secret)`, rejecting a missing token.
fn credentials(query: CallbackQuery) -> std::result::Result<(String, String), Response> {
    match query.token.filter(|t| !t.is_empty()) {
        Some(token) => Ok((token, query.secret.unwrap_or_default())),
        None => Err(error_page(&AppError::Input("missing token".into()))),
    }
}

async fn approve(State(state): State<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Response {
    let (token, secret) = match credentials(query) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match state.workflow.approve_single(&token, &secret, Utc::now()).await {
        Ok(outcome) => Html(render::single_approved(&outcome)).into_response(),
        Err(err) => error_page(&err),
    }
}

async fn reject(State(state): State<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Response {
    let (token, secret) = match credentials(query) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match state.workflow.reject_single(&token, &secret, Utc::now()).await {
        Ok(outcome) => Html(render::rejected(&outcome)).into_response(),
        Err(err) => error_page(&err),
    }
}

async fn approve_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let (token, secret) = match credentials(query) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match state.workflow.approve_batch(&token, &secret, Utc::now()).await {
        Ok(outcome) => Html(render::batch_approved(&outcome)).into_response(),
        Err(err) => error_page(&err),
    }
}

async fn reject_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let (token, secret) = match credentials(query) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match state.workflow.reject_batch(&token, &secret, Utc::now()).await {
        Ok(outcome) => Html(render::rejected(&outcome)).into_response(),
        Err(err) => error_page(&err),
    }
}

async fn action_status(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<SecretQuery>,
) -> Response {
    let secret = query.secret.unwrap_or_default();
    match state.workflow.status(&token, &secret, Utc::now()).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => {
            let body = serde_json::json!({ "error": err.to_string() });
            (status_of(&err), Json(body)).into_response()
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/approve", get(approve))
        .route("/webhook/reject", get(reject))
        .route("/webhook/approve-batch", get(approve_batch))
        .route("/webhook/reject-batch", get(reject_batch))
        .route("/webhook/status/{token}", get(action_status))
        .with_state(state)
}

/// Bind `127.0.0.1:http_port` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind or exits with an error.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([127, 0, 0, 1], state.config.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {bind}: {err}")))?;
    serve_listener(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server exits with an error.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener has no address: {err}")))?;
    info!(%addr, "http server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("http server error: {err}")))?;

    info!("http server stopped");
    Ok(())
}
