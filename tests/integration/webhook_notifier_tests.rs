//! Integration tests for `HttpNotifier` against a local receiver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use reorder_gate::collaborators::{ApprovalNotifier, HttpNotifier};
use reorder_gate::models::pending::PendingAction;
use reorder_gate::AppError;

use super::test_helpers::line;

type Received = Arc<Mutex<Vec<serde_json::Value>>>;

async fn accept(State(received): State<Received>, Json(body): Json<serde_json::Value>) -> StatusCode {
    received.lock().expect("lock").push(body);
    StatusCode::NO_CONTENT
}

async fn refuse() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Spawn a receiver, returning its base URL and the captured bodies.
async fn spawn_receiver() -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/hook", post(accept))
        .route("/down", post(refuse))
        .with_state(Arc::clone(&received));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), received)
}

fn request() -> PendingAction {
    let mut action = PendingAction::batch("tok-n".to_owned(), vec![line("A"), line("B")]);
    action.expires_at = Utc::now();
    action
}

#[tokio::test]
async fn posts_approval_request_as_json() {
    let (base, received) = spawn_receiver().await;
    let notifier = HttpNotifier::new(&format!("{base}/hook"), Duration::from_secs(2)).expect("client");

    let message_id = notifier
        .notify_approval_required(
            "buyer@example.com",
            &request(),
            "http://reorder.test/webhook/approve-batch?token=tok-n",
            "http://reorder.test/webhook/reject-batch?token=tok-n",
        )
        .await
        .expect("delivered");

    assert_eq!(message_id, "webhook-tok-n");
    let bodies = received.lock().expect("lock").clone();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["recipient"], "buyer@example.com");
    assert_eq!(body["kind"], "batch_reorder");
    assert_eq!(body["quantity"], 20);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert!(body["approve_url"]
        .as_str()
        .is_some_and(|u| u.ends_with("approve-batch?token=tok-n")));
}

#[tokio::test]
async fn non_success_status_is_downstream_error() {
    let (base, received) = spawn_receiver().await;
    let notifier = HttpNotifier::new(&format!("{base}/down"), Duration::from_secs(2)).expect("client");

    let err = notifier
        .notify_approval_required("buyer@example.com", &request(), "a", "r")
        .await
        .expect_err("refused");

    assert!(matches!(err, AppError::Downstream(_)));
    assert!(err.to_string().contains("503"));
    assert!(received.lock().expect("lock").is_empty());
}
