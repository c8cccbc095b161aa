//! End-to-end sync scheduling against a mock partner backend.

#![allow(clippy::unwrap_used)]

use partner_sync::{SyncDecision, SyncError, TriggerOutcome};
use partner_sync_core::SyncKind;
use partner_sync_integration_tests::{AGENT, SYNC_PATH, TOKEN_PATH, TestContext};
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const UP_TO_DATE: &str = r#"{
    "status": "full",
    "details": {
        "full": {"attemptedStart": "2024-05-01T00:00:00Z", "overdue": false, "lastAttemptSucceeded": true},
        "partial": {"attemptedStart": "2024-05-02T00:00:00Z", "overdue": false}
    }
}"#;

async fn mount_trigger(ctx: &TestContext, kind: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .and(body_json(serde_json::json!({"data": {kind: true}})))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"queued":true}}"#))
        .expect(calls)
        .mount(&ctx.server)
        .await;
}

// =============================================================================
// Decision Flow
// =============================================================================

#[tokio::test]
async fn test_new_install_triggers_full_sync() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    ctx.mount_status("").await;

    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("x-integration-agent", AGENT))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"data": {"full": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let report = ctx.scheduler().run_once().await.unwrap();

    assert_eq!(report.decision, SyncDecision::Full);
    assert!(report.triggered());
    assert!(report.remote_errors().is_none());
}

#[tokio::test]
async fn test_full_status_does_not_trigger() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    ctx.mount_status(UP_TO_DATE).await;
    mount_trigger(&ctx, "full", 0).await;
    mount_trigger(&ctx, "partial", 0).await;

    let report = ctx.scheduler().run_once().await.unwrap();

    assert_eq!(report.decision, SyncDecision::UpToDate);
    assert!(report.outcome.is_none());
}

#[tokio::test]
async fn test_overdue_partial_triggers_partial_sync() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    ctx.mount_status(
        r#"{"data": {"status": "full", "details": {
            "full": {"attemptedStart": "2024-05-01T00:00:00Z", "overdue": false},
            "partial": {"attemptedStart": "2024-05-02T00:00:00Z", "overdue": true}
        }}}"#,
    )
    .await;
    mount_trigger(&ctx, "full", 0).await;
    mount_trigger(&ctx, "partial", 1).await;

    let report = ctx.scheduler().run_once().await.unwrap();

    assert_eq!(report.decision, SyncDecision::Partial);
    assert!(matches!(
        report.outcome,
        Some(TriggerOutcome::Triggered {
            kind: SyncKind::Partial,
            ..
        })
    ));
}

#[tokio::test]
async fn test_overdue_full_after_attempt_triggers_again() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    ctx.mount_status(
        r#"{"status": "partial", "details": {
            "full": {"attemptedStart": "2024-05-01T00:00:00Z", "overdue": true, "lastAttemptSucceeded": false}
        }}"#,
    )
    .await;
    mount_trigger(&ctx, "full", 1).await;

    let report = ctx.scheduler().run_once().await.unwrap();
    assert_eq!(report.decision, SyncDecision::Full);
}

#[tokio::test]
async fn test_trigger_errors_in_body_are_reported() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errors":["bad input"]}"#))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let outcome = ctx.scheduler().trigger(SyncKind::Full).await.unwrap();
    let TriggerOutcome::Triggered { envelope, .. } = outcome else {
        panic!("expected trigger to be sent");
    };

    assert!(envelope.has_errors());
    let error = envelope.error().unwrap();
    assert_eq!(error.payload(), serde_json::json!(["bad input"]));
    assert_eq!(error.to_string(), "bad input");
}

// =============================================================================
// Failure Modes
// =============================================================================

#[tokio::test]
async fn test_oauth_failure_aborts_before_trigger() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed",
        })))
        .mount(&ctx.server)
        .await;
    mount_trigger(&ctx, "full", 0).await;

    let err = ctx
        .scheduler()
        .perform_full_sync_if_needed(Some(&partner_sync_core::SyncStatus::never_synced()))
        .await
        .unwrap_err();

    assert!(err.is_authentication());
    assert!(err.to_string().contains("Client authentication failed"));
}

#[tokio::test]
async fn test_backend_outage_is_transport_error() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&ctx.server)
        .await;

    let err = ctx.scheduler().fetch_status().await.unwrap_err();
    let SyncError::Transport(transport) = &err else {
        panic!("expected transport error, got {err:?}");
    };
    assert_eq!(transport.status_code(), Some(503));
}

#[tokio::test]
async fn test_concurrent_runs_trigger_once() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .and(body_string_contains("full"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&ctx.server)
        .await;

    let scheduler = ctx.scheduler();
    let status = partner_sync_core::SyncStatus::never_synced();
    let (a, b, c) = tokio::join!(
        scheduler.evaluate_and_trigger(Some(&status)),
        scheduler.evaluate_and_trigger(Some(&status)),
        scheduler.evaluate_and_trigger(Some(&status)),
    );

    let sent = [a.unwrap(), b.unwrap(), c.unwrap()]
        .iter()
        .filter(|report| report.triggered())
        .count();
    assert_eq!(sent, 1);
}

#[tokio::test]
async fn test_missing_status_triggers_full_sync() {
    let ctx = TestContext::new().await;
    ctx.mount_token("tok-1", 1).await;
    mount_trigger(&ctx, "full", 1).await;

    let report = ctx
        .scheduler()
        .perform_full_sync_if_needed(None)
        .await
        .unwrap();

    assert_eq!(report.decision, SyncDecision::Full);
    assert!(report.triggered());
}
