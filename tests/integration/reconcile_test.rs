//! Reconciliation tests: cooldown gating, encoding-preserving resets,
//! notification retry semantics, and per-entry failure isolation.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use quotaflow::models::{PendingReset, ResetSnapshot, ResetSource};
use quotaflow::services::ReconcileService;
use quotaflow::store::ResetQueue;

use crate::helpers::{customer, harness, MailerMode, TestHarness};

/// Queues a reset whose exhaustion happened `age_minutes` ago
async fn enqueue_aged(h: &TestHarness, customer_id: &str, age_minutes: i64) {
    let snapshot = ResetSnapshot {
        reached_at: Utc::now() - Duration::minutes(age_minutes),
        total_used: 4,
        total_limit: 4,
        added_by: ResetSource::Request,
    };
    h.queue
        .enqueue_if_absent(customer_id, &snapshot, Duration::hours(48))
        .await
        .unwrap();
}

async fn run(h: &TestHarness) -> quotaflow::services::ReconcileSummary {
    ReconcileService::run(
        h.queue.as_ref(),
        h.directory.as_ref(),
        h.mailer.as_ref(),
        h.audit.as_ref(),
        &h.state.config.quota,
        Utc::now(),
    )
    .await
    .unwrap()
}

#[actix_web::test]
async fn entry_inside_cooldown_is_untouched() {
    let h = harness();
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some("4")));
    enqueue_aged(&h, "c1", 10).await;

    let summary = run(&h).await;

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.waiting, 1);
    assert_eq!(summary.reset, 0);
    assert_eq!(h.queue.list_all().await.unwrap().len(), 1);
    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("4"));
    assert!(h.mailer.sent().is_empty());
}

#[actix_web::test]
async fn elapsed_cooldown_resets_notifies_and_removes() {
    let h = harness();
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some("4")));
    enqueue_aged(&h, "c1", 90).await;

    let summary = run(&h).await;

    assert_eq!(summary.reset, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(summary.removed, 1);
    assert!(summary.errors.is_empty());

    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("0"));
    assert_eq!(h.mailer.sent(), vec![("a@example.com".to_string(), 4)]);
    assert!(h.queue.list_all().await.unwrap().is_empty());

    let audit = h.audit.recorded();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].customer_id, "c1");
    assert_eq!(audit[0].provider_message_id, "msg-1");
}

#[actix_web::test]
async fn structured_encoding_survives_the_reset() {
    let h = harness();
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some(r#"{"total": 7}"#)));
    enqueue_aged(&h, "c1", 90).await;

    run(&h).await;

    assert_eq!(
        h.directory.quota_raw("c1").as_deref(),
        Some(r#"{"total":0}"#)
    );
}

#[actix_web::test]
async fn failed_notification_keeps_the_row_but_the_reset_sticks() {
    let h = harness();
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some("4")));
    enqueue_aged(&h, "c1", 90).await;
    h.mailer.set_mode(MailerMode::RateLimited);

    let summary = run(&h).await;

    assert_eq!(summary.reset, 1);
    assert_eq!(summary.notified, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.errors.len(), 1);

    // Quota already replenished; only the notification is still owed
    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("0"));
    assert_eq!(h.queue.list_all().await.unwrap().len(), 1);

    // Next run retries the send; the second reset of an already-zero field
    // is harmless by construction
    h.mailer.set_mode(MailerMode::Succeed);
    let summary = run(&h).await;

    assert_eq!(summary.notified, 1);
    assert_eq!(summary.removed, 1);
    assert!(h.queue.list_all().await.unwrap().is_empty());
    assert_eq!(h.directory.writes().len(), 2);
    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("0"));
}

#[actix_web::test]
async fn no_contact_address_completes_without_email() {
    let h = harness();
    h.directory.insert(customer("c1", None, Some("4")));
    enqueue_aged(&h, "c1", 90).await;

    let summary = run(&h).await;

    assert_eq!(summary.reset, 1);
    assert_eq!(summary.no_contact, 1);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.notified, 0);
    assert!(h.mailer.sent().is_empty());
    assert!(h.queue.list_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn corrupt_row_is_dropped_not_retried() {
    let h = harness();
    h.queue.insert_raw(PendingReset {
        customer_id: "c1".to_string(),
        payload: serde_json::json!({ "total_used": 4 }),
        expires_at: Utc::now() + Duration::hours(48),
    });

    let summary = run(&h).await;

    assert_eq!(summary.corrupt, 1);
    assert!(summary.errors.is_empty());
    assert!(h.queue.list_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn per_entry_failures_do_not_abort_the_batch() {
    let h = harness();
    // "ghost" has a queue row but no directory record
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some("4")));
    enqueue_aged(&h, "ghost", 90).await;
    enqueue_aged(&h, "c1", 90).await;

    let summary = run(&h).await;

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.notified, 1);

    let remaining = h.queue.list_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].customer_id, "ghost");
}

#[actix_web::test]
async fn reset_of_an_unreadable_field_falls_back_to_legacy_zero() {
    let h = harness();
    h.directory
        .insert(customer("c1", None, Some("certainly not a count")));
    enqueue_aged(&h, "c1", 90).await;

    let summary = run(&h).await;

    assert_eq!(summary.reset, 1);
    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("0"));
}
