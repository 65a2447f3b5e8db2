//! Usage-recording tests: increments preserve the wire encoding, exhaustion
//! queues exactly one reset, and bookkeeping failures stay invisible.

use actix_web::{test, web, App};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use quotaflow::routes;
use quotaflow::store::{CounterStore, ResetQueue};

use crate::helpers::{customer, harness};

/// The enqueue side effect is spawned; give it a beat to land
async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(50)).await;
}

#[actix_web::test]
async fn recording_increments_and_preserves_legacy_encoding() {
    let h = harness();
    h.directory.insert(customer("c1", None, Some("2")));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["recorded"], true);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit_reached"], false);

    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("3"));
}

#[actix_web::test]
async fn recording_preserves_structured_encoding() {
    let h = harness();
    h.directory
        .insert(customer("c1", None, Some(r#"{"total": 1}"#)));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(
        h.directory.quota_raw("c1").as_deref(),
        Some(r#"{"total":2}"#)
    );
}

#[actix_web::test]
async fn absent_field_starts_counting_from_zero() {
    let h = harness();
    h.directory.insert(customer("c1", None, None));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(h.directory.quota_raw("c1").as_deref(), Some("1"));
}

#[actix_web::test]
async fn reaching_the_limit_queues_exactly_one_reset() {
    let h = harness();
    h.directory
        .insert(customer("c1", Some("a@example.com"), Some("3")));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    // count 3 -> 4, limit 4: this is the exhausting generation
    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["limit_reached"], true);

    settle().await;

    let rows = h.queue.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    let snapshot = rows[0].snapshot().unwrap();
    assert_eq!(snapshot.total_used, 4);
    assert_eq!(snapshot.total_limit, 4);

    // A stray extra recording past the limit must not refresh the row
    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();
    test::call_service(&app, req).await;
    settle().await;

    let rows = h.queue.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].snapshot().unwrap().total_used, 4);
}

#[actix_web::test]
async fn write_failure_is_invisible_and_queues_nothing() {
    let h = harness();
    h.directory.insert(customer("c1", None, Some("3")));
    h.directory.write_fails.store(true, Ordering::SeqCst);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/usage")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["recorded"], false);

    settle().await;
    assert!(h.queue.list_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn anonymous_usage_hits_the_counter() {
    let h = harness();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    for expected in 1..=2 {
        let req = test::TestRequest::post()
            .uri("/api/usage")
            .set_json(json!({ "device_token": "tok-9" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["total"], expected);
    }

    assert_eq!(
        h.counters.read("device:tok-9:generations").await.unwrap(),
        2
    );
}

#[actix_web::test]
async fn usage_report_normalizes_structured_values() {
    let h = harness();
    h.directory
        .insert(customer("c1", None, Some(r#"{"total": 4}"#)));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::usage::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/usage/c1").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["used"], 4);
    assert_eq!(body["limit"], 4);
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["allowed"], false);
}
