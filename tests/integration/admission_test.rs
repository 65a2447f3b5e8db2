//! Admission endpoint tests: authoritative customer tier fails closed,
//! anonymous tier fails open and carries a Retry-After window.

use actix_web::{test, web, App};
use chrono::Duration;
use serde_json::json;
use std::sync::atomic::Ordering;

use quotaflow::routes;
use quotaflow::store::CounterStore;

use crate::helpers::{customer, harness};

#[actix_web::test]
async fn customer_under_limit_is_allowed() {
    let h = harness();
    h.directory.insert(customer("c1", Some("a@example.com"), Some("2")));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["remaining"], 2);
}

#[actix_web::test]
async fn customer_at_limit_gets_429() {
    let h = harness();
    h.directory.insert(customer("c1", Some("a@example.com"), Some("4")));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "quota_exhausted");
    assert_eq!(body["used"], 4);
    assert_eq!(body["limit"], 4);
}

#[actix_web::test]
async fn structured_encoding_counts_the_same() {
    let h = harness();
    h.directory
        .insert(customer("c1", None, Some(r#"{"total": 4}"#)));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
}

#[actix_web::test]
async fn customer_tier_fails_closed_when_directory_is_down() {
    let h = harness();
    h.directory.insert(customer("c1", None, Some("0")));
    h.directory.fetch_fails.store(true, Ordering::SeqCst);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "customer_id": "c1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
}

#[actix_web::test]
async fn unknown_customer_is_404() {
    let h = harness();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "customer_id": "ghost" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn device_tier_denies_past_the_window_limit() {
    let h = harness();

    // Burn the whole anonymous allowance (limit 3 in the test config)
    for _ in 0..3 {
        h.counters
            .increment("device:tok-1:generations", Duration::hours(1))
            .await
            .unwrap();
    }

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "device_token": "tok-1" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);

    let retry_after = resp.headers().get("retry-after");
    assert!(retry_after.is_some());
    let secs: i64 = retry_after.unwrap().to_str().unwrap().parse().unwrap();
    assert!(secs > 0);
}

#[actix_web::test]
async fn ip_tier_is_used_when_no_other_identity_is_given() {
    let h = harness();

    for _ in 0..3 {
        h.counters
            .increment("ip:203.0.113.9:generations", Duration::hours(1))
            .await
            .unwrap();
    }

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .peer_addr("203.0.113.9:41000".parse().unwrap())
        .set_json(json!({}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
}

#[actix_web::test]
async fn fresh_anonymous_identity_is_allowed() {
    let h = harness();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::admission::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/admission")
        .set_json(json!({ "device_token": "brand-new" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["remaining"], 3);
}
