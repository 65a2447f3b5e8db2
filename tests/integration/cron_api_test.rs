//! Scheduled-job endpoint tests: bearer-secret protection and the JSON
//! summaries the scheduler records.

use actix_web::{test, web, App};

use quotaflow::routes;
use quotaflow::store::ResetQueue;

use crate::helpers::{customer, harness, harness_with_config, test_config};

#[actix_web::test]
async fn reconcile_requires_the_secret() {
    let h = harness();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::cron::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/internal/cron/reconcile")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/internal/cron/reconcile")
        .insert_header(("Authorization", "Bearer wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn reconcile_returns_the_run_summary() {
    let h = harness();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::cron::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/internal/cron/reconcile")
        .insert_header(("Authorization", "Bearer cron-secret"))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["scanned"], 0);
    assert_eq!(body["reset"], 0);
    assert!(body["errors"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn backfill_runs_the_sweep_end_to_end() {
    let h = harness();
    h.directory.insert(customer("over", None, Some("5")));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::cron::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/internal/cron/backfill")
        .insert_header(("Authorization", "Bearer cron-secret"))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["created"], 1);

    assert_eq!(h.queue.list_all().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn endpoints_are_open_when_no_secret_is_configured() {
    let mut config = test_config();
    config.cron.secret = None;
    let h = harness_with_config(config);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.state.clone()))
            .configure(routes::cron::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/internal/cron/backfill")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
