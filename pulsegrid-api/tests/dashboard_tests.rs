//! Tests for the dashboard read API and health probes.

mod support;

use axum::http::StatusCode;
use serde_json::json;

use pulsegrid_test_utils::{valid_tracker_document, TEST_API_KEY};

use support::{get, post_ingest_json, TestContext};

const IMEIS: [&str; 3] = ["356938035643809", "356938035643810", "356938035643811"];

async fn ingest_fleet(ctx: &TestContext) {
    for imei in IMEIS {
        let (status, _) =
            post_ingest_json(&ctx.router, Some(TEST_API_KEY), &valid_tracker_document(imei)).await;
        assert_eq!(status, StatusCode::OK);
        // Space out updated_at so the ordering assertion is unambiguous.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn device_list_orders_by_most_recent_update() {
    let ctx = TestContext::new();
    ingest_fleet(&ctx).await;

    let (status, body) = get(&ctx.router, "/api/v1/devices", Some(TEST_API_KEY)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["total"], json!(3));

    let devices = body["data"]["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0]["device_id"], json!(IMEIS[2]), "newest first");
    assert_eq!(devices[2]["device_id"], json!(IMEIS[0]));
}

#[tokio::test]
async fn device_list_limit_is_applied_and_capped() {
    let ctx = TestContext::new();
    ingest_fleet(&ctx).await;

    let (status, body) = get(&ctx.router, "/api/v1/devices?limit=2", Some(TEST_API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["devices"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], json!(2));

    // A limit beyond the cap is clamped server-side rather than rejected.
    let (status, body) = get(
        &ctx.router,
        "/api/v1/devices?limit=100000",
        Some(TEST_API_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["devices"].as_array().unwrap().len(), 3);

    let (status, body) = get(&ctx.router, "/api/v1/devices?limit=0", Some(TEST_API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["devices"].as_array().unwrap().len(), 1, "clamped up to 1");
}

#[tokio::test]
async fn repeated_ingest_updates_existing_row_not_total() {
    let ctx = TestContext::new();
    ingest_fleet(&ctx).await;
    ingest_fleet(&ctx).await;

    let (_, body) = get(&ctx.router, "/api/v1/devices", Some(TEST_API_KEY)).await;
    assert_eq!(body["data"]["total"], json!(3), "still one row per device");
}

#[tokio::test]
async fn health_probes_respond_without_auth() {
    let ctx = TestContext::new();

    let (status, _) = get(&ctx.router, "/health/ping", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&ctx.router, "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    let (status, body) = get(&ctx.router, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["details"]["database"]["status"], json!("healthy"));
}
