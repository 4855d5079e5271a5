// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the dispatch-core HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use axum_test::TestServer;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use dispatch_core::config::DispatchConfig;
use dispatch_core::state::AppState;
use dispatch_core::transport::build_router;

fn test_config() -> DispatchConfig {
    DispatchConfig {
        host: "127.0.0.1".into(),
        port: 0,
        phase1_radius_km: 5.0,
        phase1_ttl_seconds: 0,
        phase2_radius_km: 5.0,
        phase2_ttl_seconds: 0,
        phase3_radius_km: 10.0,
        phase3_ttl_seconds: 0,
        offers_active_read_limit: 20,
        rides_history_read_limit: 50,
        earth_radius_km: 6371.0,
    }
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), CancellationToken::new()))
}

fn test_server(state: Arc<AppState>) -> TestServer {
    let router = build_router(state);
    TestServer::new(router).expect("failed to create test server")
}

fn passenger_header(server: &TestServer, id: Uuid) -> TestServer {
    let mut server = server.clone();
    server.add_header("x-passenger-id", id.to_string());
    server
}

fn driver_header(server: &TestServer, id: Uuid) -> TestServer {
    let mut server = server.clone();
    server.add_header("x-driver-id", id.to_string());
    server
}

#[tokio::test]
async fn healthz_requires_no_identity() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let resp = server.get("/healthz").await;
    resp.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn create_ride_without_identity_is_unauthorized() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let resp = server
        .post("/api/v1/rides")
        .json(&serde_json::json!({ "pickupText": "123 Main St" }))
        .await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn happy_path_offer_and_accept() -> anyhow::Result<()> {
    let state = test_state();
    let passenger_id = Uuid::new_v4();
    let driver_id = Uuid::new_v4();

    let server = test_server(Arc::clone(&state));
    let driver = driver_header(&server, driver_id);

    driver.post("/api/v1/drivers/me/availability").json(&serde_json::json!({"isOnline": true})).await.assert_status_ok();
    driver.post("/api/v1/drivers/me/location").json(&serde_json::json!({"lat": 0.0, "lng": 0.0})).await.assert_status_ok();

    let passenger = passenger_header(&server, passenger_id);
    let create_resp = passenger
        .post("/api/v1/rides")
        .json(&serde_json::json!({
            "pickupText": "origin",
            "pickupLat": 0.0,
            "pickupLng": 0.0,
            "dropoffText": "destination",
        }))
        .await;
    create_resp.assert_status_ok();
    let ride: serde_json::Value = create_resp.json();
    assert_eq!(ride["status"], "SEARCHING");

    // Give the phase controller a tick to emit the first wave.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let offers_resp = driver.get("/api/v1/drivers/me/offers").await;
    offers_resp.assert_status_ok();
    let offers: Vec<serde_json::Value> = offers_resp.json();
    assert_eq!(offers.len(), 1);
    let offer_id = offers[0]["id"].as_str().unwrap();

    let accept_resp = driver.post(&format!("/api/v1/drivers/me/offers/{offer_id}/accept")).await;
    accept_resp.assert_status_ok();
    let accepted: serde_json::Value = accept_resp.json();
    assert_eq!(accepted["status"], "ACCEPTED");
    assert_eq!(accepted["assignedDriverId"], driver_id.to_string());

    Ok(())
}

#[tokio::test]
async fn double_accept_race_leaves_exactly_one_winner() -> anyhow::Result<()> {
    let state = test_state();
    let passenger_id = Uuid::new_v4();
    let d1 = Uuid::new_v4();
    let d2 = Uuid::new_v4();

    let server = test_server(Arc::clone(&state));
    for driver_id in [d1, d2] {
        let driver = driver_header(&server, driver_id);
        driver.post("/api/v1/drivers/me/availability").json(&serde_json::json!({"isOnline": true})).await.assert_status_ok();
        driver.post("/api/v1/drivers/me/location").json(&serde_json::json!({"lat": 0.0, "lng": 0.0})).await.assert_status_ok();
    }

    let passenger = passenger_header(&server, passenger_id);
    passenger
        .post("/api/v1/rides")
        .json(&serde_json::json!({"pickupText": "origin", "pickupLat": 0.0, "pickupLng": 0.0}))
        .await
        .assert_status_ok();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let driver1 = driver_header(&server, d1);
    let driver2 = driver_header(&server, d2);
    let offer1 = driver1.get("/api/v1/drivers/me/offers").await.json::<Vec<serde_json::Value>>();
    let offer2 = driver2.get("/api/v1/drivers/me/offers").await.json::<Vec<serde_json::Value>>();
    let offer1_id = offer1[0]["id"].as_str().unwrap().to_owned();
    let offer2_id = offer2[0]["id"].as_str().unwrap().to_owned();

    let first = driver1.post(&format!("/api/v1/drivers/me/offers/{offer1_id}/accept")).await;
    let second = driver2.post(&format!("/api/v1/drivers/me/offers/{offer2_id}/accept")).await;

    first.assert_status_ok();
    second.assert_status(axum::http::StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn no_online_drivers_fails_the_ride() -> anyhow::Result<()> {
    let state = test_state();
    let server = test_server(Arc::clone(&state));
    let passenger = passenger_header(&server, Uuid::new_v4());

    let create = passenger
        .post("/api/v1/rides")
        .json(&serde_json::json!({"pickupText": "origin"}))
        .await;
    create.assert_status_ok();
    let ride: serde_json::Value = create.json();
    let ride_id = ride["id"].as_str().unwrap().to_owned();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let status = passenger.get(&format!("/api/v1/rides/{ride_id}")).await;
    status.assert_status_ok();
    let ride: serde_json::Value = status.json();
    assert_eq!(ride["status"], "FAILED");
    Ok(())
}

#[tokio::test]
async fn ride_status_hidden_from_other_passengers() -> anyhow::Result<()> {
    let state = test_state();
    let server = test_server(Arc::clone(&state));
    let owner = passenger_header(&server, Uuid::new_v4());
    let intruder = passenger_header(&server, Uuid::new_v4());

    let create = owner.post("/api/v1/rides").json(&serde_json::json!({"pickupText": "origin"})).await;
    create.assert_status_ok();
    let ride: serde_json::Value = create.json();
    let ride_id = ride["id"].as_str().unwrap().to_owned();

    let resp = intruder.get(&format!("/api/v1/rides/{ride_id}")).await;
    resp.assert_status(axum::http::StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn driver_cannot_set_busy_directly() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let driver = driver_header(&server, Uuid::new_v4());
    let resp = driver
        .post("/api/v1/drivers/me/availability")
        .json(&serde_json::json!({"availability": "BUSY"}))
        .await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
    Ok(())
}
