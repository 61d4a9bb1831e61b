//! Telemetry client and token lifecycle against the fake owner API

use collector_devkit::{SnapshotBuilder, TestHarness, VehicleReply};
use serde_json::json;
use std::time::Duration;
use vehicle_collector::{CollectorError, TelemetrySource, VehicleData};

async fn harness(fleet: &[(&str, &str)]) -> TestHarness {
    TestHarness::new().await.unwrap().with_fleet(fleet)
}

#[tokio::test]
async fn test_list_vehicles_keeps_api_order() {
    let harness = harness(&[("3003", "VIN3"), ("1001", "VIN1"), ("2002", "VIN2")]).await;
    let mut client = harness.client();

    let vehicles = client.list_vehicles().await.unwrap();
    assert_eq!(vehicles, vec!["3003", "1001", "2002"]);
}

#[tokio::test]
async fn test_empty_fleet_lists_nothing() {
    let harness = harness(&[]).await;
    let mut client = harness.client();

    assert!(client.list_vehicles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_rejected_is_api_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_vehicles_status(401);
    let mut client = harness.client();

    let err = client.list_vehicles().await.unwrap_err();
    assert!(matches!(err, CollectorError::Api { status: 401 }));
}

#[tokio::test]
async fn test_list_server_error_is_transport_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_vehicles_status(503);
    let mut client = harness.client();

    let err = client.list_vehicles().await.unwrap_err();
    assert!(matches!(err, CollectorError::TransportStatus { status: 503 }));
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn test_online_snapshot_is_decoded() {
    let harness = harness(&[]).await;
    harness.api.add_vehicle_with(
        "1001",
        SnapshotBuilder::driving("1001", "5YJ3E1EA7KF000001").charging(3).build(),
    );
    let mut client = harness.client();

    let VehicleData::Online(snapshot) = client.fetch_snapshot("1001").await.unwrap() else {
        panic!("expected an online snapshot");
    };
    assert_eq!(snapshot.vin.as_deref(), Some("5YJ3E1EA7KF000001"));
    assert_eq!(snapshot.state.as_deref(), Some("online"));
    assert_eq!(snapshot.charge_state.charger_phases, Some(3));
    assert_eq!(snapshot.drive_state.heading, Some(270));
    assert_eq!(harness.api.data_requests(), vec!["1001"]);
}

#[tokio::test]
async fn test_missing_groups_decode_as_empty() {
    let harness = harness(&[]).await;
    harness.api.add_vehicle_with(
        "1001",
        SnapshotBuilder::driving("1001", "VIN1")
            .parked()
            .without_group("climate_state")
            .build(),
    );
    let mut client = harness.client();

    let VehicleData::Online(snapshot) = client.fetch_snapshot("1001").await.unwrap() else {
        panic!("expected an online snapshot");
    };
    assert!(snapshot.drive_state.speed.is_none());
    assert!(snapshot.drive_state.shift_state.is_none());
    assert!(snapshot.climate_state.inside_temp.is_none());
}

#[tokio::test]
async fn test_asleep_vehicle_is_unavailable() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_reply("1001", VehicleReply::Asleep);
    let mut client = harness.client();

    let data = client.fetch_snapshot("1001").await.unwrap();
    assert!(matches!(data, VehicleData::Unavailable));
}

#[tokio::test]
async fn test_unknown_vehicle_is_api_error() {
    let harness = harness(&[]).await;
    let mut client = harness.client();

    let err = client.fetch_snapshot("9999").await.unwrap_err();
    assert!(matches!(err, CollectorError::Api { status: 404 }));
    assert_eq!(err.kind(), "api");
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_reply("1001", VehicleReply::Status(500));
    let mut client = harness.client();

    let err = client.fetch_snapshot("1001").await.unwrap_err();
    assert!(matches!(err, CollectorError::TransportStatus { status: 500 }));
}

#[tokio::test]
async fn test_fresh_token_is_reused() {
    let harness = harness(&[("1001", "VIN1"), ("1002", "VIN2")]).await;
    let mut client = harness.client();

    client.list_vehicles().await.unwrap();
    client.fetch_snapshot("1001").await.unwrap();
    client.fetch_snapshot("1002").await.unwrap();

    assert_eq!(harness.api.token_requests(), 1);
    assert_eq!(harness.api.bearer_tokens(), vec!["access-1", "access-1", "access-1"]);
    assert_eq!(
        client.tokens().credential().map(|c| c.refresh_token.as_str()),
        Some("refresh-1")
    );

    harness.api.clear_requests();
    client.fetch_snapshot("1002").await.unwrap();
    assert_eq!(harness.api.token_requests(), 0);
    assert_eq!(harness.api.bearer_tokens(), vec!["access-1"]);
}

#[tokio::test]
async fn test_token_request_form() {
    let harness = harness(&[]).await;
    let mut client = harness.client();
    client.list_vehicles().await.unwrap();

    let form = harness.api.last_token_form().unwrap();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(form.get("client_id").map(String::as_str), Some("ownerapi"));
    assert_eq!(form.get("refresh_token").map(String::as_str), Some("test-refresh-token"));
    assert_eq!(form.get("scope").map(String::as_str), Some("openid email offline_access"));
}

#[tokio::test]
async fn test_expired_token_refreshes_every_call() {
    let harness = TestHarness::new()
        .await
        .unwrap()
        .with_fleet(&[("1001", "VIN1")])
        .with_token_ttl(Duration::ZERO);
    harness.api.set_expires_in(-60);
    let mut client = harness.client();

    client.list_vehicles().await.unwrap();
    client.fetch_snapshot("1001").await.unwrap();

    assert_eq!(harness.api.token_requests(), 2);
    assert_eq!(harness.api.bearer_tokens(), vec!["access-1", "access-2"]);
}

#[tokio::test]
async fn test_rejected_refresh_is_auth_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_token_status(400);
    let mut client = harness.client();

    let err = client.list_vehicles().await.unwrap_err();
    assert!(matches!(err, CollectorError::Auth(_)));
    assert_eq!(err.kind(), "auth");
    assert!(harness.api.bearer_tokens().is_empty());
    assert!(client.tokens().credential().is_none());
}

#[tokio::test]
async fn test_malformed_token_response_is_auth_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_token_body(json!({ "token_type": "Bearer" }));
    let mut client = harness.client();

    let err = client.fetch_snapshot("1001").await.unwrap_err();
    assert!(matches!(err, CollectorError::Auth(_)));
    assert!(harness.api.data_requests().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_credential() {
    let harness = TestHarness::new()
        .await
        .unwrap()
        .with_fleet(&[("1001", "VIN1")])
        .with_token_ttl(Duration::ZERO);
    harness.api.set_expires_in(-60);
    let mut client = harness.client();
    client.list_vehicles().await.unwrap();

    harness.api.set_token_status(400);
    let err = client.fetch_snapshot("1001").await.unwrap_err();

    assert!(matches!(err, CollectorError::Auth(_)));
    assert_eq!(harness.api.token_requests(), 2);
    assert_eq!(
        client.tokens().credential().map(|c| c.access_token.as_str()),
        Some("access-1")
    );
    assert!(harness.api.data_requests().is_empty());
}

#[tokio::test]
async fn test_out_of_range_expiry_is_auth_error() {
    let harness = harness(&[("1001", "VIN1")]).await;
    harness.api.set_token_body(json!({
        "access_token": "a",
        "refresh_token": "r",
        "expires_in": 9_000_000_000_000_000_000i64
    }));
    let mut client = harness.client();

    let err = client.list_vehicles().await.unwrap_err();
    assert!(matches!(err, CollectorError::Auth(_)));
    assert!(client.tokens().credential().is_none());

    harness.api.set_token_body(json!({ "access_token": "a", "expires_in": "-9000000000000000000" }));
    let err = client.list_vehicles().await.unwrap_err();
    assert!(matches!(err, CollectorError::Auth(_)));
    assert!(harness.api.bearer_tokens().is_empty());
}
