#![allow(clippy::unwrap_used)]
// SigenClient tests against a wiremock cloud.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sigen_core::{ClientConfig, CoreError, Credentials, Region, SigenClient, NO_CONSUMPTION};

// ── Helpers ─────────────────────────────────────────────────────────

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success", "data": data }))
}

fn password() -> Credentials {
    Credentials::Password {
        username: "alice".into(),
        password: "password123".to_string().into(),
    }
}

fn client_for(server: &MockServer, auth: Credentials) -> SigenClient {
    let mut config = ClientConfig::new(Region::Eu, auth);
    config.base_url = Some(Url::parse(&server.uri()).unwrap());
    SigenClient::new(config).unwrap()
}

async fn mount_login_and_station(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access_token": "acc", "refresh_token": "ref", "expires_in": 43199 }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/device/owner/station/home"))
        .respond_with(ok(json!({
            "stationId": "ST-1",
            "hasAcCharger": false,
            "acSnList": ["AC-1"],
            "dcSnList": ["DC-1"]
        })))
        .mount(server)
        .await;
}

async fn mount_modes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/device/energy-profile/mode/all/ST-1"))
        .respond_with(ok(json!({
            "defaultWorkingModes": [
                { "label": "Maximum Self-Consumption", "value": "0" },
                { "label": "Fully Feed-in", "value": "5" }
            ],
            "energyProfileItems": [ { "profileId": 42, "name": "Night Charge" } ]
        })))
        .mount(server)
        .await;
}

async fn mount_cards(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/device/system/device/systemDevice/card"))
        .respond_with(ok(json!([
            { "path": 1, "name": "Pool Pump" },
            { "path": 2, "name": "Heater" },
            { "name": "Orphan" }
        ])))
        .mount(server)
        .await;
}

// ── Station ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_station_identity() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;

    let client = client_for(&server, password());
    assert_eq!(client.station_id().await.unwrap(), "ST-1");
    assert_eq!(client.ac_serial().await.unwrap(), None, "no AC charger flag");
    assert_eq!(client.dc_serial().await.unwrap(), Some("DC-1".to_owned()));
}

// ── Modes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_current_mode_label_for_custom_profile() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;
    mount_modes(&server).await;

    Mock::given(method("GET"))
        .and(path("/device/energy-profile/mode/current/ST-1"))
        .respond_with(ok(json!({ "currentMode": 9, "currentProfileId": 42 })))
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    assert_eq!(client.current_mode_label().await.unwrap(), "Night Charge");
}

#[tokio::test]
async fn test_unmatched_mode_is_unknown() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;
    mount_modes(&server).await;

    Mock::given(method("GET"))
        .and(path("/device/energy-profile/mode/current/ST-1"))
        .respond_with(ok(json!({ "currentMode": 7, "currentProfileId": -1 })))
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    assert_eq!(client.current_mode_label().await.unwrap(), "Unknown mode");
}

#[tokio::test]
async fn test_set_mode_by_name() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;
    mount_modes(&server).await;

    Mock::given(method("PUT"))
        .and(path("/device/energy-profile/mode"))
        .and(body_json(json!({ "stationId": "ST-1", "operationMode": 5, "profileId": -1 })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/device/energy-profile/mode"))
        .and(body_json(json!({ "stationId": "ST-1", "operationMode": 9, "profileId": 42 })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    client.set_mode_by_name("fully_feed_in").await.unwrap();
    client.set_mode_by_name("Night Charge").await.unwrap();

    let err = client.set_mode_by_name("turbo").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_set_mode_sends_numeric_station_id_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access_token": "acc", "refresh_token": "ref", "expires_in": 43199 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device/owner/station/home"))
        .respond_with(ok(json!({ "stationId": 1234 })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/device/energy-profile/mode"))
        .and(body_json(json!({ "stationId": 1234, "operationMode": 5, "profileId": -1 })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    assert_eq!(client.station_id().await.unwrap(), "1234");
    client.set_mode_raw(5, -1).await.unwrap();
}

// ── Smart loads ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_smart_loads_isolate_per_load_failures() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;
    mount_cards(&server).await;

    // Load 1 resolves; load 2's detail lookup fails.
    Mock::given(method("GET"))
        .and(path("/device/tp-device/smart-loads"))
        .and(query_param("loadPath", "1"))
        .respond_with(ok(json!({ "smartLoadId": 501 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device/tp-device/smart-loads"))
        .and(query_param("loadPath", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data-process/sigen/station/statistics/real-time-consumption"))
        .and(query_param("smartLoadId", "501"))
        .respond_with(ok(json!({
            "todayConsumption": "1.50 kWh",
            "monthConsumption": "20.00 kWh"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    let loads = client.smart_loads().await.unwrap();

    assert_eq!(loads.len(), 3);
    assert_eq!(loads[0].name, "Pool Pump");
    assert_eq!(loads[0].smart_load_id, Some(501));
    assert_eq!(loads[0].today_consumption, "1.50 kWh");
    assert_eq!(loads[0].lifetime_consumption, NO_CONSUMPTION);

    assert_eq!(loads[1].smart_load_id, None);
    assert_eq!(loads[1].today_consumption, NO_CONSUMPTION);

    assert_eq!(loads[2].path, None);

    // The id is cached: a second listing does not re-query details for load 1.
    assert_eq!(client.cached_smart_load_id(1), Some(501));
    client.smart_loads().await.unwrap();
}

#[tokio::test]
async fn test_set_smart_load_by_name() {
    let server = MockServer::start().await;
    mount_login_and_station(&server).await;
    mount_cards(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/device/tp-device/smart-loads/control-mode/manual/switch"))
        .and(query_param("stationId", "ST-1"))
        .and(query_param("loadPath", "2"))
        .and(query_param("manualSwitch", "0"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, password());
    client.set_smart_load_by_name("heater", false).await.unwrap();

    let err = client.set_smart_load_by_name("sauna", true).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

// ── Northbound ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_northbound_requires_credentials() {
    let server = MockServer::start().await;
    let client = client_for(&server, password());

    let err = client.nb_query_mode(Some("S1")).await.unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_northbound_with_key_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openapi/auth/login/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": "{\"accessToken\":\"nb-token\"}"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openapi/instruction/S1/settings"))
        .respond_with(ok(json!({ "energyStorageOperationMode": 6 })))
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        Credentials::AppKey {
            app_key: "my-key".into(),
            app_secret: "my-secret".to_string().into(),
        },
    );
    assert_eq!(client.nb_query_mode(Some("S1")).await.unwrap(), 6);
}

#[tokio::test]
async fn test_stream_needs_settings() {
    let server = MockServer::start().await;
    let client = client_for(&server, password());

    let err = client
        .start_stream(tokio_util::sync::CancellationToken::new())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Config { .. }));
}
