// Integration tests for the sensor API routes

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sensor_manager::api::{create_router, ApiState};
use sensor_manager::registry::{build_teksavvy, build_withings, AdapterDeps};
use sensor_manager::{AdapterState, AuthorizationBoard, AuthorizationPrompt, SensorManager, TickOutcome};
use sensorpoll::config::{GeneralConfig, TeksavvyConfig, WithingsConfig};
use sensorpoll::http::mock::ScriptedHttpClient;
use sensorpoll::http::Method;
use sensorpoll::oauth::StateManager;
use sensorpoll::AdapterError;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const USAGE_URL: &str = "https://api.teksavvy.com/web/Usage/UsageSummaryRecords";
const TOKEN_URL: &str = "https://account.withings.com/oauth2/token";
const MEASURE_URL: &str = "https://wbsapi.withings.net/measure";
const DEVICE_URL: &str = "https://wbsapi.withings.net/v2/user";

struct TestApp {
    app: Router,
    manager: Arc<SensorManager>,
    board: Arc<AuthorizationBoard>,
    http: Arc<ScriptedHttpClient>,
    _dir: TempDir,
}

fn create_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(ScriptedHttpClient::new());
    let board = Arc::new(AuthorizationBoard::new());
    let states = StateManager::default();
    let deps = AdapterDeps {
        http: http.clone(),
        prompt: board.clone(),
        states: states.clone(),
    };
    let general = GeneralConfig {
        config_dir: dir.path().to_path_buf(),
        ..GeneralConfig::default()
    };

    let adapters = vec![
        build_withings(
            &WithingsConfig {
                client_id: "wid".to_string(),
                client_secret: "ws".to_string(),
                poll_interval_secs: 1800,
            },
            &general,
            &deps,
        ),
        build_teksavvy(
            &TeksavvyConfig {
                api_key: "k".to_string(),
                poll_interval_secs: 1800,
            },
            &deps,
        ),
    ];
    let manager = Arc::new(SensorManager::new(adapters, states));
    let app = create_router(ApiState {
        manager: Arc::clone(&manager),
        board: Arc::clone(&board),
    });

    TestApp {
        app,
        manager,
        board,
        http,
        _dir: dir,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// GET /api/sensors lists every adapter, including ones never polled.
#[tokio::test]
async fn test_list_sensors() {
    let t = create_test_app();
    t.http.respond(
        Method::Get,
        USAGE_URL,
        200,
        r#"{"value":[{"OID":"X","IsCurrent":true,"OnPeakDownload":120.5}]}"#,
    );
    let teksavvy = t.manager.find("teksavvy").unwrap();
    teksavvy.initialize().await.unwrap();
    teksavvy.tick().await;

    let response = t.app.oneshot(get("/api/sensors")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sensors = json_body(response).await;
    let sensors = sensors.as_array().unwrap();
    assert_eq!(sensors.len(), 2);

    assert_eq!(sensors[0]["name"], "withings");
    assert_eq!(sensors[0]["state"], 0.0);
    assert_eq!(sensors[0]["adapter_state"], "uninitialized");
    assert!(sensors[0].get("fetched_at").is_none());

    assert_eq!(sensors[1]["name"], "teksavvy");
    assert_eq!(sensors[1]["state"], 120.5);
    assert_eq!(sensors[1]["unit"], "GB");
    assert_eq!(sensors[1]["label"], "teksavvy_X");
    assert_eq!(sensors[1]["attributes"]["on_peak_download"], 120.5);
}

/// GET /api/sensors/:name returns 404 for unknown sensors.
#[tokio::test]
async fn test_get_sensor() {
    let t = create_test_app();

    let response = t.app.clone().oneshot(get("/api/sensors/withings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["icon"], "mdi:human");

    let response = t.app.oneshot(get("/api/sensors/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("nope"));
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// GET /api/authorizations shows the pending withings request.
#[tokio::test]
async fn test_pending_authorizations() {
    let t = create_test_app();
    t.manager.find("withings").unwrap().initialize().await.unwrap();

    let response = t.app.oneshot(get("/api/authorizations")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["failures"].as_array().unwrap().is_empty());
    let pending = &body["pending"];
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["adapter"], "withings");
    assert!(pending[0]["url"]
        .as_str()
        .unwrap()
        .contains("redirect_uri=http%3A%2F%2Flocalhost%3A3002%2Fapi%2Fwithings%2Fcallback"));
}

/// The callback completes authorization and redirects to the sensor list.
#[tokio::test]
async fn test_callback_redirects() {
    let t = create_test_app();
    t.http.respond(
        Method::Post,
        TOKEN_URL,
        200,
        r#"{"access_token":"a","refresh_token":"r","expires_in":10800}"#,
    );
    t.manager.find("withings").unwrap().initialize().await.unwrap();
    let url = t.board.pending()[0].url.clone();
    let state = url.split("state=").nth(1).unwrap().to_string();

    let response = t
        .app
        .oneshot(get(&format!("/api/withings/callback?code=abc&state={}", state)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/api/sensors");
    assert!(t.board.pending().is_empty());

    let exchange = &t.http.requests_to(TOKEN_URL)[0];
    assert_eq!(exchange.form_value("code"), Some("abc"));
}

/// Provider-reported errors and missing parameters are 400s.
#[tokio::test]
async fn test_callback_errors() {
    let t = create_test_app();
    t.manager.find("withings").unwrap().initialize().await.unwrap();

    let response = t
        .app
        .clone()
        .oneshot(get("/api/withings/callback?error=access_denied"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("access_denied"));

    let response = t
        .app
        .clone()
        .oneshot(get("/api/withings/callback?state=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .app
        .oneshot(get("/api/withings/callback?code=abc&state=forged"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.http.count(TOKEN_URL), 0);
}

/// Failed adapters are listed next to the pending requests.
#[tokio::test]
async fn test_failures_listed() {
    let t = create_test_app();
    t.board.authorization_failed(
        "questrade",
        &AdapterError::TokenRefresh("invalid_grant".to_string()),
    );

    let response = t.app.oneshot(get("/api/authorizations")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["failures"][0]["adapter"], "questrade");
    assert!(body["failures"][0]["error"]
        .as_str()
        .unwrap()
        .contains("invalid_grant"));
    assert!(body["failures"][0]["failed_at"].is_string());
}

/// POST /api/sensors/:name/authorize issues a fresh authorization request.
#[tokio::test]
async fn test_authorize_route() {
    let t = create_test_app();

    let response = t
        .app
        .clone()
        .oneshot(post("/api/sensors/withings/authorize"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let request = json_body(response).await;
    assert_eq!(request["adapter"], "withings");
    assert!(request["url"].as_str().unwrap().contains("state="));
    assert_eq!(t.board.pending().len(), 1);

    let response = t
        .app
        .clone()
        .oneshot(post("/api/sensors/nope/authorize"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = t
        .app
        .oneshot(post("/api/sensors/teksavvy/authorize"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A revoked refresh token halts polling; authorizing again through the
/// API and the callback brings the adapter back.
#[tokio::test]
async fn test_revoked_credentials_recover_through_api() {
    let t = create_test_app();
    sensorpoll::credentials::CredentialStore::open(t._dir.path(), "withings")
        .save(&sensorpoll::credentials::Credentials {
            access_token: Some("old".to_string()),
            refresh_token: Some("revoked".to_string()),
            expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(1)),
            ..sensorpoll::credentials::Credentials::for_client("wid")
        })
        .unwrap();
    t.http
        .respond(Method::Post, TOKEN_URL, 401, r#"{"error":"invalid_token"}"#)
        .respond(
            Method::Post,
            TOKEN_URL,
            200,
            r#"{"access_token":"a","refresh_token":"r","expires_in":10800}"#,
        );
    t.http.respond(
        Method::Get,
        MEASURE_URL,
        200,
        r#"{"status":0,"body":{"measuregrps":[{"measures":[{"value":80000,"type":1,"unit":-3}]}]}}"#,
    );
    t.http.respond(
        Method::Get,
        DEVICE_URL,
        200,
        r#"{"status":0,"body":{"devices":[{"model":"Body+","deviceid":"d"}]}}"#,
    );

    let withings = t.manager.find("withings").unwrap();
    withings.initialize().await.unwrap();
    assert!(matches!(withings.tick().await, TickOutcome::Halted(_)));

    let response = t.app.clone().oneshot(get("/api/authorizations")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["failures"][0]["adapter"], "withings");

    let response = t
        .app
        .clone()
        .oneshot(post("/api/sensors/withings/authorize"))
        .await
        .unwrap();
    let url = json_body(response).await["url"].as_str().unwrap().to_string();
    let state = url.split("state=").nth(1).unwrap().to_string();

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/api/withings/callback?code=fresh&state={}", state)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(t.board.failures().is_empty());

    assert!(matches!(withings.tick().await, TickOutcome::Updated));
    assert_eq!(withings.state().await, AdapterState::Ready);
    assert_eq!(withings.snapshot().await.value, 80.0);
}
