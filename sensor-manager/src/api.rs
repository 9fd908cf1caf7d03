//! Host HTTP API - sensor views and the OAuth redirect callback.
//!
//! Exposes five routes:
//! - `GET /api/sensors` - every adapter's current view
//! - `GET /api/sensors/:name` - one adapter's view
//! - `POST /api/sensors/:name/authorize` - ask for a new authorization
//! - `GET /api/authorizations` - pending requests and failed adapters
//! - `GET /api/:provider/callback` - OAuth redirect target

use crate::manager::SensorManager;
use crate::prompt::{AuthorizationBoard, AuthorizationFailure, AuthorizationRequest};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use sensorpoll::snapshot::SensorView;
use sensorpoll::AdapterError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Where the browser lands after a completed authorization
pub const AFTER_CALLBACK_REDIRECT: &str = "/api/sensors";

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<SensorManager>,
    pub board: Arc<AuthorizationBoard>,
}

/// Query string of the provider redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Body of `GET /api/authorizations`.
#[derive(Debug, Serialize)]
pub struct AuthorizationsResponse {
    pub pending: Vec<AuthorizationRequest>,
    pub failures: Vec<AuthorizationFailure>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn list_sensors(State(state): State<ApiState>) -> Json<Vec<SensorView>> {
    Json(state.manager.views().await)
}

async fn get_sensor(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<SensorView>, AppError> {
    let adapter = state
        .manager
        .find(&name)
        .ok_or_else(|| AppError::NotFound(format!("no sensor named '{}'", name)))?;
    Ok(Json(adapter.view().await))
}

async fn authorize_sensor(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<AuthorizationRequest>), AppError> {
    state
        .manager
        .begin_authorization(&name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no sensor named '{}'", name)))??;

    let request = state
        .board
        .pending()
        .into_iter()
        .find(|r| r.adapter == name)
        .ok_or_else(|| AppError::Upstream(format!("no authorization request recorded for '{}'", name)))?;

    info!(adapter = %name, "Authorization requested through the API");
    Ok((StatusCode::ACCEPTED, Json(request)))
}

async fn list_authorizations(State(state): State<ApiState>) -> Json<AuthorizationsResponse> {
    Json(AuthorizationsResponse {
        pending: state.board.pending(),
        failures: state.board.failures(),
    })
}

async fn oauth_callback(
    State(state): State<ApiState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    if let Some(error) = params.error {
        warn!(provider = %provider, error = %error, "Provider denied authorization");
        return Err(AppError::BadRequest(format!("authorization denied: {}", error)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing code parameter".to_string()))?;
    let csrf_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("missing state parameter".to_string()))?;

    let adapter = state
        .manager
        .handle_callback(&provider, &code, &csrf_state)
        .await?;

    info!(provider = %provider, adapter = %adapter, "Authorization callback completed");
    Ok(Redirect::to(AFTER_CALLBACK_REDIRECT))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

enum AppError {
    BadRequest(String),
    NotFound(String),
    Upstream(String),
}

impl From<AdapterError> for AppError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Authorization(_) => AppError::BadRequest(e.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(ErrorResponse { error: msg })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/:name", get(get_sensor))
        .route("/api/sensors/:name/authorize", post(authorize_sensor))
        .route("/api/authorizations", get(list_authorizations))
        .route("/api/:provider/callback", get(oauth_callback))
        .with_state(state)
}
