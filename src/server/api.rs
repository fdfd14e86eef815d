//! HTTP control API
//!
//! Three routes over the [`SessionManager`]: `POST /start_stream`,
//! `POST /stop_stream` and `GET /list_streams`. Every error answers with
//! `{"error": "<message>"}`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::registry::RegistryError;
use crate::session::{SessionManager, StartError, StopError};
use crate::stats::StatsSnapshot;

/// Build the control router
pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/start_stream", post(start_stream))
        .route("/stop_stream", post(stop_stream))
        .route("/list_streams", get(list_streams))
        .with_state(manager)
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    stream_name: Option<String>,
    #[serde(default, alias = "youtube_url")]
    destination: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StopRequest {
    #[serde(default)]
    stream_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct StreamInfo {
    destination: String,
    uptime: f64,
    state: &'static str,
    stats: StatsSnapshot,
}

/// Error type for control API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or missing fields
    BadRequest(String),
    /// Session start failed
    Start(StartError),
    /// Session stop failed
    Stop(StopError),
}

impl From<StartError> for ApiError {
    fn from(e: StartError) -> Self {
        ApiError::Start(e)
    }
}

impl From<StopError> for ApiError {
    fn from(e: StopError) -> Self {
        ApiError::Stop(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Start(StartError::Admission(e)) | ApiError::Stop(StopError::NotFound(e)) => {
                registry_status(e)
            }
            ApiError::Start(StartError::DownstreamSetup(_) | StartError::Overlay(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Start(StartError::DownstreamSetup(_)) => "Failed to start match monitoring".to_string(),
            ApiError::Start(e) => e.to_string(),
            ApiError::Stop(e) => e.to_string(),
        }
    }
}

fn registry_status(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::InvalidId(_) => StatusCode::BAD_REQUEST,
        RegistryError::DuplicateSession(_) => StatusCode::CONFLICT,
        RegistryError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Treat empty strings like absent fields
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn start_stream(
    State(manager): State<Arc<SessionManager>>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (Some(id), Some(destination)) = (required(request.stream_name), required(request.destination)) else {
        tracing::warn!("Missing destination or stream_name in start request");
        return Err(ApiError::BadRequest("Missing destination or stream_name".to_string()));
    };

    tracing::info!(session = %id, "Received request to start stream");

    let entry = manager.start(&id, destination).await.inspect_err(|e| {
        tracing::warn!(session = %id, error = %e, "Start request rejected");
    })?;

    Ok(Json(json!({
        "message": format!("Stream {} started successfully", entry.id()),
        "destination": entry.destination(),
    })))
}

async fn stop_stream(
    State(manager): State<Arc<SessionManager>>,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let Some(id) = required(request.stream_name) else {
        tracing::warn!("Missing stream_name in stop request");
        return Err(ApiError::BadRequest("Missing stream_name".to_string()));
    };

    tracing::info!(session = %id, "Received request to stop stream");

    let outcome = manager.stop(&id).await.inspect_err(|e| {
        tracing::warn!(session = %id, error = %e, "Stop request rejected");
    })?;

    tracing::info!(
        session = %id,
        state = %outcome.state,
        runtime_secs = outcome.runtime.as_secs_f64(),
        "Stream stopped"
    );

    Ok(Json(json!({
        "message": format!("Stream {} stopped successfully", id),
        "state": outcome.state.as_str(),
        "runtime": outcome.runtime.as_secs_f64(),
    })))
}

async fn list_streams(State(manager): State<Arc<SessionManager>>) -> Json<BTreeMap<String, StreamInfo>> {
    let streams = manager
        .list()
        .await
        .into_iter()
        .map(|summary| {
            let info = StreamInfo {
                destination: summary.destination,
                uptime: summary.uptime.as_secs_f64(),
                state: summary.phase.as_str(),
                stats: summary.stats,
            };
            (summary.id.to_string(), info)
        })
        .collect();

    Json(streams)
}
