//! `/api/logging` endpoints (ambient stack, SPEC_FULL §6.1): inspect and
//! change the reloadable `tracing` filter, and stream log events in real
//! time. Grounded in the teacher's `api::routes::logging` (config
//! get/set, WebSocket tail) but dropping its archive/zip file-download
//! surface, since that depends on `prost`/`zip` crates this workspace does
//! not carry (see DESIGN.md).

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::logging::available_modules;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub modules: Vec<ModuleInfo>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateLogFilterRequest {
    pub directive: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config).post(set_filter))
        .route("/stream", get(stream))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<LoggingConfigResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("dynamic logging is not configured"))?;

    Ok(Json(LoggingConfigResponse {
        filter: config.get_filter(),
        modules: available_modules()
            .into_iter()
            .map(|(name, description)| ModuleInfo { name: name.to_string(), description: description.to_string() })
            .collect(),
    }))
}

async fn set_filter(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("dynamic logging is not configured"))?;

    config.set_filter(&request.directive).map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(LoggingConfigResponse {
        filter: config.get_filter(),
        modules: available_modules()
            .into_iter()
            .map(|(name, description)| ModuleInfo { name: name.to_string(), description: description.to_string() })
            .collect(),
    }))
}

async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let config = state
        .logging_config
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("dynamic logging is not configured"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, config)))
}

async fn handle_socket(socket: WebSocket, config: std::sync::Arc<crate::logging::LoggingConfig>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = config.subscribe();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(log_event) => {
                        let payload = serde_json::to_string(&log_event).unwrap_or_default();
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }
}
