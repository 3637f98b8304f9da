use crate::manager::Manager;
use crate::session::SessionInfo;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub shutdown: CancellationToken,
}

pub fn router(manager: Arc<Manager>, shutdown: CancellationToken) -> Router {
    let state = AppState { manager, shutdown };
    Router::new()
        .route("/create", post(create))
        .route("/delete", delete(delete_session))
        .route("/list", get(list))
        .route("/shutdown", post(shutdown_route))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub uds_path: PathBuf,
    pub info: SessionInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub info: Option<SessionInfo>,
}

fn error_response(status: StatusCode, err: &anyhow::Error) -> Response {
    (status, Json(serde_json::json!({ "detail": err.to_string() }))).into_response()
}

async fn create(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> Response {
    let manager = &state.manager;
    match manager.create(&req.path).await {
        Ok(uds_path) => match manager.inspect(&req.path).await {
            Ok(Some(info)) => (StatusCode::CREATED, Json(CreateResponse { uds_path, info })).into_response(),
            Ok(None) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        },
        Err(e) => {
            let status = if e.downcast_ref::<crate::error::LspCliError>().is_some_and(|le| {
                matches!(le, crate::error::LspCliError::UnsupportedPath { .. })
            }) {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, &e)
        }
    }
}

async fn delete_session(State(state): State<AppState>, Json(req): Json<DeleteRequest>) -> Response {
    match state.manager.delete(&req.path).await {
        Ok(info) => Json(DeleteResponse { info }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn list(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.manager.list().await)
}

async fn shutdown_route(State(state): State<AppState>) -> StatusCode {
    state.manager.stop_all().await;
    state.shutdown.cancel();
    StatusCode::OK
}
