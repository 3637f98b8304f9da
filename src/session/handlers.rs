//! Axum routes exposed by a session's unix-domain socket.
use super::Session;
use crate::lsp::capability::{self, *};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/shutdown", post(shutdown))
        .route("/locate", post(handle_locate))
        .route("/definition", post(handle_definition))
        .route("/hover", post(handle_hover))
        .route("/reference", post(handle_reference))
        .route("/outline", post(handle_outline))
        .route("/symbol", post(handle_symbol))
        .route("/search", post(handle_search))
        .route("/rename/preview", post(handle_rename_preview))
        .route("/rename/execute", post(handle_rename_execute))
        .with_state(session)
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown(State(session): State<Arc<Session>>) -> StatusCode {
    session.stop();
    StatusCode::OK
}

fn internal_error(err: anyhow::Error) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "detail": err.to_string() }))).into_response()
}

fn not_supported(capability: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "detail": format!("language server does not support {capability}") })),
    )
        .into_response()
}

macro_rules! capability_handler {
    ($name:ident, $req_ty:ty, $caps_field:ident, $cap_name:literal, $call:expr) => {
        async fn $name(
            State(session): State<Arc<Session>>,
            Json(req): Json<$req_ty>,
        ) -> Response {
            session.reset_deadline().await;
            let lang = session.language_kind;
            let supports = session
                .with_process(|proc| Ok(proc.capabilities.$caps_field))
                .await;
            match supports {
                Ok(true) => {}
                Ok(false) => return not_supported($cap_name),
                Err(e) => return internal_error(e),
            }
            let result = session
                .with_process(move |proc| $call(proc, lang, &req))
                .await;
            match result {
                Ok(Some(resp)) => Json(resp).into_response(),
                Ok(None) => StatusCode::NO_CONTENT.into_response(),
                Err(e) => internal_error(e),
            }
        }
    };
}

capability_handler!(handle_definition, DefinitionRequest, definition, "definition", capability::definition);
capability_handler!(handle_hover, HoverRequest, hover, "hover", capability::hover);
capability_handler!(handle_reference, ReferenceRequest, references, "reference", capability::reference);
capability_handler!(handle_outline, OutlineRequest, document_symbol, "outline", capability::outline);

async fn handle_symbol(State(session): State<Arc<Session>>, Json(req): Json<SymbolRequest>) -> Response {
    session.reset_deadline().await;
    let lang = session.language_kind;
    let supports = session
        .with_process(|proc| Ok(proc.capabilities.document_symbol))
        .await;
    match supports {
        Ok(true) => {}
        Ok(false) => return not_supported("symbol"),
        Err(e) => return internal_error(e),
    }
    match session.with_process(move |proc| capability::symbol(proc, lang, &req)).await {
        Ok(Some(resp)) => Json(resp).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn handle_search(State(session): State<Arc<Session>>, Json(req): Json<SearchRequest>) -> Response {
    session.reset_deadline().await;
    let supports = session
        .with_process(|proc| Ok(proc.capabilities.workspace_symbol))
        .await;
    match supports {
        Ok(true) => {}
        Ok(false) => return not_supported("search"),
        Err(e) => return internal_error(e),
    }
    match session.with_process(move |proc| capability::search(proc, &req)).await {
        Ok(Some(resp)) => Json(resp).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn handle_rename_preview(State(session): State<Arc<Session>>, Json(req): Json<RenameRequest>) -> Response {
    session.reset_deadline().await;
    let lang = session.language_kind;
    let supports = session.with_process(|proc| Ok(proc.capabilities.rename)).await;
    match supports {
        Ok(true) => {}
        Ok(false) => return not_supported("rename"),
        Err(e) => return internal_error(e),
    }
    match session.with_process(move |proc| capability::rename_preview(proc, lang, &req)).await {
        Ok(Some(resp)) => Json(resp).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn handle_rename_execute(State(session): State<Arc<Session>>, Json(req): Json<RenameRequest>) -> Response {
    session.reset_deadline().await;
    let lang = session.language_kind;
    let supports = session.with_process(|proc| Ok(proc.capabilities.rename)).await;
    match supports {
        Ok(true) => {}
        Ok(false) => return not_supported("rename"),
        Err(e) => return internal_error(e),
    }
    match session.with_process(move |proc| capability::rename_execute(proc, lang, &req)).await {
        Ok(Some(resp)) => Json(resp).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn handle_locate(State(session): State<Arc<Session>>, Json(req): Json<LocateRequest>) -> Response {
    session.reset_deadline().await;
    match capability::locate(&req) {
        Ok(Some(resp)) => Json(resp).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}
