//! §4.4.6 / §6: session lifecycle operations exposed over HTTP.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pith_core::config::DEFAULT_COMPACT_KEEP;
use pith_core::types::SessionId;

use crate::app::AppState;

#[derive(Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

/// POST /session/new — `{}` -> `{"session_id": "<id>"}`.
pub async fn new_session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NewSessionResponse>, (StatusCode, Json<Value>)> {
    let session_id = state
        .runtime
        .new_session()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(NewSessionResponse { session_id: session_id.as_str().to_string() }))
}

#[derive(Deserialize, Default)]
pub struct CompactSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct CompactSessionResponse {
    pub result: String,
}

/// POST /session/compact — `{"session_id"?: string}` -> `{"result": "<msg>"}`.
pub async fn compact_session_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompactSessionRequest>,
) -> Result<Json<CompactSessionResponse>, (StatusCode, Json<Value>)> {
    let session_id = resolve_session_id(&state, req.session_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    let result = state
        .runtime
        .compact_session(&session_id, DEFAULT_COMPACT_KEEP)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(CompactSessionResponse { result }))
}

#[derive(Deserialize)]
pub struct SessionInfoQuery {
    pub session_id: Option<String>,
}

/// GET /session/info?session_id= — full info JSON, §4.4.6.
pub async fn session_info_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionInfoQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let session_id = resolve_session_id(&state, query.session_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    let info = state
        .runtime
        .get_info(&session_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(info))
}

fn resolve_session_id(
    state: &AppState,
    session_id: Option<String>,
) -> pith_store::Result<SessionId> {
    match session_id {
        Some(id) => Ok(SessionId::from(id)),
        None => state.store.ensure_active_session(),
    }
}
