//! §4.4.5 step 4 / §6: `POST /secret/provide` delivers a value to the
//! `store_secret` tool call waiting on it.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct SecretProvideRequest {
    pub request_id: String,
    pub value: String,
}

/// POST /secret/provide — `{"request_id": string, "value": string}` -> `{"ok": true}`.
///
/// `ok` is `true` whether or not a waiter was still pending: the caller
/// learns that the value was accepted, not that a particular tool call saw
/// it (a request that already timed out simply has nowhere to go).
pub async fn secret_provide_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SecretProvideRequest>,
) -> Json<Value> {
    state.runtime.provide_secret(&req.request_id, req.value);
    Json(json!({ "ok": true }))
}
