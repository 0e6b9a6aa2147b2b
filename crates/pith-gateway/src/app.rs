//! Shared state passed to every Axum handler, per §4.5.1 — grounded in the
//! source project's `skynet-gateway/src/app.rs` `AppState`/`build_router`
//! shape, narrowed to this project's three collaborators.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use pith_agent::Runtime;
use pith_core::config::PithConfig;
use pith_store::Store;

/// Central shared state.
pub struct AppState {
    pub store: Arc<Store>,
    pub runtime: Arc<Runtime>,
    pub config: PithConfig,
    /// In-flight `/chat` SSE streams, keyed by session id. Cancelled when the
    /// client drops the response body, per §4.5.1 / §5 "Cancellation".
    pub active_chats: DashMap<String, CancellationToken>,
}

impl AppState {
    pub fn new(store: Arc<Store>, runtime: Arc<Runtime>, config: PithConfig) -> Self {
        Self { store, runtime, config, active_chats: DashMap::new() }
    }
}

/// Assemble the full Axum router, per §6's HTTP API table.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/session/new", post(crate::http::session::new_session_handler))
        .route("/session/compact", post(crate::http::session::compact_session_handler))
        .route("/session/info", get(crate::http::session::session_info_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route("/secret/provide", post(crate::http::secret::secret_provide_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pith_agent::provider::EchoProvider;
    use pith_core::config::AgentConfig;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        let config = AgentConfig::default();
        let runtime = Arc::new(
            Runtime::new(dir.to_path_buf(), Box::new(EchoProvider), &config, "mcp").unwrap(),
        );
        runtime.initialize().await.unwrap();
        let store = runtime.store.clone();
        Arc::new(AppState::new(store, runtime, PithConfig::default()))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let router = build_router(test_state(dir.path()).await);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn session_new_returns_fresh_id() {
        let dir = TempDir::new().unwrap();
        let router = build_router(test_state(dir.path()).await);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/session/new")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(!json["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_streams_done_frame_with_echoed_text() {
        let dir = TempDir::new().unwrap();
        let router = build_router(test_state(dir.path()).await);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "hello there"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: done"));
        assert!(text.contains("echo: hello there"));
    }

    #[tokio::test]
    async fn secret_provide_accepts_unknown_request_id() {
        let dir = TempDir::new().unwrap();
        let router = build_router(test_state(dir.path()).await);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/secret/provide")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"request_id": "deadbeef1234", "value": "x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
    }
}
