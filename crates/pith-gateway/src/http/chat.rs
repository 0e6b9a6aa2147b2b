//! POST /chat — §4.5/§6: decodes the request, drives `Runtime::chat`, and
//! bridges its callbacks to Server-Sent Events through a bounded queue.
//! Grounded in §4.5.1's ambient note: a `Frame` enum maps 1:1 to the SSE
//! event names, fed from a bounded `mpsc::channel` an `async_stream::stream!`
//! drains into `axum::response::sse::Event`s. Client disconnect is detected
//! the way the source project's `/stop` path tracks in-flight work — a
//! `CancellationToken` in a `DashMap` keyed by session id. A clone of that
//! token rides along in `ChatOptions::cancel`, so disconnect doesn't just stop
//! SSE forwarding — it reaches the tool loop itself, which per §5 stops
//! starting any further model call or tool execution (an in-flight tool call
//! is still allowed to finish; its result may simply end up discarded).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pith_agent::runtime::ChatOptions;
use pith_agent::tools::builtin::SecretRequestCallback;
use pith_core::types::SessionId;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// One SSE frame, mapping 1:1 to the `event:` names in §6.
enum Frame {
    Text(String),
    Tool { name: String, args: serde_json::Value },
    ToolResult { name: String, success: bool },
    SecretRequest { request_id: String, name: String },
    Done(String),
    Error(String),
}

impl Frame {
    fn into_event(self) -> Event {
        match self {
            Frame::Text(delta) => sse_json("text", json!({ "delta": delta })),
            Frame::Tool { name, args } => sse_json("tool", json!({ "name": name, "args": args })),
            Frame::ToolResult { name, success } => sse_json("tool_result", json!({ "name": name, "success": success })),
            Frame::SecretRequest { request_id, name } => {
                sse_json("secret_request", json!({ "request_id": request_id, "name": name }))
            }
            Frame::Done(text) => sse_json("done", json!({ "text": text })),
            Frame::Error(message) => sse_json("error", json!({ "message": message })),
        }
    }
}

/// `json!` values are always representable as JSON, so this never hits the
/// `json_data` error path.
fn sse_json(event: &str, data: serde_json::Value) -> Event {
    Event::default().event(event).json_data(data).expect("json! value always serializes")
}

/// POST /chat — `{"message": string, "session_id"?: string, "channel"?: string}` -> `text/event-stream`.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<Frame>(64);

    let session_id = match req.session_id {
        Some(id) => SessionId::from(id),
        None => match state.store.ensure_active_session() {
            Ok(id) => id,
            Err(e) => {
                let _ = tx.try_send(Frame::Error(e.to_string()));
                return sse_from_receiver(rx, None);
            }
        },
    };

    let cancel = CancellationToken::new();
    state.active_chats.insert(session_id.as_str().to_string(), cancel.clone());

    let runtime = state.runtime.clone();
    let session_id_for_task = session_id.clone();
    let channel = req.channel.clone();
    let message = req.message;
    let cancel_for_task = cancel.clone();

    tokio::spawn(async move {
        let text_tx = tx.clone();
        let on_text = move |delta: &str| {
            let _ = text_tx.try_send(Frame::Text(delta.to_string()));
        };

        let call_tx = tx.clone();
        let on_tool_call = move |name: &str, args: &serde_json::Value| {
            let _ = call_tx.try_send(Frame::Tool { name: name.to_string(), args: args.clone() });
        };

        let result_tx = tx.clone();
        let on_tool_result = move |name: &str, success: bool| {
            let _ = result_tx.try_send(Frame::ToolResult { name: name.to_string(), success });
        };

        let secret_tx = tx.clone();
        let on_secret_request: SecretRequestCallback = Arc::new(move |request_id: &str, name: &str| {
            let _ = secret_tx.try_send(Frame::SecretRequest {
                request_id: request_id.to_string(),
                name: name.to_string(),
            });
        });

        let options = ChatOptions {
            session_id: Some(session_id_for_task),
            channel: channel.as_deref(),
            on_text: Some(&on_text),
            on_tool_call: Some(&on_tool_call),
            on_tool_result: Some(&on_tool_result),
            on_secret_request: Some(on_secret_request),
            cancel: Some(&cancel_for_task),
        };

        match runtime.chat(&message, options).await {
            Ok(outcome) => {
                let _ = tx.send(Frame::Done(outcome.text)).await;
            }
            Err(e) => {
                let _ = tx.send(Frame::Error(e.to_string())).await;
            }
        }
    });

    sse_from_receiver(rx, Some((state, session_id.as_str().to_string(), cancel)))
}

fn sse_from_receiver(
    mut rx: mpsc::Receiver<Frame>,
    cleanup: Option<(Arc<AppState>, String, CancellationToken)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        // Dropped when the stream is dropped (client disconnect or terminal
        // frame consumed): cancels the token and clears the registry entry.
        struct Cleanup(Option<(Arc<AppState>, String, CancellationToken)>);
        impl Drop for Cleanup {
            fn drop(&mut self) {
                if let Some((state, session_id, cancel)) = self.0.take() {
                    cancel.cancel();
                    state.active_chats.remove(&session_id);
                }
            }
        }
        let _cleanup = Cleanup(cleanup);

        while let Some(frame) = rx.recv().await {
            let terminal = matches!(frame, Frame::Done(_) | Frame::Error(_));
            yield Ok(frame.into_event());
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
