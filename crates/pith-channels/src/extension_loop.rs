//! Adapter loop for workspace-defined channel plugins (`extensions/channels/*.lua`,
//! per §4.2/§4.6). These don't implement the `Channel` trait directly: their
//! `send(incoming, text)` entry point needs the original inbound record back,
//! which the trait's `send(&OutboundMessage)` shape has no room for — so this
//! loop talks to `pith_extensions::LuaChannelSession` directly instead of
//! going through an ill-fitting `Channel` impl.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::error;

use pith_extensions::LuaChannelSession;

use crate::run_loop::InboundText;

const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `connect(); loop { record = recv(); chat; send(record, reply) }`
/// forever against a loaded Lua channel plugin. `chat` is supplied by the
/// caller (the gateway binary), closing over `Runtime::chat`.
pub async fn run_extension_channel_loop<F, Fut>(
    name: &str,
    session: LuaChannelSession,
    mut chat: F,
) -> Result<(), pith_extensions::ExtensionError>
where
    F: FnMut(InboundText) -> Fut,
    Fut: std::future::Future<Output = Result<String, pith_extensions::ExtensionError>>,
{
    let session = Arc::new(Mutex::new(session));

    {
        let session = session.clone();
        tokio::task::spawn_blocking(move || session.blocking_lock().connect())
            .await
            .map_err(|e| pith_extensions::ExtensionError::Channel(format!("connect task panicked: {e}")))??;
    }

    loop {
        let record = {
            let session = session.clone();
            tokio::task::spawn_blocking(move || session.blocking_lock().recv())
                .await
                .map_err(|e| pith_extensions::ExtensionError::Channel(format!("recv task panicked: {e}")))?
        };

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                error!(channel = name, error = %e, "extension channel recv failed");
                sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        let text = record.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        if text.trim().is_empty() {
            continue;
        }

        let input = InboundText { channel: name.to_string(), sender_id: String::new(), text: text.clone() };

        match chat(input).await {
            Ok(reply) => {
                let session = session.clone();
                let record = record.clone();
                let send_result = tokio::task::spawn_blocking(move || session.blocking_lock().send(&record, &reply))
                    .await
                    .map_err(|e| pith_extensions::ExtensionError::Channel(format!("send task panicked: {e}")))?;
                if let Err(e) = send_result {
                    error!(channel = name, error = %e, "extension channel send failed");
                    sleep(ERROR_BACKOFF).await;
                }
            }
            Err(e) => {
                error!(channel = name, error = %e, "extension channel chat dispatch failed");
                sleep(ERROR_BACKOFF).await;
            }
        }
    }
}
