//! The generic adapter-loop runner, per §4.6: `connect(); loop { recv();
//! dispatch; send() }`, a flat 2s sleep on any error. New code — the source
//! project's Discord/Telegram adapters push events from an internal task
//! instead of exposing a blocking `recv()`, so there is no literal precedent
//! to adapt; written in the same style as `ChannelManager::connect_with_backoff`
//! (`tracing::error!` + `tokio::time::sleep`), with the source project's
//! deterministic-jitter backoff reused only for the initial `connect()` retry
//! (see `manager::connect_with_backoff`), not for steady-state `recv()` errors.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::types::{MessageFormat, OutboundMessage};

const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Drives one channel adapter forever: `connect()`, then repeatedly `recv()`
/// an inbound message, hand its text to `chat` (which returns the reply
/// text), and `send()` the reply back out. Any error — recv, chat, or send —
/// logs and sleeps 2s before the next iteration; `connect()` failure is
/// fatal to the loop (the caller is expected to retry the whole task).
pub async fn run_channel_loop<C, F, Fut>(channel: &mut C, mut chat: F) -> Result<(), ChannelError>
where
    C: Channel + ?Sized,
    F: FnMut(InboundText) -> Fut,
    Fut: Future<Output = Result<String, ChannelError>>,
{
    channel.connect().await?;
    info!(channel = channel.name(), "channel connected, entering recv loop");

    loop {
        let msg = match channel.recv().await {
            Ok(msg) => msg,
            Err(e) => {
                error!(channel = channel.name(), error = %e, "recv failed");
                sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        if msg.content.trim().is_empty() {
            continue;
        }

        let input = InboundText { channel: msg.channel.clone(), sender_id: msg.sender_id.clone(), text: msg.content };

        match chat(input).await {
            Ok(reply_text) => {
                let outbound = OutboundMessage {
                    channel: msg.channel,
                    recipient_id: msg.sender_id,
                    content: reply_text,
                    format: MessageFormat::PlainText,
                };
                if let Err(e) = channel.send(&outbound).await {
                    error!(channel = outbound.channel, error = %e, "send failed");
                    sleep(ERROR_BACKOFF).await;
                }
            }
            Err(e) => {
                error!(error = %e, "chat dispatch failed");
                sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

/// The minimal slice of an inbound message `run_channel_loop` hands to the
/// chat callback — decoupled from `Runtime` so this crate carries no
/// dependency on `pith-agent`; the gateway binary supplies the closure that
/// bridges to `Runtime::chat`.
pub struct InboundText {
    pub channel: String,
    pub sender_id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelStatus, InboundMessage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedChannel {
        messages: Vec<String>,
        next: usize,
        sent: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "test"
        }

        async fn connect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn recv(&mut self) -> Result<InboundMessage, ChannelError> {
            if self.next >= self.messages.len() {
                // Simulate the loop never terminating in production by stalling;
                // tests cap iterations via an external counter instead.
                return Err(ChannelError::ConnectionFailed("exhausted".to_string()));
            }
            let content = self.messages[self.next].clone();
            self.next += 1;
            Ok(InboundMessage {
                channel: "test".to_string(),
                sender_id: "user-1".to_string(),
                sender_name: None,
                content,
                timestamp: "2026-01-01T00:00:00Z".to_string(),
                raw_payload: None,
            })
        }

        async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(msg.content.clone());
            Ok(())
        }

        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    #[tokio::test]
    async fn dispatches_non_empty_message_and_sends_reply() {
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut channel = ScriptedChannel { messages: vec!["hello".to_string()], next: 0, sent: sent.clone() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = run_channel_loop(&mut channel, move |input| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let text = input.text.clone();
            async move { Ok(format!("echo: {text}")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sent.lock().unwrap(), vec!["echo: hello".to_string()]);
    }

    #[tokio::test]
    async fn skips_empty_messages_without_dispatching() {
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut channel = ScriptedChannel { messages: vec!["   ".to_string()], next: 0, sent: sent.clone() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let _ = run_channel_loop(&mut channel, move |_input| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async move { Ok(String::new()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sent.lock().unwrap().is_empty());
    }
}
