use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use tokio::sync::oneshot;

/// Runtime-local map of in-flight secret requests, keyed by a random 12-char
/// hex request id, per §4.4.5.1 — grounded in the source project's
/// `active_operations: DashMap<String, CancellationToken>` idiom
/// (`skynet-gateway/src/app.rs`), substituting a one-shot value channel for a
/// cancellation token.
#[derive(Default)]
pub struct SecretBroker {
    pending: DashMap<String, oneshot::Sender<String>>,
}

const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

impl SecretBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_request_id() -> String {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Registers a pending request and returns a future that resolves with
    /// the provided value, or `None` on a 60s timeout.
    pub fn register(&self, request_id: &str) -> PendingSecret {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.to_string(), tx);
        PendingSecret { receiver: rx }
    }

    /// Called from `Runtime.provide_secret`: delivers `value` to the waiter,
    /// if one is still pending. Returns `true` if a waiter received it.
    pub fn provide(&self, request_id: &str, value: String) -> bool {
        match self.pending.remove(request_id) {
            Some((_, sender)) => sender.send(value).is_ok(),
            None => false,
        }
    }
}

pub struct PendingSecret {
    receiver: oneshot::Receiver<String>,
}

impl PendingSecret {
    pub async fn wait(self) -> Option<String> {
        tokio::time::timeout(WAIT_TIMEOUT, self.receiver).await.ok()?.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provide_delivers_value_to_waiter() {
        let broker = SecretBroker::new();
        let id = SecretBroker::generate_request_id();
        assert_eq!(id.len(), 12);
        let pending = broker.register(&id);
        assert!(broker.provide(&id, "s3cr3t".to_string()));
        assert_eq!(pending.wait().await, Some("s3cr3t".to_string()));
    }

    #[tokio::test]
    async fn provide_on_unknown_id_returns_false() {
        let broker = SecretBroker::new();
        assert!(!broker.provide("deadbeefdead", "x".to_string()));
    }
}
