use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::interfaces::transport::TargetTransport;

#[derive(Default)]
pub struct TabTransport {
    targets: RwLock<HashMap<String, mpsc::UnboundedSender<Value>>>,
    active: RwLock<Option<String>>,
}

impl TabTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TargetTransport for TabTransport {
    async fn register(&self, target: &str, channel: mpsc::UnboundedSender<Value>) {
        let mut targets = self.targets.write().await;
        targets.insert(target.to_string(), channel);
    }

    async fn unregister(&self, target: &str, channel: &mpsc::UnboundedSender<Value>) {
        let mut targets = self.targets.write().await;
        let registered = targets
            .get(target)
            .is_some_and(|current| current.same_channel(channel));
        if registered {
            targets.remove(target);
        }
    }

    async fn track(&self, target: &str) {
        let mut active = self.active.write().await;
        *active = Some(target.to_string());
    }

    async fn active_target(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    async fn send(&self, message: Value) {
        let Some(target) = self.active_target().await else {
            debug!("no active target, dropping push");
            return;
        };
        self.send_to(&target, message).await;
    }

    async fn send_to(&self, target: &str, message: Value) {
        let targets = self.targets.read().await;
        match targets.get(target) {
            Some(channel) => {
                if channel.send(message).is_err() {
                    warn!(target_id = %target, "target channel closed, push dropped");
                }
            }
            None => {
                warn!(target_id = %target, "target not registered, push dropped");
            }
        }
    }

    async fn destroy(&self) {
        self.targets.write().await.clear();
        self.active.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn tracks_last_sender() {
        let transport = TabTransport::new();
        transport.track("tab-1").await;
        transport.track("tab-2").await;
        assert_eq!(transport.active_target().await.as_deref(), Some("tab-2"));
    }

    #[tokio::test]
    async fn send_without_target_is_a_noop() {
        let transport = TabTransport::new();
        transport.send(json!({"type": "SPHERE_SEND_TOKENS_RESULT"})).await;
        transport.send_to("gone", json!({})).await;
    }

    #[tokio::test]
    async fn send_routes_to_registered_target() {
        let transport = TabTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register("tab-1", tx).await;
        transport.track("tab-1").await;

        transport.send(json!({"n": 1})).await;
        transport.send_to("tab-1", json!({"n": 2})).await;
        assert_eq!(rx.recv().await.unwrap()["n"], 1);
        assert_eq!(rx.recv().await.unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn stale_handle_cannot_evict_a_replacement() {
        let transport = TabTransport::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        transport.register("tab-1", old_tx.clone()).await;
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        transport.register("tab-1", new_tx.clone()).await;

        transport.unregister("tab-1", &old_tx).await;
        transport.send_to("tab-1", json!({"n": 1})).await;
        assert_eq!(new_rx.recv().await.unwrap()["n"], 1);

        transport.unregister("tab-1", &new_tx).await;
        transport.send_to("tab-1", json!({"n": 2})).await;
        assert!(new_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let transport = TabTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        transport.register("tab-1", tx).await;
        transport.track("tab-1").await;
        transport.destroy().await;
        transport.destroy().await;
        assert!(transport.active_target().await.is_none());
        transport.send_to("tab-1", json!({})).await;
    }
}
