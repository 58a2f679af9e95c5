use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

// Delivery seam between the dispatcher and relay instances. All sends are
// at-most-once, best-effort: the original caller may legitimately be gone,
// so an unroutable message is logged and dropped.
#[async_trait]
pub trait TargetTransport: Send + Sync {
    async fn register(&self, target: &str, channel: mpsc::UnboundedSender<Value>);

    // Removes the registration only while `channel` is still the one held
    // for `target`. A stale handle cannot evict a successor.
    async fn unregister(&self, target: &str, channel: &mpsc::UnboundedSender<Value>);

    async fn track(&self, target: &str);

    async fn active_target(&self) -> Option<String>;

    async fn send(&self, message: Value);

    async fn send_to(&self, target: &str, message: Value);

    async fn destroy(&self);
}
