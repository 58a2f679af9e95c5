use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::domains::envelope::{
    ReplyEnvelope, RequestEnvelope, RequestPayload, DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::error::{Result, SphereBridgeError};

type Continuation = oneshot::Sender<Result<Value>>;

// Each verb call emits exactly one correlated request and settles exactly
// once. Clones share one correlation table.
#[derive(Clone)]
pub struct WalletProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    outbound: mpsc::UnboundedSender<Value>,
    table: Mutex<HashMap<String, Continuation>>,
    timeout: Duration,
}

impl WalletProxy {
    pub fn new(outbound: mpsc::UnboundedSender<Value>) -> Self {
        Self::with_timeout(outbound, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub fn with_timeout(outbound: mpsc::UnboundedSender<Value>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                outbound,
                table: Mutex::new(HashMap::new()),
                timeout,
            }),
        }
    }

    pub fn attach(&self, mut incoming: mpsc::UnboundedReceiver<Value>) {
        let proxy = self.clone();
        tokio::spawn(async move {
            while let Some(value) = incoming.recv().await {
                proxy.deliver(value).await;
            }
        });
    }

    // A reply whose id has no entry (duplicate, late, or lost across a page
    // restart) is dropped silently.
    pub async fn deliver(&self, value: Value) {
        let Some(reply) = ReplyEnvelope::from_value(&value) else {
            debug!("unrecognized inbound message ignored");
            return;
        };
        let continuation = self.inner.table.lock().await.remove(&reply.request_id);
        let Some(continuation) = continuation else {
            debug!(request_id = %reply.request_id, "no correlation entry, reply dropped");
            return;
        };
        let outcome = if reply.success {
            Ok(reply.result.unwrap_or(Value::Null))
        } else {
            Err(SphereBridgeError::Execution(
                reply.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        };
        let _ = continuation.send(outcome);
    }

    pub async fn pending_requests(&self) -> usize {
        self.inner.table.lock().await.len()
    }

    pub async fn connect(&self) -> Result<Value> {
        self.call(RequestPayload::Connect).await
    }

    pub async fn get_balances(&self) -> Result<Value> {
        self.call(RequestPayload::GetBalances).await
    }

    pub async fn send_tokens(&self, to: &str, amount: u64, token: Option<&str>) -> Result<Value> {
        self.call(RequestPayload::SendTokens {
            to: to.to_string(),
            amount,
            token: token.map(str::to_string),
        })
        .await
    }

    pub async fn sign_message(&self, message: &str) -> Result<Value> {
        self.call(RequestPayload::SignMessage {
            message: message.to_string(),
        })
        .await
    }

    pub async fn sign_protocol_event(&self, event: Value) -> Result<Value> {
        self.call(RequestPayload::SignProtocolEvent { event }).await
    }

    pub async fn resolve_nametag(&self, name: &str) -> Result<Value> {
        self.call(RequestPayload::ResolveNametag {
            name: name.to_string(),
        })
        .await
    }

    pub async fn check_nametag(&self, name: &str) -> Result<Value> {
        self.call(RequestPayload::CheckNametag {
            name: name.to_string(),
        })
        .await
    }

    pub async fn register_nametag(&self, name: &str) -> Result<Value> {
        self.call(RequestPayload::RegisterNametag {
            name: name.to_string(),
        })
        .await
    }

    async fn call(&self, payload: RequestPayload) -> Result<Value> {
        let request = RequestEnvelope::new(payload);
        let request_id = request.request_id.clone();

        let (tx, rx) = oneshot::channel();
        self.inner.table.lock().await.insert(request_id.clone(), tx);

        let value = match request.to_value() {
            Ok(value) => value,
            Err(err) => {
                self.forget(&request_id).await;
                return Err(err);
            }
        };
        if self.inner.outbound.send(value).is_err() {
            self.forget(&request_id).await;
            return Err(SphereBridgeError::Transport(
                "outbound channel closed".to_string(),
            ));
        }

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SphereBridgeError::Transport(
                "reply channel dropped".to_string(),
            )),
            Err(_) => {
                self.forget(&request_id).await;
                Err(SphereBridgeError::Timeout(
                    self.inner.timeout.as_millis() as u64
                ))
            }
        }
    }

    async fn forget(&self, request_id: &str) {
        self.inner.table.lock().await.remove(request_id);
    }
}
