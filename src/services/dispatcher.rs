use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::domains::envelope::{
    now_ms, PendingData, PendingTransaction, PopupRequest, ReplyEnvelope, RequestEnvelope,
    RequestPayload,
};
use crate::error::{Result, SphereBridgeError};
use crate::interfaces::transport::TargetTransport;
use crate::interfaces::wallet::WalletVault;
use crate::providers::pending::PendingStore;

#[derive(Debug, Clone, Serialize)]
pub struct BridgeEvent {
    pub event_type: String,
    pub origin: String,
    pub payload: Value,
    pub timestamp: i64,
}

// `Pending` means the request was enqueued for approval and no terminal
// reply exists yet.
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(ReplyEnvelope),
    Pending,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub origin: String,
    pub target: String,
}

pub struct Dispatcher {
    wallet: Arc<dyn WalletVault>,
    pending: Arc<PendingStore>,
    transport: Arc<dyn TargetTransport>,
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl Dispatcher {
    pub fn new(
        wallet: Arc<dyn WalletVault>,
        pending: Arc<PendingStore>,
        transport: Arc<dyn TargetTransport>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            wallet,
            pending,
            transport,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    // The returned sender is the proof of registration; close_channel only
    // unregisters while it still holds the slot.
    pub async fn open_channel(
        &self,
        target: &str,
    ) -> (mpsc::UnboundedSender<Value>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.transport.register(target, tx.clone()).await;
        (tx, rx)
    }

    pub async fn close_channel(&self, target: &str, channel: &mpsc::UnboundedSender<Value>) {
        self.transport.unregister(target, channel).await;
    }

    pub async fn handle_request(
        &self,
        request: RequestEnvelope,
        ctx: RequestContext,
    ) -> Result<DispatchOutcome> {
        self.transport.track(&ctx.target).await;

        let kind = request.payload.kind();
        debug!(
            request_id = %request.request_id,
            wire = kind.wire_type(),
            origin = %ctx.origin,
            "dispatching request"
        );

        if kind.requires_approval() {
            let data = request.payload.clone().into_pending_data().ok_or_else(|| {
                SphereBridgeError::Validation(format!(
                    "{} has no pending form",
                    kind.wire_type()
                ))
            })?;
            let entry = PendingTransaction {
                request_id: request.request_id.clone(),
                origin: ctx.origin.clone(),
                target: ctx.target.clone(),
                timestamp: now_ms(),
                data,
            };
            self.pending.add(entry).await?;
            return Ok(DispatchOutcome::Pending);
        }

        let reply = match self.execute_auto(&request.payload).await {
            Ok(result) => ReplyEnvelope::response_ok(kind, &request.request_id, result),
            Err(err) => ReplyEnvelope::response_err(kind, &request.request_id, err.to_string()),
        };
        Ok(DispatchOutcome::Completed(reply))
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingTransaction>> {
        self.pending.list().await
    }

    // Exactly one Result push per decision, to the target recorded on the
    // entry.
    pub async fn approve(&self, request_id: &str) -> Result<()> {
        let entry = self
            .pending
            .remove_by_request_id(request_id)
            .await?
            .ok_or_else(|| {
                SphereBridgeError::NotFound(format!("no pending transaction {request_id}"))
            })?;

        let kind = entry.kind();
        let reply = match self.execute_pending(&entry).await {
            Ok(result) => ReplyEnvelope::result_ok(kind, request_id, result),
            Err(err) => ReplyEnvelope::result_err(kind, request_id, err.to_string()),
        };
        self.push_result(&entry, reply).await;
        Ok(())
    }

    pub async fn reject(&self, request_id: &str) -> Result<()> {
        let entry = self
            .pending
            .remove_by_request_id(request_id)
            .await?
            .ok_or_else(|| {
                SphereBridgeError::NotFound(format!("no pending transaction {request_id}"))
            })?;

        let reply = ReplyEnvelope::result_err(entry.kind(), request_id, "user rejected the request");
        self.push_result(&entry, reply).await;
        Ok(())
    }

    pub async fn handle_popup(&self, message: Value) -> Value {
        let request: PopupRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(err) => {
                return json!({
                    "type": "POPUP_ERROR_RESPONSE",
                    "success": false,
                    "error": err.to_string(),
                });
            }
        };

        match request {
            PopupRequest::ListPending => match self.list_pending().await {
                Ok(entries) => json!({
                    "type": "POPUP_LIST_PENDING_RESPONSE",
                    "success": true,
                    "pending": entries,
                }),
                Err(err) => json!({
                    "type": "POPUP_LIST_PENDING_RESPONSE",
                    "success": false,
                    "error": err.to_string(),
                }),
            },
            PopupRequest::Approve { request_id } => {
                let response_for = |success: bool, error: Option<String>| {
                    json!({
                        "type": "POPUP_APPROVE_TRANSACTION_RESPONSE",
                        "requestId": request_id,
                        "success": success,
                        "error": error,
                    })
                };
                match self.approve(&request_id).await {
                    Ok(()) => response_for(true, None),
                    Err(err) => response_for(false, Some(err.to_string())),
                }
            }
            PopupRequest::Reject { request_id } => {
                let response_for = |success: bool, error: Option<String>| {
                    json!({
                        "type": "POPUP_REJECT_TRANSACTION_RESPONSE",
                        "requestId": request_id,
                        "success": success,
                        "error": error,
                    })
                };
                match self.reject(&request_id).await {
                    Ok(()) => response_for(true, None),
                    Err(err) => response_for(false, Some(err.to_string())),
                }
            }
        }
    }

    async fn execute_auto(&self, payload: &RequestPayload) -> Result<Value> {
        match payload {
            RequestPayload::Connect => {
                let address = self.wallet.address().await?;
                Ok(json!({ "address": address }))
            }
            RequestPayload::GetBalances => {
                let balances = self.wallet.balances().await?;
                serde_json::to_value(balances)
                    .map_err(|e| SphereBridgeError::Serialization(e.to_string()))
            }
            RequestPayload::ResolveNametag { name } => {
                let address = self.wallet.resolve_nametag(name).await?;
                Ok(json!({ "name": name, "address": address }))
            }
            RequestPayload::CheckNametag { name } => {
                let available = self.wallet.nametag_available(name).await?;
                Ok(json!({ "name": name, "available": available }))
            }
            other => Err(SphereBridgeError::Validation(format!(
                "{} is not auto-executed",
                other.kind().wire_type()
            ))),
        }
    }

    async fn execute_pending(&self, entry: &PendingTransaction) -> Result<Value> {
        let result = match &entry.data {
            PendingData::Transfer { to, amount, token } => {
                let receipt = self
                    .wallet
                    .send_tokens(to, *amount, token.as_deref())
                    .await
                    .map_err(|e| SphereBridgeError::Execution(e.to_string()))?;
                let result = serde_json::to_value(&receipt)
                    .map_err(|e| SphereBridgeError::Serialization(e.to_string()))?;
                self.emit("balances", &entry.origin, result.clone());
                result
            }
            PendingData::SignMessage { message } => {
                let signed = self
                    .wallet
                    .sign_message(message)
                    .await
                    .map_err(|e| SphereBridgeError::Execution(e.to_string()))?;
                serde_json::to_value(&signed)
                    .map_err(|e| SphereBridgeError::Serialization(e.to_string()))?
            }
            PendingData::SignProtocolEvent { event } => self
                .wallet
                .sign_protocol_event(event)
                .await
                .map_err(|e| SphereBridgeError::Execution(e.to_string()))?,
            PendingData::RegisterNametag { name } => {
                let receipt = self
                    .wallet
                    .register_nametag(name)
                    .await
                    .map_err(|e| SphereBridgeError::Execution(e.to_string()))?;
                let result = serde_json::to_value(&receipt)
                    .map_err(|e| SphereBridgeError::Serialization(e.to_string()))?;
                self.emit("identity", &entry.origin, json!({ "name": name }));
                result
            }
        };
        Ok(result)
    }

    async fn push_result(&self, entry: &PendingTransaction, reply: ReplyEnvelope) {
        match reply.to_value() {
            Ok(value) => self.transport.send_to(&entry.target, value).await,
            Err(err) => {
                warn!(request_id = %entry.request_id, error = %err, "result push failed to serialize");
            }
        }
    }

    fn emit(&self, event_type: &str, origin: &str, payload: Value) {
        let event = BridgeEvent {
            event_type: event_type.to_string(),
            origin: origin.to_string(),
            payload,
            timestamp: now_ms(),
        };
        let _ = self.event_tx.send(event);
    }
}
