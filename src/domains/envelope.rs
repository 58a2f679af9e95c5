use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, SphereBridgeError};

pub const REQUEST_PREFIX: &str = "SPHERE_";
pub const POPUP_PREFIX: &str = "POPUP_";
pub const RESPONSE_SUFFIX: &str = "_RESPONSE";
pub const RESULT_MARKER: &str = "_RESULT";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub fn is_request_type(wire: &str) -> bool {
    wire.starts_with(REQUEST_PREFIX)
        && !wire.ends_with(RESPONSE_SUFFIX)
        && !wire.contains(RESULT_MARKER)
}

pub fn is_response_type(wire: &str) -> bool {
    wire.starts_with(REQUEST_PREFIX) && wire.ends_with(RESPONSE_SUFFIX)
}

pub fn is_result_type(wire: &str) -> bool {
    wire.starts_with(REQUEST_PREFIX)
        && wire.contains(RESULT_MARKER)
        && !wire.ends_with(RESPONSE_SUFFIX)
}

pub fn is_popup_type(wire: &str) -> bool {
    wire.starts_with(POPUP_PREFIX)
}

pub fn wire_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

pub fn request_id_of(value: &Value) -> Option<&str> {
    value.get("requestId").and_then(Value::as_str)
}

// Millisecond timestamp plus a random suffix, unique enough within a process
// lifetime.
pub fn new_request_id() -> String {
    format!("{}-{}", now_ms(), Uuid::new_v4().simple())
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Connect,
    GetBalances,
    SendTokens,
    SignMessage,
    SignProtocolEvent,
    ResolveNametag,
    CheckNametag,
    RegisterNametag,
}

impl RequestKind {
    pub fn wire_type(&self) -> &'static str {
        match self {
            RequestKind::Connect => "SPHERE_CONNECT",
            RequestKind::GetBalances => "SPHERE_GET_BALANCES",
            RequestKind::SendTokens => "SPHERE_SEND_TOKENS",
            RequestKind::SignMessage => "SPHERE_SIGN_MESSAGE",
            RequestKind::SignProtocolEvent => "SPHERE_SIGN_PROTOCOL_EVENT",
            RequestKind::ResolveNametag => "SPHERE_RESOLVE_NAMETAG",
            RequestKind::CheckNametag => "SPHERE_CHECK_NAMETAG",
            RequestKind::RegisterNametag => "SPHERE_REGISTER_NAMETAG",
        }
    }

    pub fn from_wire(wire: &str) -> Option<Self> {
        Some(match wire {
            "SPHERE_CONNECT" => RequestKind::Connect,
            "SPHERE_GET_BALANCES" => RequestKind::GetBalances,
            "SPHERE_SEND_TOKENS" => RequestKind::SendTokens,
            "SPHERE_SIGN_MESSAGE" => RequestKind::SignMessage,
            "SPHERE_SIGN_PROTOCOL_EVENT" => RequestKind::SignProtocolEvent,
            "SPHERE_RESOLVE_NAMETAG" => RequestKind::ResolveNametag,
            "SPHERE_CHECK_NAMETAG" => RequestKind::CheckNametag,
            "SPHERE_REGISTER_NAMETAG" => RequestKind::RegisterNametag,
            _ => return None,
        })
    }

    // The verb-to-policy mapping is static, not data-driven.
    pub fn requires_approval(&self) -> bool {
        matches!(
            self,
            RequestKind::SendTokens
                | RequestKind::SignMessage
                | RequestKind::SignProtocolEvent
                | RequestKind::RegisterNametag
        )
    }

    pub fn response_type(&self) -> String {
        format!("{}{RESPONSE_SUFFIX}", self.wire_type())
    }

    pub fn result_type(&self) -> String {
        format!("{}{RESULT_MARKER}", self.wire_type())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestPayload {
    #[serde(rename = "SPHERE_CONNECT")]
    Connect,
    #[serde(rename = "SPHERE_GET_BALANCES")]
    GetBalances,
    #[serde(rename = "SPHERE_SEND_TOKENS")]
    SendTokens {
        to: String,
        amount: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "SPHERE_SIGN_MESSAGE")]
    SignMessage { message: String },
    #[serde(rename = "SPHERE_SIGN_PROTOCOL_EVENT")]
    SignProtocolEvent { event: Value },
    #[serde(rename = "SPHERE_RESOLVE_NAMETAG")]
    ResolveNametag { name: String },
    #[serde(rename = "SPHERE_CHECK_NAMETAG")]
    CheckNametag { name: String },
    #[serde(rename = "SPHERE_REGISTER_NAMETAG")]
    RegisterNametag { name: String },
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::Connect => RequestKind::Connect,
            RequestPayload::GetBalances => RequestKind::GetBalances,
            RequestPayload::SendTokens { .. } => RequestKind::SendTokens,
            RequestPayload::SignMessage { .. } => RequestKind::SignMessage,
            RequestPayload::SignProtocolEvent { .. } => RequestKind::SignProtocolEvent,
            RequestPayload::ResolveNametag { .. } => RequestKind::ResolveNametag,
            RequestPayload::CheckNametag { .. } => RequestKind::CheckNametag,
            RequestPayload::RegisterNametag { .. } => RequestKind::RegisterNametag,
        }
    }

    // `None` for verbs that execute immediately.
    pub fn into_pending_data(self) -> Option<PendingData> {
        Some(match self {
            RequestPayload::SendTokens { to, amount, token } => {
                PendingData::Transfer { to, amount, token }
            }
            RequestPayload::SignMessage { message } => PendingData::SignMessage { message },
            RequestPayload::SignProtocolEvent { event } => {
                PendingData::SignProtocolEvent { event }
            }
            RequestPayload::RegisterNametag { name } => PendingData::RegisterNametag { name },
            _ => return None,
        })
    }
}

// Wire shape: { type, requestId, ...fields }.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

impl RequestEnvelope {
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            request_id: new_request_id(),
            payload,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| SphereBridgeError::Validation(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| SphereBridgeError::Serialization(e.to_string()))
    }
}

// `…_RESPONSE` in the original round-trip, `…_RESULT` when pushed
// out-of-band after a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyEnvelope {
    pub fn response_ok(kind: RequestKind, request_id: &str, result: Value) -> Self {
        Self {
            kind: kind.response_type(),
            request_id: request_id.to_string(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn response_err(kind: RequestKind, request_id: &str, error: impl Into<String>) -> Self {
        Self {
            kind: kind.response_type(),
            request_id: request_id.to_string(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn result_ok(kind: RequestKind, request_id: &str, result: Value) -> Self {
        Self {
            kind: kind.result_type(),
            request_id: request_id.to_string(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn result_err(kind: RequestKind, request_id: &str, error: impl Into<String>) -> Self {
        Self {
            kind: kind.result_type(),
            request_id: request_id.to_string(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_result(&self) -> bool {
        is_result_type(&self.kind)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let wire = wire_type(value)?;
        if !is_response_type(wire) && !is_result_type(wire) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| SphereBridgeError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PendingData {
    #[serde(rename = "SPHERE_SEND_TOKENS")]
    Transfer {
        to: String,
        amount: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "SPHERE_SIGN_MESSAGE")]
    SignMessage { message: String },
    #[serde(rename = "SPHERE_SIGN_PROTOCOL_EVENT")]
    SignProtocolEvent { event: Value },
    #[serde(rename = "SPHERE_REGISTER_NAMETAG")]
    RegisterNametag { name: String },
}

impl PendingData {
    pub fn kind(&self) -> RequestKind {
        match self {
            PendingData::Transfer { .. } => RequestKind::SendTokens,
            PendingData::SignMessage { .. } => RequestKind::SignMessage,
            PendingData::SignProtocolEvent { .. } => RequestKind::SignProtocolEvent,
            PendingData::RegisterNametag { .. } => RequestKind::RegisterNametag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub origin: String,
    // Target the Result push goes to once decided.
    pub target: String,
    pub timestamp: i64,
    pub data: PendingData,
}

impl PendingTransaction {
    pub fn kind(&self) -> RequestKind {
        self.data.kind()
    }
}

// Approver control messages, routed by the dispatcher directly and never
// through the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PopupRequest {
    #[serde(rename = "POPUP_LIST_PENDING")]
    ListPending,
    #[serde(rename = "POPUP_APPROVE_TRANSACTION")]
    Approve {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "POPUP_REJECT_TRANSACTION")]
    Reject {
        #[serde(rename = "requestId")]
        request_id: String,
    },
}
