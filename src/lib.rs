pub mod config;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod providers;
pub mod services;

pub use crate::config::Config;
pub use crate::domains::envelope::{
    new_request_id, PendingData, PendingTransaction, PopupRequest, ReplyEnvelope, RequestEnvelope,
    RequestKind, RequestPayload, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use crate::error::{Result, SphereBridgeError};
pub use crate::interfaces::transport::TargetTransport;
pub use crate::interfaces::wallet::{SignedMessage, TokenBalance, TransferReceipt, WalletVault};
pub use crate::providers::pending::PendingStore;
pub use crate::services::dispatcher::{
    BridgeEvent, DispatchOutcome, Dispatcher, RequestContext,
};
pub use crate::services::proxy::WalletProxy;
pub use crate::services::relay::RelayHandle;
pub use crate::services::transport::TabTransport;
