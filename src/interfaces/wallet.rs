use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub signature: String,
    pub public_key: String,
}

// Key handling, unlock and encrypted storage live behind this seam.
#[async_trait]
pub trait WalletVault: Send + Sync {
    async fn address(&self) -> Result<String>;
    async fn balances(&self) -> Result<Vec<TokenBalance>>;
    async fn send_tokens(&self, to: &str, amount: u64, token: Option<&str>)
        -> Result<TransferReceipt>;
    async fn sign_message(&self, message: &str) -> Result<SignedMessage>;
    async fn sign_protocol_event(&self, event: &Value) -> Result<Value>;
    async fn resolve_nametag(&self, name: &str) -> Result<Option<String>>;
    async fn nametag_available(&self, name: &str) -> Result<bool>;
    async fn register_nametag(&self, name: &str) -> Result<TransferReceipt>;
}
