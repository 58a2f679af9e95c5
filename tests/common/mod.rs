#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use sphere_bridge::{
    Dispatcher, PendingStore, RelayHandle, Result, SignedMessage, SphereBridgeError, TabTransport,
    TokenBalance, TransferReceipt, WalletProxy, WalletVault,
};

pub struct MockVault {
    pub transfers: AtomicUsize,
    pub signatures: AtomicUsize,
    fail_transfers: AtomicBool,
}

impl MockVault {
    pub fn new() -> Self {
        Self {
            transfers: AtomicUsize::new(0),
            signatures: AtomicUsize::new(0),
            fail_transfers: AtomicBool::new(false),
        }
    }

    pub fn fail_transfers(&self) {
        self.fail_transfers.store(true, Ordering::SeqCst);
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletVault for MockVault {
    async fn address(&self) -> Result<String> {
        Ok("sphere1owner".to_string())
    }

    async fn balances(&self) -> Result<Vec<TokenBalance>> {
        Ok(vec![
            TokenBalance {
                symbol: "ALPHA".to_string(),
                amount: 100,
            },
            TokenBalance {
                symbol: "BETA".to_string(),
                amount: 25,
            },
        ])
    }

    async fn send_tokens(
        &self,
        to: &str,
        amount: u64,
        _token: Option<&str>,
    ) -> Result<TransferReceipt> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(SphereBridgeError::Execution(
                "insufficient funds".to_string(),
            ));
        }
        self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(TransferReceipt {
            transaction_id: format!("tx-{to}-{amount}"),
        })
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(SignedMessage {
            signature: format!("sig({message})"),
            public_key: "pk".to_string(),
        })
    }

    async fn sign_protocol_event(&self, event: &Value) -> Result<Value> {
        Ok(json!({"event": event, "signature": "evt-sig"}))
    }

    async fn resolve_nametag(&self, name: &str) -> Result<Option<String>> {
        Ok((name == "alice").then(|| "sphere1alice".to_string()))
    }

    async fn nametag_available(&self, name: &str) -> Result<bool> {
        Ok(name != "alice")
    }

    async fn register_nametag(&self, name: &str) -> Result<TransferReceipt> {
        Ok(TransferReceipt {
            transaction_id: format!("nametag-{name}"),
        })
    }
}

// Fully wired bridge over one relay instance, talking to a mock vault.
pub struct BridgeHarness {
    pub proxy: WalletProxy,
    pub dispatcher: Arc<Dispatcher>,
    pub relay: RelayHandle,
    pub vault: Arc<MockVault>,
    pub store: Arc<PendingStore>,
    // Raw page-side wire, for injecting hand-built envelopes.
    pub wire_tx: mpsc::UnboundedSender<Value>,
}

pub async fn start_bridge(db_path: &str, timeout: Duration) -> BridgeHarness {
    let vault = Arc::new(MockVault::new());
    let store = Arc::new(PendingStore::new(db_path).await.unwrap());
    let transport = Arc::new(TabTransport::new());
    let dispatcher = Arc::new(Dispatcher::new(vault.clone(), store.clone(), transport));

    let (page_tx, page_rx) = mpsc::unbounded_channel();
    let (ext_tx, ext_rx) = mpsc::unbounded_channel();
    let proxy = WalletProxy::with_timeout(page_tx.clone(), timeout);
    proxy.attach(ext_rx);
    let relay = RelayHandle::start(
        dispatcher.clone(),
        "https://dapp.example",
        "tab-1",
        page_rx,
        ext_tx,
    )
    .await;

    BridgeHarness {
        proxy,
        dispatcher,
        relay,
        vault,
        store,
        wire_tx: page_tx,
    }
}

pub async fn wait_for_pending(
    dispatcher: &Dispatcher,
    count: usize,
) -> Vec<sphere_bridge::PendingTransaction> {
    for _ in 0..100 {
        let entries = dispatcher.list_pending().await.unwrap();
        if entries.len() == count {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pending list never reached {count} entries");
}
