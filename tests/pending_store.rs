use serde_json::json;
use tempfile::NamedTempFile;

use sphere_bridge::{PendingData, PendingStore, PendingTransaction, SphereBridgeError};

fn entry(request_id: &str, to: &str) -> PendingTransaction {
    PendingTransaction {
        request_id: request_id.to_string(),
        origin: "https://dapp.example".to_string(),
        target: "tab-1".to_string(),
        timestamp: 1_700_000_000_000,
        data: PendingData::Transfer {
            to: to.to_string(),
            amount: 10,
            token: None,
        },
    }
}

#[tokio::test]
async fn entries_come_back_in_insertion_order() {
    let db = NamedTempFile::new().unwrap();
    let store = PendingStore::new(db.path().to_str().unwrap()).await.unwrap();

    assert!(store.list().await.unwrap().is_empty());

    store.add(entry("r1", "a")).await.unwrap();
    store.add(entry("r2", "b")).await.unwrap();
    store.add(entry("r3", "c")).await.unwrap();

    let ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.request_id)
        .collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn removing_the_middle_returns_it_and_keeps_order() {
    let db = NamedTempFile::new().unwrap();
    let store = PendingStore::new(db.path().to_str().unwrap()).await.unwrap();
    store.add(entry("r1", "a")).await.unwrap();
    store.add(entry("r2", "b")).await.unwrap();
    store.add(entry("r3", "c")).await.unwrap();

    let removed = store.remove_by_request_id("r2").await.unwrap().unwrap();
    assert_eq!(removed.request_id, "r2");
    match removed.data {
        PendingData::Transfer { to, .. } => assert_eq!(to, "b"),
        _ => panic!("wrong variant"),
    }

    let ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.request_id)
        .collect();
    assert_eq!(ids, vec!["r1", "r3"]);

    assert!(store.remove_by_request_id("r2").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_request_ids_are_refused() {
    let db = NamedTempFile::new().unwrap();
    let store = PendingStore::new(db.path().to_str().unwrap()).await.unwrap();
    store.add(entry("r1", "a")).await.unwrap();

    let err = store.add(entry("r1", "b")).await.unwrap_err();
    assert!(matches!(err, SphereBridgeError::Validation(_)));
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn clear_empties_the_queue() {
    let db = NamedTempFile::new().unwrap();
    let store = PendingStore::new(db.path().to_str().unwrap()).await.unwrap();
    store.add(entry("r1", "a")).await.unwrap();
    store.add(entry("r2", "b")).await.unwrap();

    store.clear().await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn the_queue_survives_reopening_the_same_file() {
    let db = NamedTempFile::new().unwrap();
    let path = db.path().to_str().unwrap();

    {
        let store = PendingStore::new(path).await.unwrap();
        store.add(entry("r1", "a")).await.unwrap();
        let mut sign = entry("r2", "unused");
        sign.data = PendingData::SignProtocolEvent {
            event: json!({"kind": "attest", "nonce": 7}),
        };
        store.add(sign).await.unwrap();
    }

    let reopened = PendingStore::new(path).await.unwrap();
    let entries = reopened.list().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].request_id, "r1");
    match &entries[1].data {
        PendingData::SignProtocolEvent { event } => assert_eq!(event["nonce"], 7),
        _ => panic!("wrong variant"),
    }
}
