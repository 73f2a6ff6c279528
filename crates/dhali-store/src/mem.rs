use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use dhali_core::DhaliError;

use crate::{BoxFuture, DocRef, Store, TxnView};

/// In-memory document store double used by the engine's own test suite and
/// by callers who want a deterministic stand-in for [`crate::SledStore`].
///
/// Transactions are serialised by a single async mutex held for the whole
/// attempt, so there is never a genuine conflict to retry — this satisfies
/// the same `Store` contract as the sled-backed implementation without
/// needing to simulate optimistic concurrency.
pub struct MemStore {
    txn_lock: tokio::sync::Mutex<()>,
    data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            txn_lock: tokio::sync::Mutex::new(()),
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemTxnView<'a> {
    data: &'a Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl<'a> TxnView for MemTxnView<'a> {
    fn get_bytes(&self, r: &DocRef) -> Result<Option<Vec<u8>>, DhaliError> {
        let map = self.data.lock().map_err(|_| DhaliError::Store("poisoned lock".to_string()))?;
        Ok(map.get(&r.to_key()).cloned())
    }

    fn set_bytes(&self, r: &DocRef, bytes: Vec<u8>) -> Result<(), DhaliError> {
        let mut map = self.data.lock().map_err(|_| DhaliError::Store("poisoned lock".to_string()))?;
        map.insert(r.to_key(), bytes);
        Ok(())
    }

    fn delete(&self, r: &DocRef) -> Result<(), DhaliError> {
        let mut map = self.data.lock().map_err(|_| DhaliError::Store("poisoned lock".to_string()))?;
        map.remove(&r.to_key());
        Ok(())
    }
}

#[async_trait]
impl Store for MemStore {
    async fn transaction<T, F>(&self, f: F) -> Result<T, DhaliError>
    where
        F: for<'a> Fn(&'a dyn TxnView) -> BoxFuture<'a, Result<T, DhaliError>> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let _guard = self.txn_lock.lock().await;
        let view = MemTxnView { data: &self.data };
        f(&view).await
    }
}
