use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use dhali_core::DhaliError;

use crate::{BoxFuture, DocRef, Store, TxnView};

/// Persistent document store backed by sled (pure-Rust, no C dependencies).
///
/// Every collection named in §6's persisted layout — `payment_channels`,
/// `public_claim_info`, and the `estimate`/`exact` subcollections — is kept
/// in a single `sled::Tree` under a collection-prefixed composite key
/// ([`DocRef::to_key`]). A single tree lets one `Tree::transaction` span an
/// unbounded number of source documents, which the consolidator (C8) needs
/// and sled's fixed-arity multi-tree `Transactional` trait cannot express.
pub struct SledStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DhaliError> {
        let db = sled::open(path).map_err(|e| DhaliError::Store(e.to_string()))?;
        let tree = db
            .open_tree("documents")
            .map_err(|e| DhaliError::Store(e.to_string()))?;
        Ok(Self { _db: db, tree })
    }

    pub fn flush(&self) -> Result<(), DhaliError> {
        self._db.flush().map_err(|e| DhaliError::Store(e.to_string()))?;
        Ok(())
    }
}

struct SledTxnView<'a> {
    tx: &'a sled::transaction::TransactionalTree,
    conflict: &'a AtomicBool,
}

impl<'a> TxnView for SledTxnView<'a> {
    fn get_bytes(&self, r: &DocRef) -> Result<Option<Vec<u8>>, DhaliError> {
        match self.tx.get(r.to_key()) {
            Ok(v) => Ok(v.map(|iv| iv.to_vec())),
            Err(sled::transaction::UnabortableTransactionError::Conflict) => {
                self.conflict.store(true, Ordering::SeqCst);
                Err(DhaliError::Store("transaction conflict".to_string()))
            }
            Err(e) => Err(DhaliError::Store(e.to_string())),
        }
    }

    fn set_bytes(&self, r: &DocRef, bytes: Vec<u8>) -> Result<(), DhaliError> {
        match self.tx.insert(r.to_key(), bytes) {
            Ok(_) => Ok(()),
            Err(sled::transaction::UnabortableTransactionError::Conflict) => {
                self.conflict.store(true, Ordering::SeqCst);
                Err(DhaliError::Store("transaction conflict".to_string()))
            }
            Err(e) => Err(DhaliError::Store(e.to_string())),
        }
    }

    fn delete(&self, r: &DocRef) -> Result<(), DhaliError> {
        match self.tx.remove(r.to_key()) {
            Ok(_) => Ok(()),
            Err(sled::transaction::UnabortableTransactionError::Conflict) => {
                self.conflict.store(true, Ordering::SeqCst);
                Err(DhaliError::Store("transaction conflict".to_string()))
            }
            Err(e) => Err(DhaliError::Store(e.to_string())),
        }
    }
}

#[async_trait]
impl Store for SledStore {
    /// Bridges sled's synchronous `Tree::transaction` to the engine's async
    /// world via a blocking-pool hop: the transaction body `f` is itself
    /// async (it may call out to the ledger RPC), so it is driven to
    /// completion with `Handle::block_on` from inside sled's closure rather
    /// than run on the async reactor, which would otherwise block it for
    /// the duration of any I/O performed inside the transaction.
    ///
    /// A conflict observed by [`SledTxnView`] is distinguished from a
    /// business-logic abort via a shared flag: the former causes sled to
    /// retry the whole closure (re-running any ledger calls inside it, per
    /// the concurrency model's retry contract); the latter propagates
    /// immediately as the transaction's result.
    async fn transaction<T, F>(&self, f: F) -> Result<T, DhaliError>
    where
        F: for<'a> Fn(&'a dyn TxnView) -> BoxFuture<'a, Result<T, DhaliError>> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let tree = self.tree.clone();
        let rt_handle = tokio::runtime::Handle::current();

        tokio::task::spawn_blocking(move || {
            let result: sled::transaction::TransactionResult<T, DhaliError> =
                tree.transaction(|tx| {
                    let conflict = AtomicBool::new(false);
                    let view = SledTxnView { tx, conflict: &conflict };
                    match rt_handle.block_on(f(&view)) {
                        Ok(v) => Ok(v),
                        Err(_) if conflict.load(Ordering::SeqCst) => {
                            Err(sled::transaction::ConflictableTransactionError::Conflict)
                        }
                        Err(e) => Err(sled::transaction::ConflictableTransactionError::Abort(e)),
                    }
                });
            match result {
                Ok(v) => Ok(v),
                Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
                Err(sled::transaction::TransactionError::Storage(e)) => {
                    Err(DhaliError::Store(e.to_string()))
                }
            }
        })
        .await
        .map_err(|e| DhaliError::Store(format!("blocking task panicked: {e}")))?
    }
}
