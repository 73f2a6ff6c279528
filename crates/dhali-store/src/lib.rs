pub mod docref;
pub mod mem;
pub mod sled_store;

pub use docref::DocRef;
pub use mem::MemStore;
pub use sled_store::SledStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use dhali_core::DhaliError;

/// A transaction body's future, boxed so its lifetime can be tied to the
/// borrowed `&dyn TxnView` a retryable closure receives on each invocation —
/// a bare generic `Fut` type parameter cannot express that dependency.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe view into the documents read/written by one transaction
/// attempt. Kept to non-generic byte-level operations so it can be passed
/// as `&dyn TxnView`; [`get_doc`]/[`set_doc`] layer typed access on top.
pub trait TxnView: Send + Sync {
    fn get_bytes(&self, r: &DocRef) -> Result<Option<Vec<u8>>, DhaliError>;
    fn set_bytes(&self, r: &DocRef, bytes: Vec<u8>) -> Result<(), DhaliError>;
    fn delete(&self, r: &DocRef) -> Result<(), DhaliError>;
}

/// Reads and deserialises a JSON document, if present.
pub fn get_doc<T: DeserializeOwned>(
    view: &dyn TxnView,
    r: &DocRef,
) -> Result<Option<T>, DhaliError> {
    match view.get_bytes(r)? {
        Some(bytes) => {
            let doc = serde_json::from_slice(&bytes)
                .map_err(|e| DhaliError::Serialization(e.to_string()))?;
            Ok(Some(doc))
        }
        None => Ok(None),
    }
}

/// Serialises and writes a document.
pub fn set_doc<T: Serialize>(view: &dyn TxnView, r: &DocRef, doc: &T) -> Result<(), DhaliError> {
    let bytes = serde_json::to_vec(doc).map_err(|e| DhaliError::Serialization(e.to_string()))?;
    view.set_bytes(r, bytes)
}

/// A transactional document store: reads of every document a transaction
/// touches are snapshotted up front, the closure's logic is pure, and the
/// commit is conflict-detected with automatic retry. Implementations must
/// re-invoke `f` on conflict rather than surface it to the caller.
#[async_trait]
pub trait Store: Send + Sync {
    async fn transaction<T, F>(&self, f: F) -> Result<T, DhaliError>
    where
        F: for<'a> Fn(&'a dyn TxnView) -> BoxFuture<'a, Result<T, DhaliError>> + Send + Sync + 'static,
        T: Send + 'static;
}
