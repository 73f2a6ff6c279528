use dhali_core::DhaliError;
use dhali_store::{DocRef, Store, TxnView};

/// C7: moves `source` to `target` within an already-open transaction.
///
/// If `source` is absent the move is a no-op — this is what makes concurrent
/// callers idempotent: at most one caller observes `source` present and
/// performs the move; the rest observe it already gone (either on their own
/// read, or after the store retries them past a conflicting writer) and
/// return successfully having done nothing.
pub fn move_doc(view: &dyn TxnView, source: &DocRef, target: &DocRef) -> Result<(), DhaliError> {
    match view.get_bytes(source)? {
        Some(bytes) => {
            view.set_bytes(target, bytes)?;
            view.delete(source)?;
            Ok(())
        }
        None => Ok(()),
    }
}

/// Convenience wrapper that opens its own transaction around [`move_doc`],
/// for callers that want to invoke the move primitive standalone rather than
/// as one step of a larger transactional operation (C6's `validate_exact_claim`
/// composes `move_doc` directly into its own transaction instead).
pub async fn move_document<S: Store>(
    store: &S,
    source: DocRef,
    target: DocRef,
) -> Result<(), DhaliError> {
    store
        .transaction(move |view| {
            let source = source;
            let target = target;
            Box::pin(async move { move_doc(view, &source, &target) })
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhali_core::Cid;
    use dhali_store::MemStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn move_relocates_and_deletes_source() {
        let store = MemStore::new();
        let cid = Cid::derive("CH");
        let source = DocRef::Estimate(cid, dhali_core::Rid::new());
        let target = DocRef::Exact(cid, dhali_core::Rid::new());

        store
            .transaction({
                let source = source;
                move |view| {
                    let source = source;
                    Box::pin(async move { view.set_bytes(&source, b"payload".to_vec()) })
                }
            })
            .await
            .unwrap();

        move_document(&store, source, target).await.unwrap();

        store
            .transaction(move |view| {
                let source = source;
                let target = target;
                Box::pin(async move {
                    assert_eq!(view.get_bytes(&source)?, None);
                    assert_eq!(view.get_bytes(&target)?, Some(b"payload".to_vec()));
                    Ok(())
                })
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_moves_leave_exactly_one_target() {
        let store = Arc::new(MemStore::new());
        let cid = Cid::derive("CH");
        let source = DocRef::Estimate(cid, dhali_core::Rid::new());
        let target = DocRef::Exact(cid, dhali_core::Rid::new());

        store
            .transaction({
                let source = source;
                move |view| {
                    let source = source;
                    Box::pin(async move { view.set_bytes(&source, b"payload".to_vec()) })
                }
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                move_document(&*store, source, target).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        store
            .transaction(move |view| {
                let source = source;
                let target = target;
                Box::pin(async move {
                    assert_eq!(view.get_bytes(&source)?, None);
                    assert_eq!(view.get_bytes(&target)?, Some(b"payload".to_vec()));
                    Ok(())
                })
            })
            .await
            .unwrap();
    }
}
