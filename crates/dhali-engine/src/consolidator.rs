use std::sync::Arc;

use tracing::info;

use dhali_core::{Currency, DhaliError, PrivateChannelRecord, PublicChannelRecord, RequestRecord};
use dhali_store::{get_doc, set_doc, DocRef, Store};

/// C8: collapses a set of staged per-request records into one canonical
/// private record and its mirrored public record.
pub struct Consolidator<S> {
    store: Arc<S>,
}

impl<S: Store> Consolidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reads `private_target`/`public_target` (either may be absent), folds
    /// every `source` doc into them, deletes every source, and writes the
    /// updated targets — all inside one transaction. On an equal
    /// `authorized_to_claim` tie, the existing winner is retained.
    pub async fn consolidate(
        &self,
        sources: Vec<DocRef>,
        private_target: DocRef,
        public_target: DocRef,
        now: f64,
    ) -> Result<(), DhaliError> {
        let source_count = sources.len() as u64;

        self.store
            .transaction(move |view| {
                let sources = sources.clone();
                Box::pin(async move {
                    let existing_private: Option<PrivateChannelRecord> =
                        get_doc(view, &private_target)?;

                    let mut total_to_claim = existing_private.as_ref().map(|p| p.to_claim).unwrap_or(0.0);
                    let mut max_auth = existing_private
                        .as_ref()
                        .map(|p| p.authorized_to_claim.clone())
                        .unwrap_or_else(|| "0".to_string());
                    let mut winning_claim = existing_private
                        .as_ref()
                        .map(|p| p.payment_claim.clone())
                        .unwrap_or_default();

                    let max_auth_int = |s: &str| s.parse::<i128>().unwrap_or(0);

                    for source_ref in &sources {
                        let doc: Option<RequestRecord> = get_doc(view, source_ref)?;
                        let doc = match doc {
                            Some(d) => d,
                            None => continue, // already consolidated by a concurrent caller
                        };
                        total_to_claim += doc.to_claim;
                        if max_auth_int(&doc.authorized_to_claim) > max_auth_int(&max_auth) {
                            max_auth = doc.authorized_to_claim;
                            winning_claim = doc.payment_claim;
                        }
                    }

                    for source_ref in &sources {
                        view.delete(source_ref)?;
                    }

                    let new_private = PrivateChannelRecord {
                        authorized_to_claim: max_auth,
                        to_claim: total_to_claim,
                        currency: Currency::xrp_drops(),
                        payment_claim: winning_claim,
                        timestamp: now,
                        number_of_claims_staged: source_count,
                    };
                    set_doc(view, &private_target, &new_private)?;

                    let new_public = PublicChannelRecord {
                        to_claim: total_to_claim,
                        currency: Currency::xrp_drops(),
                    };
                    set_doc(view, &public_target, &new_public)?;

                    Ok(())
                })
            })
            .await?;

        info!(sources = source_count, "consolidated staged claims");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhali_core::{Cid, Rid};
    use dhali_store::MemStore;

    async fn seed_source(store: &MemStore, r: DocRef, to_claim: f64, authorized: &str, payment_claim: &str) {
        let record = RequestRecord {
            authorized_to_claim: authorized.to_string(),
            to_claim,
            currency: Currency::xrp_drops(),
            payment_claim: payment_claim.to_string(),
            timestamp: 1000.0,
        };
        store
            .transaction(move |view| {
                let record = record.clone();
                Box::pin(async move { set_doc(view, &r, &record) })
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn consolidates_into_empty_targets() {
        let store = Arc::new(MemStore::new());
        let cid = Cid::derive("CH");
        let r1 = DocRef::Exact(cid, Rid::new());
        let r2 = DocRef::Exact(cid, Rid::new());
        let r3 = DocRef::Exact(cid, Rid::new());

        seed_source(&store, r1, 1.0, "4", "s1").await;
        seed_source(&store, r2, 2.0, "5", "s2").await;
        seed_source(&store, r3, 3.0, "6", "largest").await;

        let consolidator = Consolidator::new(store.clone());
        let private_target = DocRef::Private(cid);
        let public_target = DocRef::Public(cid);
        consolidator
            .consolidate(vec![r1, r2, r3], private_target, public_target, 2000.0)
            .await
            .unwrap();

        let private: PrivateChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &private_target)?.unwrap()) })
            })
            .await
            .unwrap();
        assert_eq!(private.to_claim, 6.0);
        assert_eq!(private.authorized_to_claim, "6");
        assert_eq!(private.payment_claim, "largest");
        assert_eq!(private.number_of_claims_staged, 3);

        let public: PublicChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &public_target)?.unwrap()) })
            })
            .await
            .unwrap();
        assert_eq!(public.to_claim, 6.0);

        for r in [r1, r2, r3] {
            let gone: Option<RequestRecord> = store
                .transaction(move |view| Box::pin(async move { get_doc(view, &r) }))
                .await
                .unwrap();
            assert!(gone.is_none());
        }
    }

    #[tokio::test]
    async fn second_round_accumulates_onto_existing_targets() {
        let store = Arc::new(MemStore::new());
        let cid = Cid::derive("CH");
        let private_target = DocRef::Private(cid);
        let public_target = DocRef::Public(cid);

        let r1 = DocRef::Exact(cid, Rid::new());
        let r2 = DocRef::Exact(cid, Rid::new());
        let r3 = DocRef::Exact(cid, Rid::new());
        seed_source(&store, r1, 1.0, "4", "s1").await;
        seed_source(&store, r2, 2.0, "5", "s2").await;
        seed_source(&store, r3, 3.0, "6", "largest").await;

        let consolidator = Consolidator::new(store.clone());
        consolidator
            .consolidate(vec![r1, r2, r3], private_target, public_target, 2000.0)
            .await
            .unwrap();

        let r4 = DocRef::Exact(cid, Rid::new());
        let r5 = DocRef::Exact(cid, Rid::new());
        let r6 = DocRef::Exact(cid, Rid::new());
        seed_source(&store, r4, 1.0, "8", "s3").await;
        seed_source(&store, r5, 2.0, "9", "s4").await;
        seed_source(&store, r6, 1.1, "10", "new largest").await;

        consolidator
            .consolidate(vec![r4, r5, r6], private_target, public_target, 3000.0)
            .await
            .unwrap();

        let private: PrivateChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &private_target)?.unwrap()) })
            })
            .await
            .unwrap();
        assert!((private.to_claim - 10.1).abs() < 1e-9);
        assert_eq!(private.authorized_to_claim, "10");
        assert_eq!(private.payment_claim, "new largest");
    }

    #[tokio::test]
    async fn tie_break_retains_existing_winner() {
        let store = Arc::new(MemStore::new());
        let cid = Cid::derive("CH");
        let private_target = DocRef::Private(cid);
        let public_target = DocRef::Public(cid);

        store
            .transaction(move |view| {
                Box::pin(async move {
                    let private = PrivateChannelRecord {
                        authorized_to_claim: "10".to_string(),
                        to_claim: 0.0,
                        currency: Currency::xrp_drops(),
                        payment_claim: "incumbent".to_string(),
                        timestamp: 0.0,
                        number_of_claims_staged: 0,
                    };
                    set_doc(view, &private_target, &private)
                })
            })
            .await
            .unwrap();

        let r1 = DocRef::Exact(cid, Rid::new());
        seed_source(&store, r1, 1.0, "10", "challenger").await;

        let consolidator = Consolidator::new(store.clone());
        consolidator
            .consolidate(vec![r1], private_target, public_target, 4000.0)
            .await
            .unwrap();

        let private: PrivateChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &private_target)?.unwrap()) })
            })
            .await
            .unwrap();
        assert_eq!(private.payment_claim, "incumbent");
    }
}
