use std::sync::Arc;

use tracing::info;

use dhali_core::{strip_whitespace, Cid, Claim, DhaliError, PrivateChannelRecord, Rid};
use dhali_store::{get_doc, set_doc, DocRef, Store};

use crate::mover::move_doc;

/// C6: reconciles a pre-execution estimate against the post-execution exact
/// cost of a single request.
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Updates `private/{CID}` and `public/{CID}` in lockstep:
    /// `to_claim <- to_claim - estimate_cost + exact_cost`. Requires both
    /// records to already exist — this operation corrects a running total,
    /// it does not create one.
    pub async fn update_estimated_cost_with_exact(
        &self,
        claim_json: &str,
        estimate_cost: f64,
        exact_cost: f64,
    ) -> Result<(), DhaliError> {
        if estimate_cost < 0.0 || exact_cost < 0.0 {
            return Err(DhaliError::InvalidInput(
                "estimate_cost and exact_cost must be non-negative".to_string(),
            ));
        }
        let claim = Claim::parse(claim_json)?;
        let cid = Cid::derive(&claim.channel_id);
        let private_ref = DocRef::Private(cid);
        let public_ref = DocRef::Public(cid);

        self.store
            .transaction(move |view| {
                Box::pin(async move {
                    let mut private: PrivateChannelRecord = get_doc(view, &private_ref)?
                        .ok_or_else(|| DhaliError::NotFound(format!("private/{cid}")))?;
                    let mut public: dhali_core::PublicChannelRecord = get_doc(view, &public_ref)?
                        .ok_or_else(|| DhaliError::NotFound(format!("public/{cid}")))?;

                    private.to_claim = private.to_claim - estimate_cost + exact_cost;
                    public.to_claim = public.to_claim - estimate_cost + exact_cost;

                    set_doc(view, &private_ref, &private)?;
                    set_doc(view, &public_ref, &public)?;
                    Ok(())
                })
            })
            .await?;

        info!(%cid, estimate_cost, exact_cost, "reconciled estimate with exact cost");
        Ok(())
    }

    /// Append-only: writes a new `private/{CID}/exact/{RID}` record and
    /// returns its freshly minted RID. Never overwrites an existing record.
    pub async fn store_exact_claim(
        &self,
        claim_json: &str,
        exact_cost: f64,
        now: f64,
    ) -> Result<Rid, DhaliError> {
        let claim = Claim::parse(claim_json)?;
        let cid = Cid::derive(&claim.channel_id);
        let rid = Rid::new();
        let exact_ref = DocRef::Exact(cid, rid);

        let record = dhali_core::RequestRecord::new(&claim, exact_cost, now)?;

        self.store
            .transaction(move |view| {
                let record = record.clone();
                Box::pin(async move { set_doc(view, &exact_ref, &record) })
            })
            .await?;

        Ok(rid)
    }

    /// Validates that `private/{CID}/estimate/{RID}` still matches the
    /// incoming claim, then moves it (C7) to `exact/{RID}` with its
    /// `to_claim` overwritten by `exact_cost`.
    pub async fn validate_exact_claim(
        &self,
        claim_json: &str,
        rid: Rid,
        exact_cost: f64,
    ) -> Result<(), DhaliError> {
        let claim = Claim::parse(claim_json)?;
        let cid = Cid::derive(&claim.channel_id);
        let estimate_ref = DocRef::Estimate(cid, rid);
        let exact_ref = DocRef::Exact(cid, rid);
        let claim_canonical = claim.canonical_json()?;

        self.store
            .transaction(move |view| {
                let claim = claim.clone();
                let claim_canonical = claim_canonical.clone();
                Box::pin(async move {
                    let estimate: Option<dhali_core::RequestRecord> =
                        get_doc(view, &estimate_ref)?;
                    let estimate = match estimate {
                        Some(e) => e,
                        None => return Ok(()), // already moved by a concurrent caller
                    };

                    if estimate.authorized_to_claim != claim.authorized_to_claim {
                        return Err(DhaliError::InternalInconsistency(
                            "estimate authorized_to_claim does not match incoming claim"
                                .to_string(),
                        ));
                    }
                    if strip_whitespace(&estimate.payment_claim)
                        != strip_whitespace(&claim_canonical)
                    {
                        return Err(DhaliError::InternalInconsistency(
                            "estimate payment_claim does not match incoming claim".to_string(),
                        ));
                    }

                    move_doc(view, &estimate_ref, &exact_ref)?;

                    let mut exact: dhali_core::RequestRecord = get_doc(view, &exact_ref)?
                        .ok_or_else(|| {
                            DhaliError::InternalInconsistency(
                                "exact record missing immediately after move".to_string(),
                            )
                        })?;
                    exact.to_claim = exact_cost;
                    set_doc(view, &exact_ref, &exact)
                })
            })
            .await
    }
}
