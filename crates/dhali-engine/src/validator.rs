use std::sync::Arc;

use tracing::{info, warn};

use dhali_core::{
    Claim, Cid, Currency, DhaliError, PrivateChannelRecord, PublicChannelRecord, RequestRecord,
    Rid, ToClaim,
};
use dhali_ledger::LedgerClient;
use dhali_ratelimit::{RateLimitContext, RateLimiter};
use dhali_store::{get_doc, set_doc, DocRef, Store};

use crate::verifier::verify_claim;

/// C5: the transactional reconcile-and-verify path a request's claim takes
/// on admission.
pub struct ClaimValidator<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    settle_delay: u64,
    rate_limiter: RateLimiter,
}

impl<S, L> ClaimValidator<S, L>
where
    S: Store,
    L: LedgerClient + 'static,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, settle_delay: u64, rate_limiter: RateLimiter) -> Self {
        Self {
            store,
            ledger,
            settle_delay,
            rate_limiter,
        }
    }

    /// Pre-flight (parse, destination check, CID derivation) happens before
    /// the transaction opens; everything from the rate-limit check through
    /// the final writes happens inside one transaction so the ledger
    /// verification (when needed) and the accounting update move together.
    pub async fn validate_claim(
        &self,
        claim_json: &str,
        single_request_cost_estimate: f64,
        destination_account: &str,
        now: f64,
    ) -> Result<ToClaim, DhaliError> {
        let claim = Claim::parse(claim_json)?;
        if claim.destination_account != destination_account {
            return Err(DhaliError::DestinationMismatch);
        }
        let cid = Cid::derive(&claim.channel_id);
        let claim_authorized = claim.authorized_to_claim_int()?;
        let claim_canonical = claim.canonical_json()?;

        let ledger = self.ledger.clone();
        let settle_delay = self.settle_delay;
        let rate_limiter = self.rate_limiter;

        let private_ref = DocRef::Private(cid);
        let public_ref = DocRef::Public(cid);

        let result = self
            .store
            .transaction(move |view| {
                let claim = claim.clone();
                let claim_canonical = claim_canonical.clone();
                let ledger = ledger.clone();
                Box::pin(async move {
                    let private: Option<PrivateChannelRecord> = get_doc(view, &private_ref)?;

                    if let Some(existing) = &private {
                        if !existing.currency.is_xrp_drops() {
                            return Err(DhaliError::CurrencyInvalid);
                        }
                        let ctx = RateLimitContext {
                            number_of_claims_staged: existing.number_of_claims_staged,
                            number_of_metadata_updates_staged: 0,
                            timestamp: existing.timestamp,
                        };
                        rate_limiter.check(&ctx, now)?;
                    }

                    let prior_to_claim = private.as_ref().map(|p| p.to_claim).unwrap_or(0.0);
                    let new_to_claim = prior_to_claim + single_request_cost_estimate;

                    if (claim_authorized as f64) < new_to_claim {
                        return Err(DhaliError::InsufficientAuthorization {
                            authorized: claim_authorized,
                            required: new_to_claim,
                        });
                    }

                    let needs_reverify = match &private {
                        None => true,
                        Some(existing) => existing.payment_claim != claim_canonical,
                    };

                    if needs_reverify {
                        verify_claim(&*ledger, &claim, settle_delay).await?;
                    }

                    // `timestamp`/`number_of_claims_staged` are the staged-doc
                    // backpressure counters the rate limiter reads; they track
                    // pending estimate/exact docs awaiting consolidation, not
                    // admission volume, so an update to an existing record
                    // leaves them untouched — only a first-ever record seeds
                    // them from this admission.
                    let (timestamp, number_of_claims_staged) = match &private {
                        Some(existing) => (existing.timestamp, existing.number_of_claims_staged),
                        None => (now, 1),
                    };

                    let new_private = PrivateChannelRecord {
                        authorized_to_claim: claim.authorized_to_claim.clone(),
                        to_claim: new_to_claim,
                        currency: Currency::xrp_drops(),
                        payment_claim: claim_canonical,
                        timestamp,
                        number_of_claims_staged,
                    };
                    set_doc(view, &private_ref, &new_private)?;

                    let new_public = PublicChannelRecord {
                        to_claim: new_to_claim,
                        currency: Currency::xrp_drops(),
                    };
                    set_doc(view, &public_ref, &new_public)?;

                    Ok(new_to_claim)
                })
            })
            .await;

        match &result {
            Ok(new_to_claim) => info!(%cid, new_to_claim = *new_to_claim, "validated claim"),
            Err(e) => warn!(%cid, error = %e, "rejected claim"),
        }
        result
    }

    /// The decoupled admission surface: runs the same pre-flight, rate-limit,
    /// and reverification logic as [`Self::validate_claim`] but never touches
    /// `private/{CID}`/`public/{CID}` — the canonical accounting record only
    /// advances once C6 promotes this request's estimate to exact. Instead it
    /// stages a `private/{CID}/estimate/{RID}` record (C6's estimate
    /// collection) that [`crate::reconciler::Reconciler::validate_exact_claim`]
    /// will later look up by the returned `Rid`.
    pub async fn throw_if_claim_invalid(
        &self,
        claim_json: &str,
        single_request_cost_estimate: f64,
        destination_account: &str,
        now: f64,
    ) -> Result<(ToClaim, Rid), DhaliError> {
        let claim = Claim::parse(claim_json)?;
        if claim.destination_account != destination_account {
            return Err(DhaliError::DestinationMismatch);
        }
        let cid = Cid::derive(&claim.channel_id);
        let claim_authorized = claim.authorized_to_claim_int()?;
        let claim_canonical = claim.canonical_json()?;

        let ledger = self.ledger.clone();
        let settle_delay = self.settle_delay;
        let rate_limiter = self.rate_limiter;

        let private_ref = DocRef::Private(cid);
        let rid = Rid::new();
        let estimate_ref = DocRef::Estimate(cid, rid);

        let result = self
            .store
            .transaction(move |view| {
                let claim = claim.clone();
                let claim_canonical = claim_canonical.clone();
                let ledger = ledger.clone();
                Box::pin(async move {
                    let private: Option<PrivateChannelRecord> = get_doc(view, &private_ref)?;

                    if let Some(existing) = &private {
                        if !existing.currency.is_xrp_drops() {
                            return Err(DhaliError::CurrencyInvalid);
                        }
                        let ctx = RateLimitContext {
                            number_of_claims_staged: existing.number_of_claims_staged,
                            number_of_metadata_updates_staged: 0,
                            timestamp: existing.timestamp,
                        };
                        rate_limiter.check(&ctx, now)?;
                    }

                    let prior_to_claim = private.as_ref().map(|p| p.to_claim).unwrap_or(0.0);
                    let new_to_claim = prior_to_claim + single_request_cost_estimate;

                    if (claim_authorized as f64) < new_to_claim {
                        return Err(DhaliError::InsufficientAuthorization {
                            authorized: claim_authorized,
                            required: new_to_claim,
                        });
                    }

                    let needs_reverify = match &private {
                        None => true,
                        Some(existing) => existing.payment_claim != claim_canonical,
                    };
                    if needs_reverify {
                        verify_claim(&*ledger, &claim, settle_delay).await?;
                    }

                    let record =
                        RequestRecord::new(&claim, single_request_cost_estimate, now)?;
                    set_doc(view, &estimate_ref, &record)?;

                    Ok(new_to_claim)
                })
            })
            .await;

        match &result {
            Ok(new_to_claim) => {
                info!(%cid, %rid, new_to_claim = *new_to_claim, "admitted claim without advancing canonical accounting")
            }
            Err(e) => warn!(%cid, error = %e, "rejected claim"),
        }
        result.map(|new_to_claim| (new_to_claim, rid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhali_ledger::{ChannelView, MockLedgerClient};
    use dhali_ratelimit::RateLimitStrategy;
    use dhali_store::MemStore;

    fn channel() -> ChannelView {
        ChannelView {
            account: "A".to_string(),
            destination_account: "D".to_string(),
            channel_id: "CH".to_string(),
            amount: "1000000".to_string(),
            settle_delay: 15_768_000,
            public_key: "pk".to_string(),
            has_cancel_after: false,
        }
    }

    fn claim_json(authorized: &str, signature: &str) -> String {
        format!(
            r#"{{"account":"A","destination_account":"D","authorized_to_claim":"{authorized}","signature":"{signature}","channel_id":"CH"}}"#
        )
    }

    #[tokio::test]
    async fn happy_path_first_claim() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let to_claim = validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap();

        assert_eq!(to_claim, 5.0);
    }

    #[tokio::test]
    async fn repeat_identical_claim_skips_ledger_call() {
        let store = Arc::new(MemStore::new());
        let mock = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            mock.clone(),
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let claim = claim_json("9000", "sig");
        validator
            .validate_claim(&claim, 5.0, "D", 1000.0)
            .await
            .unwrap();
        assert_eq!(mock.verify_signature_call_count(), 1);

        let to_claim = validator
            .validate_claim(&claim, 5.0, "D", 1001.0)
            .await
            .unwrap();

        assert_eq!(to_claim, 10.0);
        assert_eq!(mock.verify_signature_call_count(), 1);
    }

    #[tokio::test]
    async fn update_preserves_staged_count_and_timestamp() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store.clone(),
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap();

        let cid = Cid::derive("CH");
        let after_first: PrivateChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &DocRef::Private(cid))?.unwrap()) })
            })
            .await
            .unwrap();
        assert_eq!(after_first.number_of_claims_staged, 1);
        assert_eq!(after_first.timestamp, 1000.0);

        validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1001.0)
            .await
            .unwrap();

        let after_second: PrivateChannelRecord = store
            .transaction(move |view| {
                Box::pin(async move { Ok(get_doc(view, &DocRef::Private(cid))?.unwrap()) })
            })
            .await
            .unwrap();
        // `validate_claim` only advances `to_claim`; the staged-doc backpressure
        // counters stay put until consolidation rewrites them.
        assert_eq!(after_second.number_of_claims_staged, 1);
        assert_eq!(after_second.timestamp, 1000.0);
    }

    #[tokio::test]
    async fn increased_authorization_reverifies() {
        let store = Arc::new(MemStore::new());
        let mock = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            mock.clone(),
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap();
        validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1001.0)
            .await
            .unwrap();

        let to_claim = validator
            .validate_claim(&claim_json("10000", "sig2"), 5.0, "D", 1002.0)
            .await
            .unwrap();

        assert_eq!(to_claim, 15.0);
        assert_eq!(mock.verify_signature_call_count(), 2);
    }

    #[tokio::test]
    async fn insufficient_authorization_rejects_without_state_change() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let err = validator
            .validate_claim(&claim_json("8996", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap_err();

        assert!(matches!(err, DhaliError::InsufficientAuthorization { .. }));
    }

    #[tokio::test]
    async fn rate_limited_admission() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store.clone(),
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::StagedClaimBuffer {
                limit: 10,
                window_secs: 1.0,
            }),
        );

        let cid = Cid::derive("CH");
        store
            .transaction(move |view| {
                Box::pin(async move {
                    let record = PrivateChannelRecord {
                        authorized_to_claim: "9000".to_string(),
                        to_claim: 50.0,
                        currency: Currency::xrp_drops(),
                        payment_claim: claim_json("9000", "sig"),
                        timestamp: 1000.0,
                        number_of_claims_staged: 10,
                    };
                    set_doc(view, &DocRef::Private(cid), &record)
                })
            })
            .await
            .unwrap();

        let err = validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "D", 1000.1)
            .await
            .unwrap_err();

        assert!(matches!(err, DhaliError::RateLimited));
    }

    #[tokio::test]
    async fn destination_mismatch_is_rejected_before_any_store_access() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let err = validator
            .validate_claim(&claim_json("9000", "sig"), 5.0, "somebody-else", 1000.0)
            .await
            .unwrap_err();

        assert!(matches!(err, DhaliError::DestinationMismatch));
    }

    #[tokio::test]
    async fn throw_if_claim_invalid_stages_estimate_without_touching_canonical_record() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store.clone(),
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let (new_to_claim, rid) = validator
            .throw_if_claim_invalid(&claim_json("9000", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap();
        assert_eq!(new_to_claim, 5.0);

        let cid = Cid::derive("CH");
        let (private, public, estimate) = store
            .transaction(move |view| {
                Box::pin(async move {
                    let private: Option<PrivateChannelRecord> =
                        get_doc(view, &DocRef::Private(cid))?;
                    let public: Option<PublicChannelRecord> =
                        get_doc(view, &DocRef::Public(cid))?;
                    let estimate: Option<dhali_core::RequestRecord> =
                        get_doc(view, &DocRef::Estimate(cid, rid))?;
                    Ok((private, public, estimate))
                })
            })
            .await
            .unwrap();

        assert!(private.is_none());
        assert!(public.is_none());
        assert_eq!(estimate.unwrap().to_claim, 5.0);
    }

    #[tokio::test]
    async fn throw_if_claim_invalid_rejects_insufficient_authorization() {
        let store = Arc::new(MemStore::new());
        let ledger = Arc::new(MockLedgerClient::new().with_channel(channel()));
        let validator = ClaimValidator::new(
            store,
            ledger,
            15_768_000,
            RateLimiter::new(RateLimitStrategy::Never),
        );

        let err = validator
            .throw_if_claim_invalid(&claim_json("3", "sig"), 5.0, "D", 1000.0)
            .await
            .unwrap_err();

        assert!(matches!(err, DhaliError::InsufficientAuthorization { .. }));
    }
}
