use serde::{Deserialize, Serialize};

use crate::claim::Claim;
use crate::types::{Currency, ToClaim};

/// `private/{CID}`: the authoritative per-channel accounting record.
/// Invariant: `authorized_to_claim.parse::<i128>() >= to_claim`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivateChannelRecord {
    pub authorized_to_claim: String,
    pub to_claim: ToClaim,
    pub currency: Currency,
    pub payment_claim: String,
    pub timestamp: f64,
    pub number_of_claims_staged: u64,
}

/// `public/{CID}`: mirrors `private.to_claim` after every committed
/// transaction that touches either record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicChannelRecord {
    pub to_claim: ToClaim,
    pub currency: Currency,
}

/// Shape shared by `private/{CID}/estimate/{RID}` and `private/{CID}/exact/{RID}`:
/// a `PrivateChannelRecord` without the staging counter, since per-request
/// records are never themselves rate-limit contexts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub authorized_to_claim: String,
    pub to_claim: ToClaim,
    pub currency: Currency,
    pub payment_claim: String,
    pub timestamp: f64,
}

impl RequestRecord {
    pub fn new(claim: &Claim, to_claim: ToClaim, timestamp: f64) -> Result<Self, crate::error::DhaliError> {
        Ok(Self {
            authorized_to_claim: claim.authorized_to_claim.clone(),
            to_claim,
            currency: Currency::xrp_drops(),
            payment_claim: claim.canonical_json()?,
            timestamp,
        })
    }
}
