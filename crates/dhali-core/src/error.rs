use thiserror::Error;

/// Every way a claim-validation or consolidation operation can fail.
///
/// Variants map to the HTTP status a caller should surface; see
/// [`DhaliError::status_code`].
#[derive(Debug, Error)]
pub enum DhaliError {
    // ── Claim shape ──────────────────────────────────────────────────────────
    #[error("malformed claim: {0}")]
    MalformedClaim(String),

    #[error("claim destination_account does not match gateway destination")]
    DestinationMismatch,

    #[error("record currency is not {{\"XRP\", 0.000001}}")]
    CurrencyInvalid,

    // ── Authorization / ledger ───────────────────────────────────────────────
    #[error("authorized_to_claim {authorized} is insufficient for to_claim {required}")]
    InsufficientAuthorization { authorized: i128, required: f64 },

    #[error("no channel on the ledger matches this claim")]
    NoMatchingChannel,

    #[error("channel has a cancel_after set; expirable channels are rejected")]
    ExpirableChannel,

    #[error("claim signature does not verify against the matching channel")]
    SignatureInvalid,

    #[error("record not found: {0}")]
    NotFound(String),

    // ── Admission control ────────────────────────────────────────────────────
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ── Internal ──────────────────────────────────────────────────────────────
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("operation timed out")]
    Timeout,

    #[error("store error: {0}")]
    Store(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DhaliError {
    /// HTTP status a caller mounting this engine behind an HTTP surface
    /// should respond with. `None` for kinds that carry no fixed mapping
    /// and are instead subject to the caller's own deadline policy.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DhaliError::MalformedClaim(_)
            | DhaliError::DestinationMismatch
            | DhaliError::CurrencyInvalid
            | DhaliError::InsufficientAuthorization { .. }
            | DhaliError::NoMatchingChannel
            | DhaliError::ExpirableChannel
            | DhaliError::SignatureInvalid
            | DhaliError::NotFound(_) => Some(402),

            DhaliError::RateLimited => Some(429),

            DhaliError::InvalidInput(_) => Some(400),

            DhaliError::InternalInconsistency(_)
            | DhaliError::Store(_)
            | DhaliError::Ledger(_)
            | DhaliError::Serialization(_) => Some(500),

            DhaliError::Timeout => None,
        }
    }
}
