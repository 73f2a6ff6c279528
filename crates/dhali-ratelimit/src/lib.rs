use serde::{Deserialize, Serialize};

use dhali_core::DhaliError;

/// Fields a rate-limit strategy may read. Drawn from the `PrivateChannelRecord`
/// for the claims counter; the metadata counter models a parallel staged-update
/// count this engine does not itself produce but which `StagedMetadataBuffer`
/// is specified against for parity with the distilled system's two strategies.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RateLimitContext {
    pub number_of_claims_staged: u64,
    pub number_of_metadata_updates_staged: u64,
    /// Unix timestamp (seconds) of the last staged write.
    pub timestamp: f64,
}

/// A tagged set of rate-limit predicates. Polymorphism is over the single
/// capability `should_limit(context, now) -> bool`; no inheritance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum RateLimitStrategy {
    /// Never limits. The default.
    Never,
    /// Limits once `number_of_claims_staged` reaches `limit` within `window_secs`
    /// of the context's `timestamp`.
    StagedClaimBuffer { limit: u64, window_secs: f64 },
    /// Same shape, over `number_of_metadata_updates_staged`.
    StagedMetadataBuffer { limit: u64, window_secs: f64 },
}

impl Default for RateLimitStrategy {
    fn default() -> Self {
        RateLimitStrategy::Never
    }
}

impl RateLimitStrategy {
    pub fn should_limit(&self, ctx: &RateLimitContext, now: f64) -> bool {
        match self {
            RateLimitStrategy::Never => false,
            RateLimitStrategy::StagedClaimBuffer { limit, window_secs } => {
                ctx.number_of_claims_staged >= *limit && (now - ctx.timestamp) < *window_secs
            }
            RateLimitStrategy::StagedMetadataBuffer { limit, window_secs } => {
                ctx.number_of_metadata_updates_staged >= *limit
                    && (now - ctx.timestamp) < *window_secs
            }
        }
    }
}

/// Wraps a strategy and turns a positive verdict into [`DhaliError::RateLimited`].
#[derive(Clone, Copy)]
pub struct RateLimiter {
    strategy: RateLimitStrategy,
}

impl RateLimiter {
    pub fn new(strategy: RateLimitStrategy) -> Self {
        Self { strategy }
    }

    pub fn check(&self, ctx: &RateLimitContext, now: f64) -> Result<(), DhaliError> {
        if self.strategy.should_limit(ctx, now) {
            Err(DhaliError::RateLimited)
        } else {
            Ok(())
        }
    }
}
