pub mod config;
pub mod consolidator;
pub mod mover;
pub mod reconciler;
pub mod validator;
pub mod verifier;

pub use config::EngineConfig;
pub use consolidator::Consolidator;
pub use mover::{move_doc, move_document};
pub use reconciler::Reconciler;
pub use validator::ClaimValidator;

use std::sync::Arc;

use dhali_ledger::LedgerClient;
use dhali_ratelimit::RateLimiter;
use dhali_store::Store;

/// Wires C5-C8 together against one `Store` + `LedgerClient` pair and one
/// `EngineConfig`. A caller (the out-of-scope HTTP surface) holds one of
/// these per process and calls its methods per request.
pub struct Engine<S, L> {
    pub validator: ClaimValidator<S, L>,
    pub reconciler: Reconciler<S>,
    pub consolidator: Consolidator<S>,
}

impl<S, L> Engine<S, L>
where
    S: Store,
    L: LedgerClient + 'static,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, config: &EngineConfig, rate_limiter: RateLimiter) -> Self {
        Self {
            validator: ClaimValidator::new(
                store.clone(),
                ledger,
                config.settle_delay,
                rate_limiter,
            ),
            reconciler: Reconciler::new(store.clone()),
            consolidator: Consolidator::new(store),
        }
    }
}
