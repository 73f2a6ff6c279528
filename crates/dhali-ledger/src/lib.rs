pub mod json_rpc;
pub mod mock;

pub use json_rpc::JsonRpcLedgerClient;
pub use mock::MockLedgerClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dhali_core::DhaliError;

/// One channel as reported by the ledger's `account_channels` query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelView {
    pub account: String,
    pub destination_account: String,
    pub channel_id: String,
    /// Escrowed amount, in drops, as a decimal string.
    pub amount: String,
    pub settle_delay: u64,
    pub public_key: String,
    pub has_cancel_after: bool,
}

/// The ledger verifier's (C2) seam onto the underlying ledger. Production
/// code talks to a real node over JSON-RPC ([`JsonRpcLedgerClient`]); tests
/// inject a [`MockLedgerClient`]. The engine depends only on these two
/// operations, never on a specific transport.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn list_channels(
        &self,
        account: &str,
        destination_account: &str,
    ) -> Result<Vec<ChannelView>, DhaliError>;

    async fn verify_signature(
        &self,
        channel_id: &str,
        amount: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<bool, DhaliError>;
}
