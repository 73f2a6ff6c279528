use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use dhali_core::DhaliError;

use crate::{ChannelView, LedgerClient};

/// Deterministic `LedgerClient` double for the engine's own tests. Channels
/// are registered up front; `verify_signature` answers a single configured
/// bool. Call counters let tests assert the signature-cache optimisation
/// (C5 step 5) actually elides redundant ledger calls.
#[derive(Default)]
pub struct MockLedgerClient {
    channels: Mutex<Vec<ChannelView>>,
    verify_result: AtomicBool,
    list_calls: AtomicU64,
    verify_calls: AtomicU64,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            verify_result: AtomicBool::new(true),
            list_calls: AtomicU64::new(0),
            verify_calls: AtomicU64::new(0),
        }
    }

    pub fn with_channel(self, channel: ChannelView) -> Self {
        self.channels.lock().unwrap().push(channel);
        self
    }

    pub fn set_verify_result(&self, verified: bool) {
        self.verify_result.store(verified, Ordering::SeqCst);
    }

    pub fn list_channels_call_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn verify_signature_call_count(&self) -> u64 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn list_channels(
        &self,
        account: &str,
        destination_account: &str,
    ) -> Result<Vec<ChannelView>, DhaliError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let channels = self.channels.lock().unwrap();
        Ok(channels
            .iter()
            .filter(|c| c.account == account && c.destination_account == destination_account)
            .cloned()
            .collect())
    }

    async fn verify_signature(
        &self,
        _channel_id: &str,
        _amount: &str,
        _public_key: &str,
        _signature: &str,
    ) -> Result<bool, DhaliError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verify_result.load(Ordering::SeqCst))
    }
}
