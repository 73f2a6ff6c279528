use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use dhali_core::DhaliError;

use crate::{ChannelView, LedgerClient};

/// `account_channels` reports an expirable channel by the mere presence of a
/// `cancel_after` key, not a boolean — `ChannelView::has_cancel_after` is
/// this client's normalised view, derived below rather than deserialised
/// directly, since the wire format never sends that field by name.
#[derive(Deserialize)]
struct RawChannel {
    account: String,
    destination_account: String,
    channel_id: String,
    amount: String,
    settle_delay: u64,
    public_key: String,
    #[serde(default)]
    cancel_after: Option<Value>,
}

impl RawChannel {
    fn into_view(self) -> ChannelView {
        ChannelView {
            has_cancel_after: self.cancel_after.is_some(),
            account: self.account,
            destination_account: self.destination_account,
            channel_id: self.channel_id,
            amount: self.amount,
            settle_delay: self.settle_delay,
            public_key: self.public_key,
        }
    }
}

/// Reference `LedgerClient` implementation for local development and
/// examples: a thin JSON-RPC-over-HTTP client mirroring the request/response
/// shapes of §6. Production deployments are expected to supply their own
/// transport against the same trait.
pub struct JsonRpcLedgerClient {
    url: String,
    client: reqwest::Client,
}

impl JsonRpcLedgerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, DhaliError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": [params],
            "id": 1,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DhaliError::Ledger(e.to_string()))?;

        let json: Value = resp
            .json()
            .await
            .map_err(|e| DhaliError::Ledger(e.to_string()))?;

        if let Some(err) = json.get("error") {
            return Err(DhaliError::Ledger(err.to_string()));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| DhaliError::Ledger("response missing result".to_string()))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn list_channels(
        &self,
        account: &str,
        destination_account: &str,
    ) -> Result<Vec<ChannelView>, DhaliError> {
        let result = self
            .call(
                "account_channels",
                json!({ "account": account, "destination_account": destination_account }),
            )
            .await?;

        let channels = match result.get("channels") {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };

        let raw: Vec<RawChannel> = serde_json::from_value(channels.clone())
            .map_err(|e| DhaliError::Ledger(format!("malformed account_channels response: {e}")))?;

        Ok(raw.into_iter().map(RawChannel::into_view).collect())
    }

    async fn verify_signature(
        &self,
        channel_id: &str,
        amount: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<bool, DhaliError> {
        let result = self
            .call(
                "channel_verify",
                json!({
                    "amount": amount,
                    "channel_id": channel_id,
                    "public_key": public_key,
                    "signature": signature,
                }),
            )
            .await?;

        result
            .get("signature_verified")
            .and_then(Value::as_bool)
            .ok_or_else(|| DhaliError::Ledger("malformed channel_verify response".to_string()))
    }
}
