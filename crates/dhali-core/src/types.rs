use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Cumulative drops the marketplace intends to extract from a channel.
/// Modelled as `f64` rather than the integer drops of `authorized_to_claim`:
/// consolidation accumulates per-request exact costs that are themselves
/// fractional dollar amounts converted to drops, so `to_claim` is a running
/// real-valued total, not a ledger-settleable integer.
pub type ToClaim = f64;

/// Channel identifier: a stable UUID derived from the on-ledger channel id
/// string, used as the document key across every collection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid(pub Uuid);

impl Cid {
    /// Deterministic derivation matching the distilled system's original
    /// `uuid.uuid5(uuid.NAMESPACE_URL, channel_id)`.
    pub fn derive(channel_id: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, channel_id.as_bytes()))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

/// Per-request identifier for an estimate or exact record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid(pub Uuid);

impl Rid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({})", self.0)
    }
}

/// The only currency/scale pair the engine accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub scale: f64,
}

impl Currency {
    pub fn xrp_drops() -> Self {
        Self {
            code: "XRP".to_string(),
            scale: 0.000_001,
        }
    }

    pub fn is_xrp_drops(&self) -> bool {
        self.code == "XRP" && (self.scale - 0.000_001).abs() < f64::EPSILON
    }
}
