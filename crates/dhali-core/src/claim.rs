use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DhaliError;

/// A signed off-ledger authorisation to withdraw up to `authorized_to_claim`
/// drops from a specific channel. All five fields are mandatory; none may be
/// inferred or defaulted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub account: String,
    pub destination_account: String,
    /// Decimal string of integer drops, parsed strictly via [`Claim::authorized_to_claim_int`].
    pub authorized_to_claim: String,
    pub signature: String,
    pub channel_id: String,
}

const REQUIRED_FIELDS: [&str; 5] = [
    "account",
    "destination_account",
    "authorized_to_claim",
    "signature",
    "channel_id",
];

impl Claim {
    /// Parses a claim from its JSON-on-the-wire form. Fails with
    /// [`DhaliError::MalformedClaim`] if the payload is not a JSON object,
    /// or any of the five required keys is missing.
    pub fn parse(payload: &str) -> Result<Self, DhaliError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| DhaliError::MalformedClaim(format!("invalid JSON: {e}")))?;

        let obj = value
            .as_object()
            .ok_or_else(|| DhaliError::MalformedClaim("claim is not a JSON object".to_string()))?;

        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(DhaliError::MalformedClaim(format!(
                    "missing required field: {field}"
                )));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| DhaliError::MalformedClaim(format!("invalid claim shape: {e}")))
    }

    /// Strictly parses `authorized_to_claim` as an integer drop count.
    pub fn authorized_to_claim_int(&self) -> Result<i128, DhaliError> {
        self.authorized_to_claim.parse::<i128>().map_err(|_| {
            DhaliError::MalformedClaim(format!(
                "authorized_to_claim is not an integer: {}",
                self.authorized_to_claim
            ))
        })
    }

    /// Canonical JSON form: `serde_json`'s default map is BTreeMap-backed, so
    /// keys sort lexicographically and whitespace is never inserted. Two
    /// claims are equal iff their canonical forms are byte-identical.
    pub fn canonical_json(&self) -> Result<String, DhaliError> {
        let value = serde_json::to_value(self)
            .map_err(|e| DhaliError::Serialization(e.to_string()))?;
        serde_json::to_string(&value).map_err(|e| DhaliError::Serialization(e.to_string()))
    }
}

/// Strips every ASCII whitespace byte, for the whitespace-insensitive
/// raw-string comparisons used by the estimate/exact reconciler.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_claim() {
        let payload = r#"{"account":"A","destination_account":"D","authorized_to_claim":"9000","signature":"sig","channel_id":"CH"}"#;
        let claim = Claim::parse(payload).unwrap();
        assert_eq!(claim.account, "A");
        assert_eq!(claim.authorized_to_claim_int().unwrap(), 9000);
    }

    #[test]
    fn rejects_missing_field() {
        let payload = r#"{"account":"A","destination_account":"D","authorized_to_claim":"9000","signature":"sig"}"#;
        assert!(matches!(
            Claim::parse(payload),
            Err(DhaliError::MalformedClaim(_))
        ));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            Claim::parse("not json"),
            Err(DhaliError::MalformedClaim(_))
        ));
    }

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a = Claim {
            account: "A".to_string(),
            destination_account: "D".to_string(),
            authorized_to_claim: "9000".to_string(),
            signature: "sig".to_string(),
            channel_id: "CH".to_string(),
        };
        let b = a.clone();
        assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
    }

    #[test]
    fn strip_whitespace_ignores_formatting() {
        assert_eq!(strip_whitespace("{ \"a\": 1 }"), "{\"a\":1}");
    }
}
