use dhali_core::{Claim, DhaliError};
use dhali_ledger::LedgerClient;

/// C2's validation policy: finds the ledger channel this claim is drawn
/// against and checks its signature. `settle_delay` is pinned to equality —
/// never `>=` — per the resolved "no downgrade attack" open question.
pub async fn verify_claim<L: LedgerClient>(
    ledger: &L,
    claim: &Claim,
    settle_delay: u64,
) -> Result<(), DhaliError> {
    let channels = ledger
        .list_channels(&claim.account, &claim.destination_account)
        .await?;
    let authorized = claim.authorized_to_claim_int()?;

    let candidate = channels.iter().find(|c| {
        c.channel_id == claim.channel_id
            && c.account == claim.account
            && c.destination_account == claim.destination_account
            && c.settle_delay == settle_delay
            && c
                .amount
                .parse::<i128>()
                .map(|a| a >= authorized)
                .unwrap_or(false)
    });

    let channel = candidate.ok_or(DhaliError::NoMatchingChannel)?;

    if channel.has_cancel_after {
        return Err(DhaliError::ExpirableChannel);
    }

    let verified = ledger
        .verify_signature(
            &claim.channel_id,
            &claim.authorized_to_claim,
            &channel.public_key,
            &claim.signature,
        )
        .await?;

    if !verified {
        return Err(DhaliError::SignatureInvalid);
    }

    Ok(())
}
