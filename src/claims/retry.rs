//! Retry eligibility for failed claims. Derived on read, never stored.

use crate::chain::{Claim, ClaimStatus};

/// Newest claim of the pair by creation time; the id breaks ties.
fn newest_for_pair<'a>(claim: &Claim, history: &'a [Claim]) -> Option<&'a Claim> {
    history
        .iter()
        .filter(|c| c.same_pair(claim))
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// A failed claim may be retried only if it is the newest claim for its
/// (owner, coin) pair and nothing for that pair was ever received.
///
/// `history` is every known claim; claims of other pairs are ignored.
pub fn is_retryable(claim: &Claim, history: &[Claim]) -> bool {
    if claim.status != ClaimStatus::Failed {
        return false;
    }
    let received = history
        .iter()
        .any(|c| c.same_pair(claim) && c.status == ClaimStatus::Received);
    if received {
        return false;
    }
    match newest_for_pair(claim, history) {
        Some(newest) => newest.id == claim.id,
        // `claim` itself is not part of `history`
        None => true,
    }
}

/// The single retryable claim among `claims` for one pair, if any.
pub fn retryable_claim(claims: &[Claim]) -> Option<&Claim> {
    claims.iter().find(|c| is_retryable(c, claims))
}
