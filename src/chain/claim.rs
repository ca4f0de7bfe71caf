//! # Claim Types
//!
//! Claim records, their lifecycle status and the relay / counter observations
//! the monitor derives transitions from.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a claim. `Received` and `Failed` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    InProgress,
    Received,
    Failed,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Received | ClaimStatus::Failed)
    }

    /// Only `IN_PROGRESS` moves forward; rewriting the current status is a no-op.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        *self == next || (*self == ClaimStatus::InProgress && next.is_terminal())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::InProgress => "IN_PROGRESS",
            ClaimStatus::Received => "RECEIVED",
            ClaimStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Ok(ClaimStatus::InProgress),
            "RECEIVED" => Ok(ClaimStatus::Received),
            "FAILED" => Ok(ClaimStatus::Failed),
            other => Err(format!("unknown claim status: {}", other)),
        }
    }
}

/// A user's request to move settled value from L2 custody to an L1-claimable balance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub owner_id: String,
    pub coin_id: String,
    /// L2 token address; counters and balances are read against it.
    pub coin_address: String,
    /// Hash of the relay-triggering call. Primary key for relay polling.
    pub transaction_hash: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
}

impl Claim {
    /// Creates an `IN_PROGRESS` record for a confirmed claim trigger.
    pub fn from_new(new: NewClaim) -> Self {
        Claim {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: new.owner_id,
            coin_id: new.coin_id,
            coin_address: new.coin_address,
            transaction_hash: new.transaction_hash,
            status: ClaimStatus::InProgress,
            created_at: Utc::now(),
        }
    }

    pub fn same_pair(&self, other: &Claim) -> bool {
        self.owner_id.eq_ignore_ascii_case(&other.owner_id) && self.coin_id == other.coin_id
    }
}

/// Body of `POST /claims`. Status always starts as `IN_PROGRESS`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewClaim {
    pub owner_id: String,
    pub coin_id: String,
    pub coin_address: String,
    pub transaction_hash: String,
}

/// Delivery status reported by the relay explorer. Observed only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessageStatus {
    Inflight,
    Delivered,
    Failed,
}

/// Owner's claim counters on both sides of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClaimCounters {
    pub l1: BigUint,
    pub l2: BigUint,
}

impl ClaimCounters {
    pub fn new(l1: u64, l2: u64) -> Self {
        Self {
            l1: BigUint::from(l1),
            l2: BigUint::from(l2),
        }
    }

    /// No relay work is pending when both sides agree.
    pub fn in_sync(&self) -> bool {
        self.l1 == self.l2
    }
}

/// Tokens that arrived after a claim settled and can be withdrawn again
/// without a new relay round-trip. Derived per monitor pass, never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimableCoin {
    pub claim_id: String,
    pub owner_id: String,
    pub coin_id: String,
    pub coin_address: String,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub l2_balance: BigUint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&ClaimStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!("received".parse::<ClaimStatus>(), Ok(ClaimStatus::Received));
        assert!("PENDING".parse::<ClaimStatus>().is_err());
        assert!(!ClaimStatus::InProgress.is_terminal());
        assert!(ClaimStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_claim_starts_in_progress() {
        let claim = Claim::from_new(NewClaim {
            owner_id: "0xowner".to_string(),
            coin_id: "coin-1".to_string(),
            coin_address: "0xtoken".to_string(),
            transaction_hash: "0xabc".to_string(),
        });
        assert_eq!(claim.status, ClaimStatus::InProgress);
        assert!(!claim.id.is_empty());

        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["transactionHash"], "0xabc");
        assert_eq!(json["status"], "IN_PROGRESS");
    }
}
