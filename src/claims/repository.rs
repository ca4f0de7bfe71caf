//! ClaimsRepository contract shared by the local redb store and the HTTP client.

use crate::chain::{Claim, ClaimStatus, NewClaim};
use crate::error::ClaimError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Filters for `GET /claims`. All filters are optional and combined with AND.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClaimStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ClaimQuery {
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: Some(owner_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_coin_address(mut self, coin_address: &str) -> Self {
        self.coin_address = Some(coin_address.to_string());
        self
    }

    pub fn matches(&self, claim: &Claim) -> bool {
        self.owner_id
            .as_ref()
            .map_or(true, |o| o.eq_ignore_ascii_case(&claim.owner_id))
            && self.status.map_or(true, |s| s == claim.status)
            && self
                .coin_address
                .as_ref()
                .map_or(true, |a| a.eq_ignore_ascii_case(&claim.coin_address))
    }
}

/// One page of claims, newest first.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPage {
    pub claims: Vec<Claim>,
    pub next_cursor: Option<String>,
}

/// Outcome of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Applied(Claim),
    /// Stored status differed from the expected one; carries the stored claim.
    Conflict(Claim),
    NotFound,
}

#[async_trait]
pub trait ClaimsRepository: Send + Sync {
    /// Persists a new `IN_PROGRESS` claim.
    ///
    /// Re-posting a known transaction hash returns the existing record.
    /// Fails with `ClaimInProgress` when the (owner, coin) pair already has
    /// an `IN_PROGRESS` claim under a different transaction.
    async fn create(&self, new: NewClaim) -> Result<Claim, ClaimError>;

    async fn get(&self, id: &str) -> Result<Option<Claim>, ClaimError>;

    async fn list(&self, query: &ClaimQuery) -> Result<ClaimPage, ClaimError>;

    /// Writes `status` if the stored status equals `expected`
    /// (unconditional when `expected` is `None`). Terminal records only
    /// accept their own status; anything else is a `Conflict`.
    async fn update_status(
        &self,
        id: &str,
        expected: Option<ClaimStatus>,
        status: ClaimStatus,
    ) -> Result<StatusUpdate, ClaimError>;

    /// Follows the cursor until the listing is exhausted.
    async fn list_all(&self, query: &ClaimQuery) -> Result<Vec<Claim>, ClaimError> {
        let mut query = query.clone();
        let mut claims = Vec::new();
        loop {
            let page = self.list(&query).await?;
            claims.extend(page.claims);
            match page.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        Ok(claims)
    }
}

/// Body of `PUT /claims/{id}/status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<ClaimStatus>,
}
