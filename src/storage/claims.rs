//! ClaimsRepository backed by the local redb store.

use super::{InsertOutcome, Storage};
use crate::chain::{Claim, ClaimStatus, NewClaim};
use crate::claims::repository::{ClaimPage, ClaimQuery, ClaimsRepository, StatusUpdate};
use crate::error::ClaimError;
use async_trait::async_trait;

#[async_trait]
impl ClaimsRepository for Storage {
    async fn create(&self, new: NewClaim) -> Result<Claim, ClaimError> {
        let coin_id = new.coin_id.clone();
        match self.insert_claim(new)? {
            InsertOutcome::Created(claim) => {
                log::info!(
                    "Claim {} created for {} on coin {} (tx {})",
                    claim.id,
                    claim.owner_id,
                    claim.coin_id,
                    claim.transaction_hash
                );
                Ok(claim)
            }
            InsertOutcome::Existing(claim) => Ok(claim),
            InsertOutcome::Duplicate(existing) => {
                log::warn!(
                    "Refusing claim for coin {}: claim {} still in progress",
                    coin_id,
                    existing.id
                );
                Err(ClaimError::ClaimInProgress { coin_id })
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Claim>, ClaimError> {
        Ok(self.get_claim(id)?)
    }

    async fn list(&self, query: &ClaimQuery) -> Result<ClaimPage, ClaimError> {
        Ok(self.list_claims(query)?)
    }

    async fn update_status(
        &self,
        id: &str,
        expected: Option<ClaimStatus>,
        status: ClaimStatus,
    ) -> Result<StatusUpdate, ClaimError> {
        Ok(self.update_claim_status(id, expected, status)?)
    }
}
