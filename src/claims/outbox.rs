//! Claims confirmed on-chain whose repository write failed.
//!
//! Entries live in the local store keyed by transaction hash and are retried
//! at the start of every monitor pass until the repository accepts them.

use super::repository::ClaimsRepository;
use crate::chain::{Claim, NewClaim};
use crate::error::ClaimError;
use crate::storage::Storage;
use std::sync::Arc;

pub struct ClaimOutbox {
    storage: Arc<Storage>,
    repository: Arc<dyn ClaimsRepository>,
}

impl ClaimOutbox {
    pub fn new(storage: Arc<Storage>, repository: Arc<dyn ClaimsRepository>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    pub fn enqueue(&self, claim: &NewClaim) -> Result<(), anyhow::Error> {
        self.storage.save_outbox_claim(claim)?;
        log::warn!(
            "Claim {} for coin {} queued for persistence retry",
            claim.transaction_hash,
            claim.coin_id
        );
        Ok(())
    }

    pub fn pending(&self) -> Vec<NewClaim> {
        match self.storage.get_outbox_claims() {
            Ok(claims) => claims,
            Err(e) => {
                log::error!("Failed to read claim outbox: {}", e);
                Vec::new()
            }
        }
    }

    /// Retries every queued claim. Returns the records the repository accepted.
    pub async fn flush(&self) -> Vec<Claim> {
        let mut persisted = Vec::new();
        for new in self.pending() {
            let tx = new.transaction_hash.clone();
            match self.repository.create(new).await {
                Ok(claim) => {
                    log::info!("Outbox claim {} persisted as {}", tx, claim.id);
                    if let Err(e) = self.storage.remove_outbox_claim(&tx) {
                        log::error!("Failed to drop outbox entry {}: {}", tx, e);
                    }
                    persisted.push(claim);
                }
                // Another claim for the pair is still open; wait for it to settle.
                Err(ClaimError::ClaimInProgress { coin_id }) => {
                    log::warn!(
                        "Outbox claim {} deferred: coin {} has a claim in progress",
                        tx,
                        coin_id
                    );
                }
                Err(e) => log::warn!("Outbox claim {} still not persisted: {}", tx, e),
            }
        }
        persisted
    }
}
