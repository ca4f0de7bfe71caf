use crate::chain::{Claim, ClaimStatus, NewClaim};
use crate::claims::repository::{ClaimPage, ClaimQuery, StatusUpdate};
use crate::utils::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use redb::{Database, Error, ReadableTable, TableDefinition};
use std::sync::Arc;

pub mod claims;

const CLAIMS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("claims");
const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");
const BRIDGE_COMPLETED_TABLE: TableDefinition<&str, u64> = TableDefinition::new("bridge_completed");
const NOTIFIED_TABLE: TableDefinition<&str, &str> = TableDefinition::new("notified_status");
const OUTBOX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("claim_outbox");

/// Result of inserting a claim record.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Claim),
    /// Same transaction hash was already stored.
    Existing(Claim),
    /// The (owner, coin) pair already has a different claim in progress.
    Duplicate(Claim),
}

pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    pub fn new(path: &str) -> Result<Self, Error> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CLAIMS_TABLE)?;
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
            let _ = write_txn.open_table(BRIDGE_COMPLETED_TABLE)?;
            let _ = write_txn.open_table(NOTIFIED_TABLE)?;
            let _ = write_txn.open_table(OUTBOX_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Storage { db: Arc::new(db) })
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    pub fn insert_claim(&self, new: NewClaim) -> Result<InsertOutcome, anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(CLAIMS_TABLE)?;

            let mut existing: Vec<Claim> = Vec::new();
            for item in table.iter()? {
                let (_, value) = item?;
                existing.push(serde_json::from_str(value.value())?);
            }

            if let Some(c) = existing
                .iter()
                .find(|c| c.transaction_hash.eq_ignore_ascii_case(&new.transaction_hash))
            {
                InsertOutcome::Existing(c.clone())
            } else if let Some(c) = existing.iter().find(|c| {
                c.status == ClaimStatus::InProgress
                    && c.owner_id.eq_ignore_ascii_case(&new.owner_id)
                    && c.coin_id == new.coin_id
            }) {
                InsertOutcome::Duplicate(c.clone())
            } else {
                let claim = Claim::from_new(new);
                let json = serde_json::to_string(&claim)?;
                table.insert(claim.id.as_str(), json.as_str())?;
                InsertOutcome::Created(claim)
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    pub fn get_claim(&self, id: &str) -> Result<Option<Claim>, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLAIMS_TABLE)?;
        let result = match table.get(id)? {
            Some(guard) => Some(serde_json::from_str(guard.value())?),
            None => None,
        };
        Ok(result)
    }

    /// Filtered listing, newest first. The cursor is the offset of the next page.
    pub fn list_claims(&self, query: &ClaimQuery) -> Result<ClaimPage, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLAIMS_TABLE)?;

        let mut claims = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let claim: Claim = serde_json::from_str(value.value())?;
            if query.matches(&claim) {
                claims.push(claim);
            }
        }
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let offset = match &query.cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("invalid cursor: {}", c))?,
            None => 0,
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let total = claims.len();
        let page: Vec<Claim> = claims.into_iter().skip(offset).take(limit).collect();
        let next = offset + page.len();
        Ok(ClaimPage {
            claims: page,
            next_cursor: (next < total).then(|| next.to_string()),
        })
    }

    /// Compare-and-swap on the stored status, in a single write transaction.
    /// A settled claim never leaves its terminal status; such writes come
    /// back as a conflict carrying the stored record.
    pub fn update_claim_status(
        &self,
        id: &str,
        expected: Option<ClaimStatus>,
        status: ClaimStatus,
    ) -> Result<StatusUpdate, anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        let update = {
            let mut table = write_txn.open_table(CLAIMS_TABLE)?;
            let current: Option<Claim> = match table.get(id)? {
                Some(guard) => Some(serde_json::from_str(guard.value())?),
                None => None,
            };
            match current {
                None => StatusUpdate::NotFound,
                Some(claim)
                    if expected.map_or(false, |e| e != claim.status)
                        || !claim.status.can_transition_to(status) =>
                {
                    StatusUpdate::Conflict(claim)
                }
                Some(mut claim) => {
                    claim.status = status;
                    let json = serde_json::to_string(&claim)?;
                    table.insert(id, json.as_str())?;
                    StatusUpdate::Applied(claim)
                }
            }
        };
        write_txn.commit()?;
        Ok(update)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn save_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;
        let result = table.get(key)?.map(|guard| guard.value().to_string());
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Sticky bridge completion (no expiry)
    // ------------------------------------------------------------------

    pub fn mark_bridge_completed(&self, coin_id: &str) -> Result<(), anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BRIDGE_COMPLETED_TABLE)?;
            if table.get(coin_id)?.is_none() {
                table.insert(coin_id, chrono::Utc::now().timestamp() as u64)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn is_bridge_completed(&self, coin_id: &str) -> Result<bool, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BRIDGE_COMPLETED_TABLE)?;
        let completed = table.get(coin_id)?.is_some();
        Ok(completed)
    }

    // ------------------------------------------------------------------
    // Last notified claim status
    // ------------------------------------------------------------------

    pub fn get_notified_status(&self, claim_id: &str) -> Result<Option<ClaimStatus>, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFIED_TABLE)?;
        let result = match table.get(claim_id)? {
            Some(guard) => Some(
                guard
                    .value()
                    .parse::<ClaimStatus>()
                    .map_err(anyhow::Error::msg)?,
            ),
            None => None,
        };
        Ok(result)
    }

    /// Records `status` and returns the previously recorded one.
    pub fn swap_notified_status(
        &self,
        claim_id: &str,
        status: ClaimStatus,
    ) -> Result<Option<ClaimStatus>, anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        let previous = {
            let mut table = write_txn.open_table(NOTIFIED_TABLE)?;
            let prev = table
                .insert(claim_id, status.as_str())?
                .map(|guard| guard.value().to_string());
            prev
        };
        write_txn.commit()?;
        previous
            .map(|s| s.parse::<ClaimStatus>().map_err(anyhow::Error::msg))
            .transpose()
    }

    // ------------------------------------------------------------------
    // Claim outbox (confirmed on-chain, not yet persisted to the repository)
    // ------------------------------------------------------------------

    pub fn save_outbox_claim(&self, claim: &NewClaim) -> Result<(), anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OUTBOX_TABLE)?;
            let json = serde_json::to_string(claim)?;
            table.insert(claim.transaction_hash.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn remove_outbox_claim(&self, transaction_hash: &str) -> Result<(), anyhow::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OUTBOX_TABLE)?;
            table.remove(transaction_hash)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_outbox_claims(&self) -> Result<Vec<NewClaim>, anyhow::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_TABLE)?;
        let mut claims = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            claims.push(serde_json::from_str(value.value())?);
        }
        Ok(claims)
    }

    /// Throwaway database under the system temp dir.
    #[cfg(test)]
    pub fn temp() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("claims-test-{}.redb", uuid::Uuid::new_v4()));
        Storage::new(path.to_str().unwrap()).expect("temp database")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_claim(owner: &str, coin: &str, tx: &str) -> NewClaim {
        NewClaim {
            owner_id: owner.to_string(),
            coin_id: coin.to_string(),
            coin_address: format!("0x{}", coin),
            transaction_hash: tx.to_string(),
        }
    }

    #[test]
    fn test_insert_is_idempotent_per_tx_hash() {
        let storage = Storage::temp();
        let first = match storage.insert_claim(new_claim("alice", "c1", "0xaa")).unwrap() {
            InsertOutcome::Created(c) => c,
            other => panic!("unexpected {:?}", other),
        };
        match storage.insert_claim(new_claim("alice", "c1", "0xAA")).unwrap() {
            InsertOutcome::Existing(c) => assert_eq!(c.id, first.id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_second_in_progress_claim_for_pair_is_refused() {
        let storage = Storage::temp();
        storage.insert_claim(new_claim("alice", "c1", "0x01")).unwrap();
        assert!(matches!(
            storage.insert_claim(new_claim("alice", "c1", "0x02")).unwrap(),
            InsertOutcome::Duplicate(_)
        ));
        // other coin, other owner: fine
        assert!(matches!(
            storage.insert_claim(new_claim("alice", "c2", "0x03")).unwrap(),
            InsertOutcome::Created(_)
        ));
        assert!(matches!(
            storage.insert_claim(new_claim("bob", "c1", "0x04")).unwrap(),
            InsertOutcome::Created(_)
        ));
    }

    #[test]
    fn test_status_compare_and_swap() {
        let storage = Storage::temp();
        let claim = match storage.insert_claim(new_claim("alice", "c1", "0x01")).unwrap() {
            InsertOutcome::Created(c) => c,
            other => panic!("unexpected {:?}", other),
        };

        let applied = storage
            .update_claim_status(&claim.id, Some(ClaimStatus::InProgress), ClaimStatus::Failed)
            .unwrap();
        assert!(matches!(applied, StatusUpdate::Applied(ref c) if c.status == ClaimStatus::Failed));

        let conflict = storage
            .update_claim_status(&claim.id, Some(ClaimStatus::InProgress), ClaimStatus::Received)
            .unwrap();
        assert!(matches!(conflict, StatusUpdate::Conflict(ref c) if c.status == ClaimStatus::Failed));

        assert_eq!(
            storage
                .update_claim_status("missing", None, ClaimStatus::Failed)
                .unwrap(),
            StatusUpdate::NotFound
        );
    }

    #[test]
    fn test_terminal_status_is_never_rewritten() {
        let storage = Storage::temp();
        let received = match storage.insert_claim(new_claim("alice", "c1", "0x01")).unwrap() {
            InsertOutcome::Created(c) => c,
            other => panic!("unexpected {:?}", other),
        };
        storage
            .update_claim_status(&received.id, Some(ClaimStatus::InProgress), ClaimStatus::Received)
            .unwrap();

        // Unconditional write back to IN_PROGRESS
        let back = storage
            .update_claim_status(&received.id, None, ClaimStatus::InProgress)
            .unwrap();
        assert!(matches!(back, StatusUpdate::Conflict(ref c) if c.status == ClaimStatus::Received));

        // Matching expectation does not unlock a terminal record
        let failed = match storage.insert_claim(new_claim("alice", "c2", "0x02")).unwrap() {
            InsertOutcome::Created(c) => c,
            other => panic!("unexpected {:?}", other),
        };
        storage
            .update_claim_status(&failed.id, None, ClaimStatus::Failed)
            .unwrap();
        let flipped = storage
            .update_claim_status(&failed.id, Some(ClaimStatus::Failed), ClaimStatus::Received)
            .unwrap();
        assert!(matches!(flipped, StatusUpdate::Conflict(ref c) if c.status == ClaimStatus::Failed));

        // Re-asserting the settled status is accepted and changes nothing
        let same = storage
            .update_claim_status(&failed.id, None, ClaimStatus::Failed)
            .unwrap();
        assert!(matches!(same, StatusUpdate::Applied(ref c) if c.status == ClaimStatus::Failed));
        assert_eq!(
            storage.get_claim(&received.id).unwrap().unwrap().status,
            ClaimStatus::Received
        );
    }

    #[test]
    fn test_paginated_listing_with_filters() {
        let storage = Storage::temp();
        for i in 0..5 {
            storage
                .insert_claim(new_claim("alice", &format!("c{}", i), &format!("0x{}", i)))
                .unwrap();
        }
        storage.insert_claim(new_claim("bob", "c9", "0x99")).unwrap();

        let mut query = ClaimQuery::for_owner("alice");
        query.limit = Some(2);
        let first = storage.list_claims(&query).unwrap();
        assert_eq!(first.claims.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        query.cursor = Some("4".to_string());
        let last = storage.list_claims(&query).unwrap();
        assert_eq!(last.claims.len(), 1);
        assert!(last.next_cursor.is_none());

        let by_coin = storage
            .list_claims(&ClaimQuery::default().with_coin_address("0xC9"))
            .unwrap();
        assert_eq!(by_coin.claims.len(), 1);
        assert_eq!(by_coin.claims[0].owner_id, "bob");
    }

    #[test]
    fn test_bridge_completion_and_notified_status() {
        let storage = Storage::temp();
        assert!(!storage.is_bridge_completed("c1").unwrap());
        storage.mark_bridge_completed("c1").unwrap();
        storage.mark_bridge_completed("c1").unwrap();
        assert!(storage.is_bridge_completed("c1").unwrap());

        assert_eq!(storage.get_notified_status("x").unwrap(), None);
        assert_eq!(
            storage.swap_notified_status("x", ClaimStatus::Failed).unwrap(),
            None
        );
        assert_eq!(
            storage.swap_notified_status("x", ClaimStatus::Failed).unwrap(),
            Some(ClaimStatus::Failed)
        );
    }

    #[test]
    fn test_outbox() {
        let storage = Storage::temp();
        storage.save_outbox_claim(&new_claim("alice", "c1", "0x01")).unwrap();
        assert_eq!(storage.get_outbox_claims().unwrap().len(), 1);
        storage.remove_outbox_claim("0x01").unwrap();
        assert!(storage.get_outbox_claims().unwrap().is_empty());
    }
}
