//! Last status each claim was announced with, so a status change is
//! announced once even across monitor restarts.

use crate::chain::ClaimStatus;
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait NotificationLedger: Send + Sync {
    fn last_notified(&self, claim_id: &str) -> Result<Option<ClaimStatus>, anyhow::Error>;

    /// Records `status` and returns what was recorded before.
    fn record(&self, claim_id: &str, status: ClaimStatus)
        -> Result<Option<ClaimStatus>, anyhow::Error>;

    /// True when `status` had not been announced for this claim yet.
    fn should_notify(&self, claim_id: &str, status: ClaimStatus) -> Result<bool, anyhow::Error> {
        Ok(self.record(claim_id, status)? != Some(status))
    }
}

impl NotificationLedger for Storage {
    fn last_notified(&self, claim_id: &str) -> Result<Option<ClaimStatus>, anyhow::Error> {
        self.get_notified_status(claim_id)
    }

    fn record(
        &self,
        claim_id: &str,
        status: ClaimStatus,
    ) -> Result<Option<ClaimStatus>, anyhow::Error> {
        self.swap_notified_status(claim_id, status)
    }
}

/// Process-local ledger.
#[derive(Default)]
pub struct MemoryNotificationLedger {
    entries: Mutex<HashMap<String, ClaimStatus>>,
}

impl MemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationLedger for MemoryNotificationLedger {
    fn last_notified(&self, claim_id: &str) -> Result<Option<ClaimStatus>, anyhow::Error> {
        Ok(self.entries.lock().unwrap().get(claim_id).copied())
    }

    fn record(
        &self,
        claim_id: &str,
        status: ClaimStatus,
    ) -> Result<Option<ClaimStatus>, anyhow::Error> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .insert(claim_id.to_string(), status))
    }
}
