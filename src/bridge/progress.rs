//! # Bridge Progress Tracker
//!
//! Maps the polled bridge-state payload onto the fixed step sequence and
//! derives percent complete. Completion is sticky: once a coin is seen
//! completed (live, from the persisted flag, or from an L1 address on the
//! coin) it stays completed even if a later poll reads stale data.

use crate::chain::{BridgeState, BridgeStep, Coin, GasStatus, StepStatus};
use crate::clients::BridgeStateSource;
use crate::storage::Storage;
use num_bigint::BigUint;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub step: BridgeStep,
    pub status: StepStatus,
}

/// Gas prices for the step currently waiting on gas.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GasWait {
    pub step: BridgeStep,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub current_gas_price: BigUint,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub target_gas_price: BigUint,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeProgress {
    pub coin_id: String,
    pub steps: Vec<StepProgress>,
    pub percent_complete: u8,
    pub is_completed: bool,
    pub gas_wait: Option<GasWait>,
}

impl BridgeProgress {
    fn from_statuses(coin_id: &str, statuses: &[StepStatus], gas: Option<&GasStatus>) -> Self {
        let steps: Vec<StepProgress> = BridgeStep::ALL
            .iter()
            .zip(statuses)
            .map(|(step, status)| StepProgress {
                step: *step,
                status: *status,
            })
            .collect();
        let completed = statuses
            .iter()
            .filter(|s| **s == StepStatus::Completed)
            .count();
        let gas_wait = match (
            steps.iter().find(|s| s.status == StepStatus::WaitingForGas),
            gas,
        ) {
            (Some(waiting), Some(gas)) => Some(GasWait {
                step: waiting.step,
                current_gas_price: gas.current_gas_price.clone(),
                target_gas_price: gas.target_gas_price.clone(),
            }),
            _ => None,
        };

        BridgeProgress {
            coin_id: coin_id.to_string(),
            percent_complete: (completed * 100 / BridgeStep::ALL.len()) as u8,
            is_completed: completed == BridgeStep::ALL.len(),
            steps,
            gas_wait,
        }
    }

    fn completed(coin_id: &str) -> Self {
        Self::from_statuses(coin_id, &[StepStatus::Completed; 5], None)
    }

    fn pending(coin_id: &str) -> Self {
        Self::from_statuses(coin_id, &[StepStatus::Pending; 5], None)
    }
}

/// Orders a raw payload so that every step before the furthest active one is
/// completed and every step after it is pending.
pub fn normalize_steps(state: &BridgeState) -> [StepStatus; 5] {
    let mut statuses = BridgeStep::ALL.map(|step| state.status_of(step));
    if let Some(furthest) = statuses.iter().rposition(|s| *s != StepStatus::Pending) {
        for status in statuses.iter_mut().take(furthest) {
            if *status != StepStatus::Completed {
                log::debug!("Bridge state out of order, promoting earlier step to completed");
                *status = StepStatus::Completed;
            }
        }
    }
    statuses
}

pub struct BridgeProgressTracker {
    source: Arc<dyn BridgeStateSource>,
    storage: Arc<Storage>,
    completed: Mutex<HashSet<String>>,
    last_seen: Mutex<HashMap<String, [StepStatus; 5]>>,
}

impl BridgeProgressTracker {
    pub fn new(source: Arc<dyn BridgeStateSource>, storage: Arc<Storage>) -> Self {
        Self {
            source,
            storage,
            completed: Mutex::new(HashSet::new()),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    fn is_sticky_completed(&self, coin_id: &str) -> bool {
        if self.completed.lock().unwrap().contains(coin_id) {
            return true;
        }
        match self.storage.is_bridge_completed(coin_id) {
            Ok(true) => {
                self.completed.lock().unwrap().insert(coin_id.to_string());
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("Could not read completion flag for {}: {}", coin_id, e);
                false
            }
        }
    }

    fn mark_completed(&self, coin_id: &str) {
        let newly = self.completed.lock().unwrap().insert(coin_id.to_string());
        if newly {
            log::info!("Bridge deployment completed for coin {}", coin_id);
            if let Err(e) = self.storage.mark_bridge_completed(coin_id) {
                log::error!("Failed to persist completion flag for {}: {}", coin_id, e);
            }
        }
    }

    /// A coin carrying an L1 address finished its deployment.
    pub fn observe_coin(&self, coin: &Coin) {
        if coin.is_migrated() {
            self.mark_completed(&coin.id);
        }
    }

    pub async fn get_progress(&self, coin_id: &str) -> BridgeProgress {
        if self.is_sticky_completed(coin_id) {
            return BridgeProgress::completed(coin_id);
        }

        let state = match self.source.bridge_state(coin_id).await {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Bridge state poll for {} failed: {}", coin_id, e);
                // Re-check: another task may have completed it meanwhile.
                if self.is_sticky_completed(coin_id) {
                    return BridgeProgress::completed(coin_id);
                }
                return match self.last_seen.lock().unwrap().get(coin_id) {
                    Some(statuses) => BridgeProgress::from_statuses(coin_id, statuses, None),
                    None => BridgeProgress::pending(coin_id),
                };
            }
        };

        let mut statuses = normalize_steps(&state);
        {
            let mut last_seen = self.last_seen.lock().unwrap();
            if let Some(previous) = last_seen.get(coin_id) {
                // Completed steps never go back.
                let keep = previous
                    .iter()
                    .rposition(|s| *s == StepStatus::Completed)
                    .map(|i| i + 1)
                    .unwrap_or(0);
                for status in statuses.iter_mut().take(keep) {
                    *status = StepStatus::Completed;
                }
            }
            last_seen.insert(coin_id.to_string(), statuses);
        }

        let progress = BridgeProgress::from_statuses(coin_id, &statuses, state.gas_status.as_ref());
        if progress.is_completed {
            self.mark_completed(coin_id);
            self.last_seen.lock().unwrap().remove(coin_id);
        }
        progress
    }
}
