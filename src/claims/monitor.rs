//! # Claim Status Monitor
//!
//! Polling state machine over a session's claims. One pass:
//! 1. Flush the claim outbox and start tracking whatever it persisted
//! 2. Observe every claim not known to have failed (relay status, claim
//!    counters, L2 balance), with bounded concurrency
//! 3. Apply derived transitions one claim at a time with compare-and-swap
//!    writes, announcing each status once via the notification ledger
//! 4. Publish the second-wave claimable set
//!
//! The next pass is scheduled only after the current one settles. Stopping
//! prevents the next pass but lets a running one finish. A failed read for
//! one claim is logged and skipped; the others still progress.

use super::ledger::NotificationLedger;
use super::outbox::ClaimOutbox;
use super::repository::{ClaimsRepository, StatusUpdate};
use crate::chain::{Claim, ClaimCounters, ClaimStatus, ClaimableCoin, RelayMessageStatus};
use crate::clients::{ClaimCounterReader, RelayStatusSource};
use crate::error::ProviderError;
use crate::utils::constants::{CLAIM_POLL_INTERVAL_SECS, MAX_CONCURRENT_CLAIM_READS, STATUS_EVENT_CAPACITY};
use futures::stream::{self, StreamExt};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum MonitorEvent {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        claim_id: String,
        coin_id: String,
        status: ClaimStatus,
    },
    ClaimableCoins(Vec<ClaimableCoin>),
}

/// Summary of one polling pass.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub checked: usize,
    pub transitions: usize,
    pub failures: usize,
    pub claimable: Vec<ClaimableCoin>,
}

/// What one claim's reads showed this pass.
#[derive(Debug, Clone, PartialEq)]
enum Observation {
    Relay {
        relay: RelayMessageStatus,
        counters: Option<ClaimCounters>,
    },
    SecondWave(BigUint),
    Settled,
}

/// Next status for an unsettled claim, or `None` when nothing changes.
///
/// `RECEIVED` needs both the relay delivery and a nonzero L1 counter.
/// A delivered message whose L1 counter still reads zero waits for the next pass.
pub fn derive_status(
    current: ClaimStatus,
    relay: RelayMessageStatus,
    counters: Option<&ClaimCounters>,
) -> Option<ClaimStatus> {
    if current.is_terminal() {
        return None;
    }
    let next = match (relay, counters) {
        (RelayMessageStatus::Failed, _) => ClaimStatus::Failed,
        (RelayMessageStatus::Inflight, Some(c)) if c.l1.is_zero() => ClaimStatus::InProgress,
        (RelayMessageStatus::Delivered, Some(c)) if !c.l1.is_zero() => ClaimStatus::Received,
        _ => return None,
    };
    (next != current).then_some(next)
}

pub struct ClaimStatusMonitor {
    relay: Arc<dyn RelayStatusSource>,
    counters: Arc<dyn ClaimCounterReader>,
    repository: Arc<dyn ClaimsRepository>,
    ledger: Arc<dyn NotificationLedger>,
    outbox: Option<Arc<ClaimOutbox>>,
    events: broadcast::Sender<MonitorEvent>,
    // Last known record per claim id. Pass writes are dropped once `run_id`
    // moves past the session they started in.
    known: Mutex<HashMap<String, Claim>>,
    claimable: RwLock<Vec<ClaimableCoin>>,
    is_running: Arc<AtomicBool>,
    run_id: Arc<AtomicU64>,
    interval: Duration,
}

impl ClaimStatusMonitor {
    pub fn new(
        relay: Arc<dyn RelayStatusSource>,
        counters: Arc<dyn ClaimCounterReader>,
        repository: Arc<dyn ClaimsRepository>,
        ledger: Arc<dyn NotificationLedger>,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_EVENT_CAPACITY);
        Self {
            relay,
            counters,
            repository,
            ledger,
            outbox: None,
            events,
            known: Mutex::new(HashMap::new()),
            claimable: RwLock::new(Vec::new()),
            is_running: Arc::new(AtomicBool::new(false)),
            run_id: Arc::new(AtomicU64::new(0)),
            interval: Duration::from_secs(CLAIM_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_outbox(mut self, outbox: Arc<ClaimOutbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// `onStatusChange` stream plus claimable-set updates.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<MonitorEvent> {
        self.events.clone()
    }

    pub fn claimable_coins(&self) -> Vec<ClaimableCoin> {
        self.claimable.read().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Adds a claim to the monitored set if it is not tracked already.
    pub fn track(&self, claim: Claim) {
        self.known
            .lock()
            .unwrap()
            .entry(claim.id.clone())
            .or_insert(claim);
    }

    /// Replaces the monitored set and spawns the polling loop.
    /// A loop from an earlier start exits before its next pass.
    pub fn start_monitoring(self: &Arc<Self>, claims: Vec<Claim>) {
        let my_run_id = {
            let mut known = self.known.lock().unwrap();
            let my_run_id = self.run_id.fetch_add(1, Ordering::Relaxed) + 1;
            known.clear();
            for claim in claims {
                known.insert(claim.id.clone(), claim);
            }
            my_run_id
        };
        self.is_running.store(true, Ordering::Relaxed);

        let monitor = self.clone();
        tokio::spawn(async move {
            log::info!("Claim monitor: started for run_id: {}", my_run_id);
            while monitor.is_current(my_run_id) {
                let report = monitor.poll_once().await;
                log::debug!(
                    "Claim monitor pass: {} checked, {} transitions, {} failures",
                    report.checked,
                    report.transitions,
                    report.failures
                );
                tokio::time::sleep(monitor.interval).await;
            }
            log::info!("Claim monitor: terminated for run_id: {}", my_run_id);
        });
    }

    pub fn stop_monitoring(&self) {
        self.is_running.store(false, Ordering::Relaxed);
    }

    fn is_current(&self, my_run_id: u64) -> bool {
        self.is_running.load(Ordering::Relaxed) && self.run_id.load(Ordering::Relaxed) == my_run_id
    }

    /// Runs one polling pass.
    pub async fn poll_once(&self) -> PassReport {
        let session = self.run_id.load(Ordering::Relaxed);
        if let Some(outbox) = &self.outbox {
            for claim in outbox.flush().await {
                self.track(claim);
            }
        }

        let claims: Vec<Claim> = self
            .known
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.status != ClaimStatus::Failed)
            .cloned()
            .collect();

        let observations: Vec<(Claim, Result<Observation, ProviderError>)> = stream::iter(claims)
            .map(|claim| async move {
                let observation = self.observe(&claim).await;
                (claim, observation)
            })
            .buffered(MAX_CONCURRENT_CLAIM_READS)
            .collect()
            .await;

        let mut report = PassReport {
            checked: observations.len(),
            ..Default::default()
        };

        for (claim, observation) in observations {
            match observation {
                Ok(Observation::Relay { relay, counters }) => {
                    if let Some(next) = derive_status(claim.status, relay, counters.as_ref()) {
                        match self.transition(&claim, next, session).await {
                            Ok(true) => report.transitions += 1,
                            Ok(false) => {}
                            Err(()) => report.failures += 1,
                        }
                    }
                }
                Ok(Observation::SecondWave(l2_balance)) => report.claimable.push(ClaimableCoin {
                    claim_id: claim.id,
                    owner_id: claim.owner_id,
                    coin_id: claim.coin_id,
                    coin_address: claim.coin_address,
                    l2_balance,
                }),
                Ok(Observation::Settled) => {}
                Err(e) => {
                    log::warn!(
                        "Claim {} (tx {}) not checked this pass: {}",
                        claim.id,
                        claim.transaction_hash,
                        e
                    );
                    report.failures += 1;
                }
            }
        }

        self.publish_claimable(&report.claimable);
        report
    }

    async fn observe(&self, claim: &Claim) -> Result<Observation, ProviderError> {
        let relay = self.relay.message_status(&claim.transaction_hash).await?;

        if claim.status == ClaimStatus::Received {
            // Terminal. Only the second-wave check applies.
            if relay == RelayMessageStatus::Failed {
                return Ok(Observation::Settled);
            }
            let counters = self
                .counters
                .claim_counters(&claim.coin_address, &claim.owner_id)
                .await?;
            if !counters.in_sync() || counters.l1.is_zero() {
                return Ok(Observation::Settled);
            }
            let balance = self
                .counters
                .l2_balance(&claim.coin_address, &claim.owner_id)
                .await?;
            return Ok(if balance.is_zero() {
                Observation::Settled
            } else {
                Observation::SecondWave(balance)
            });
        }

        if relay == RelayMessageStatus::Failed {
            return Ok(Observation::Relay {
                relay,
                counters: None,
            });
        }
        let counters = self
            .counters
            .claim_counters(&claim.coin_address, &claim.owner_id)
            .await?;
        Ok(Observation::Relay {
            relay,
            counters: Some(counters),
        })
    }

    /// Persists `next` conditioned on the last known status.
    /// `Ok(true)` when this pass applied the write.
    async fn transition(
        &self,
        claim: &Claim,
        next: ClaimStatus,
        session: u64,
    ) -> Result<bool, ()> {
        let update = self
            .repository
            .update_status(&claim.id, Some(claim.status), next)
            .await;

        match update {
            Ok(StatusUpdate::Applied(stored)) => {
                log::info!(
                    "Claim {} for coin {}: {} -> {}",
                    stored.id,
                    stored.coin_id,
                    claim.status,
                    stored.status
                );
                self.remember(stored.clone(), session);
                self.notify(&stored);
                Ok(true)
            }
            Ok(StatusUpdate::Conflict(stored)) => {
                log::info!(
                    "Claim {} was moved to {} elsewhere, adopting it",
                    stored.id,
                    stored.status
                );
                self.remember(stored.clone(), session);
                if stored.status != claim.status {
                    self.notify(&stored);
                }
                Ok(false)
            }
            Ok(StatusUpdate::NotFound) => {
                log::warn!("Claim {} no longer exists, dropping it", claim.id);
                let mut known = self.known.lock().unwrap();
                if self.run_id.load(Ordering::Relaxed) == session {
                    known.remove(&claim.id);
                }
                Ok(false)
            }
            Err(e) => {
                // Last known status stays put so the next pass retries.
                log::error!("Failed to persist {} for claim {}: {}", next, claim.id, e);
                Err(())
            }
        }
    }

    fn remember(&self, claim: Claim, session: u64) {
        let mut known = self.known.lock().unwrap();
        if self.run_id.load(Ordering::Relaxed) != session {
            log::debug!("Claim {} settled by an earlier session, not tracked", claim.id);
            return;
        }
        known.insert(claim.id.clone(), claim);
    }

    fn notify(&self, claim: &Claim) {
        let announce = match self.ledger.should_notify(&claim.id, claim.status) {
            Ok(announce) => announce,
            Err(e) => {
                log::warn!("Notification ledger unavailable for {}: {}", claim.id, e);
                true
            }
        };
        if !announce {
            log::debug!("Claim {} already announced as {}", claim.id, claim.status);
            return;
        }
        // No subscribers is fine.
        let _ = self.events.send(MonitorEvent::StatusChanged {
            claim_id: claim.id.clone(),
            coin_id: claim.coin_id.clone(),
            status: claim.status,
        });
    }

    fn publish_claimable(&self, coins: &[ClaimableCoin]) {
        let changed = {
            let mut current = self.claimable.write().unwrap();
            if current.as_slice() == coins {
                false
            } else {
                *current = coins.to_vec();
                true
            }
        };
        if changed {
            log::info!("{} coin(s) claimable again", coins.len());
            let _ = self.events.send(MonitorEvent::ClaimableCoins(coins.to_vec()));
        }
    }
}
