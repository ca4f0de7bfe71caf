//! # Claim Lifecycle Manager
//!
//! User-gated claim initiation:
//! 1. Require a connected wallet
//! 2. Switch to the L2 network if needed
//! 3. Refuse if the (owner, coin) pair already has a claim in progress
//! 4. Quote the bridge fee for a claim message
//! 5. Submit the claim call and wait for confirmation
//! 6. Persist an `IN_PROGRESS` record (outbox on failure)
//!
//! The current stage is published on a watch channel for the presentation
//! layer. A failed stage returns to `Idle` after a short dismiss delay.

use super::outbox::ClaimOutbox;
use super::repository::{ClaimQuery, ClaimsRepository};
use crate::chain::{format_units, ClaimStatus, NewClaim};
use crate::clients::{ClaimTrigger, FeeOracle, MessageType, WalletSession};
use crate::error::{ClaimError, ErrorClassifier, ErrorKind, ProviderError, ProviderErrorClassifier};
use crate::utils::constants::{ERROR_DISMISS_SECS, TOKEN_DECIMALS};
use num_bigint::BigUint;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum ClaimStage {
    Idle,
    SwitchingNetwork,
    QuotingFee,
    AwaitingConfirmation,
    Persisting,
    Submitted,
    Failed { kind: ErrorKind },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub success: bool,
    pub transaction_hash: Option<String>,
    /// Bridge fee attached to the claim call, in wei.
    #[serde(with = "crate::serde_helpers::opt_biguint_string")]
    pub fee: Option<BigUint>,
    pub error: Option<ErrorKind>,
    pub message: Option<String>,
}

impl ClaimResult {
    fn submitted(transaction_hash: String, fee: BigUint) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash),
            fee: Some(fee),
            error: None,
            message: None,
        }
    }

    fn failed(err: &ClaimError) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            fee: None,
            error: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }
}

type PairKey = (String, String);

/// Holds the (owner, coin) slot for the duration of one initiation.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<PairKey>>,
    key: PairKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<PairKey>>, owner: &str, coin_id: &str) -> Option<Self> {
        let key = (owner.to_ascii_lowercase(), coin_id.to_string());
        if !set.lock().unwrap().insert(key.clone()) {
            return None;
        }
        Some(Self { set, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.key);
    }
}

pub struct ClaimLifecycleManager {
    wallet: Arc<dyn WalletSession>,
    fees: Arc<dyn FeeOracle>,
    trigger: Arc<dyn ClaimTrigger>,
    repository: Arc<dyn ClaimsRepository>,
    outbox: Option<Arc<ClaimOutbox>>,
    classifier: Arc<dyn ErrorClassifier>,
    l2_chain_id: u64,
    stage: Arc<watch::Sender<ClaimStage>>,
    // Bumped on every failure so an older dismiss timer cannot clear a newer error.
    failure_id: Arc<AtomicU64>,
    dismiss_after: Duration,
    in_flight: Mutex<HashSet<PairKey>>,
}

impl ClaimLifecycleManager {
    pub fn new(
        wallet: Arc<dyn WalletSession>,
        fees: Arc<dyn FeeOracle>,
        trigger: Arc<dyn ClaimTrigger>,
        repository: Arc<dyn ClaimsRepository>,
        l2_chain_id: u64,
    ) -> Self {
        let (stage, _) = watch::channel(ClaimStage::Idle);
        Self {
            wallet,
            fees,
            trigger,
            repository,
            outbox: None,
            classifier: Arc::new(ProviderErrorClassifier),
            l2_chain_id,
            stage: Arc::new(stage),
            failure_id: Arc::new(AtomicU64::new(0)),
            dismiss_after: Duration::from_secs(ERROR_DISMISS_SECS),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_outbox(mut self, outbox: Arc<ClaimOutbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_dismiss_after(mut self, dismiss_after: Duration) -> Self {
        self.dismiss_after = dismiss_after;
        self
    }

    pub fn stage(&self) -> ClaimStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<ClaimStage> {
        self.stage.subscribe()
    }

    /// Runs the whole initiation and waits for on-chain confirmation.
    pub async fn initiate_claim(
        &self,
        owner: &str,
        token: &str,
        coin_id: &str,
        is_first_claim: bool,
    ) -> ClaimResult {
        match self.try_initiate(owner, token, coin_id, is_first_claim).await {
            Ok((hash, fee)) => {
                self.stage.send_replace(ClaimStage::Submitted);
                ClaimResult::submitted(hash, fee)
            }
            Err(e) => {
                log::warn!("Claim for coin {} by {} failed: {}", coin_id, owner, e);
                self.fail(e.kind());
                ClaimResult::failed(&e)
            }
        }
    }

    async fn try_initiate(
        &self,
        owner: &str,
        token: &str,
        coin_id: &str,
        is_first_claim: bool,
    ) -> Result<(String, BigUint), ClaimError> {
        if self.wallet.account().await.is_none() {
            return Err(ClaimError::NotConnected);
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, owner, coin_id).ok_or_else(|| {
            ClaimError::ClaimInProgress {
                coin_id: coin_id.to_string(),
            }
        })?;

        self.ensure_network().await?;
        self.ensure_no_open_claim(owner, token, coin_id).await?;

        self.stage.send_replace(ClaimStage::QuotingFee);
        let fee = self
            .fees
            .quote_fee(token, MessageType::Claim)
            .await
            .map_err(|e| self.classify(&e))?;
        log::debug!("Claim fee for {}: {} ETH", token, format_units(&fee, TOKEN_DECIMALS));

        self.stage.send_replace(ClaimStage::AwaitingConfirmation);
        let receipt = self
            .trigger
            .trigger_claim(owner, token, is_first_claim, &fee)
            .await
            .map_err(|e| self.classify(&e))?;
        log::info!(
            "Claim confirmed for coin {} (tx {}, block {:?})",
            coin_id,
            receipt.transaction_hash,
            receipt.block_number
        );

        self.stage.send_replace(ClaimStage::Persisting);
        self.persist(NewClaim {
            owner_id: owner.to_string(),
            coin_id: coin_id.to_string(),
            coin_address: token.to_string(),
            transaction_hash: receipt.transaction_hash.clone(),
        })
        .await;

        Ok((receipt.transaction_hash, fee))
    }

    async fn ensure_network(&self) -> Result<(), ClaimError> {
        let wrong_network = ClaimError::WrongNetwork {
            expected: self.l2_chain_id,
        };
        let current = self.wallet.chain_id().await.map_err(|e| self.classify(&e))?;
        if current == self.l2_chain_id {
            return Ok(());
        }

        self.stage.send_replace(ClaimStage::SwitchingNetwork);
        log::info!("Switching wallet from chain {} to {}", current, self.l2_chain_id);
        if let Err(e) = self.wallet.switch_chain(self.l2_chain_id).await {
            log::warn!("Network switch rejected: {}", e);
            return Err(wrong_network);
        }
        match self.wallet.chain_id().await {
            Ok(id) if id == self.l2_chain_id => Ok(()),
            _ => Err(wrong_network),
        }
    }

    /// A pair is open if the repository holds an `IN_PROGRESS` claim for it or
    /// a confirmed claim is still waiting in the outbox. An unreachable
    /// repository refuses the claim rather than risk a second on-chain call.
    async fn ensure_no_open_claim(
        &self,
        owner: &str,
        token: &str,
        coin_id: &str,
    ) -> Result<(), ClaimError> {
        let in_progress = || ClaimError::ClaimInProgress {
            coin_id: coin_id.to_string(),
        };

        if let Some(outbox) = &self.outbox {
            let queued = outbox.pending().into_iter().any(|c| {
                c.owner_id.eq_ignore_ascii_case(owner) && c.coin_id == coin_id
            });
            if queued {
                return Err(in_progress());
            }
        }

        let query = ClaimQuery::for_owner(owner)
            .with_status(ClaimStatus::InProgress)
            .with_coin_address(token);
        match self.repository.list_all(&query).await {
            Ok(open) if open.iter().any(|c| c.coin_id == coin_id) => Err(in_progress()),
            Ok(_) => Ok(()),
            Err(ClaimError::RepositoryUnavailable(msg)) => {
                Err(ClaimError::RepositoryUnavailable(msg))
            }
            Err(e) => Err(ClaimError::RepositoryUnavailable(e.to_string())),
        }
    }

    /// The on-chain claim already happened, so failures here never reach the caller.
    async fn persist(&self, new: NewClaim) {
        match self.repository.create(new.clone()).await {
            Ok(claim) => log::info!("Claim {} recorded as {}", new.transaction_hash, claim.id),
            Err(e) => {
                log::error!(
                    "Claim {} confirmed but not recorded: {}",
                    new.transaction_hash,
                    e
                );
                match &self.outbox {
                    Some(outbox) => {
                        if let Err(e) = outbox.enqueue(&new) {
                            log::error!("Outbox write for {} failed: {}", new.transaction_hash, e);
                        }
                    }
                    None => log::error!(
                        "No outbox configured; claim {} must be reconciled manually",
                        new.transaction_hash
                    ),
                }
            }
        }
    }

    fn classify(&self, err: &ProviderError) -> ClaimError {
        let kind = self.classifier.classify(err);
        ClaimError::from_provider(kind, err, self.l2_chain_id)
    }

    fn fail(&self, kind: ErrorKind) {
        let my_failure = self.failure_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.stage.send_replace(ClaimStage::Failed { kind });

        let stage = self.stage.clone();
        let failure_id = self.failure_id.clone();
        let delay = self.dismiss_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if failure_id.load(Ordering::Relaxed) != my_failure {
                return;
            }
            stage.send_if_modified(|s| {
                if matches!(s, ClaimStage::Failed { .. }) {
                    *s = ClaimStage::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Claim;
    use crate::claims::repository::{ClaimPage, StatusUpdate};
    use crate::clients::TxReceipt;
    use crate::storage::Storage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    struct FakeWallet {
        account: Option<String>,
        chain: AtomicU64,
        allow_switch: bool,
    }

    #[async_trait]
    impl WalletSession for FakeWallet {
        async fn account(&self) -> Option<String> {
            self.account.clone()
        }

        async fn chain_id(&self) -> Result<u64, ProviderError> {
            Ok(self.chain.load(Ordering::SeqCst))
        }

        async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
            if !self.allow_switch {
                return Err(ProviderError::new(Some(4001), "User rejected the request."));
            }
            self.chain.store(chain_id, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedFee;

    #[async_trait]
    impl FeeOracle for FixedFee {
        async fn quote_fee(
            &self,
            _token: &str,
            message_type: MessageType,
        ) -> Result<BigUint, ProviderError> {
            assert_eq!(message_type, MessageType::Claim);
            Ok(BigUint::from(1_000u32))
        }
    }

    struct FakeTrigger {
        calls: AtomicUsize,
        error: Option<ProviderError>,
    }

    #[async_trait]
    impl ClaimTrigger for FakeTrigger {
        async fn trigger_claim(
            &self,
            _owner: &str,
            _token: &str,
            _is_first_claim: bool,
            fee: &BigUint,
        ) -> Result<TxReceipt, ProviderError> {
            assert_eq!(fee, &BigUint::from(1_000u32));
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(TxReceipt {
                    transaction_hash: format!("0xhash{}", n),
                    block_number: Some(10),
                }),
            }
        }
    }

    struct DownRepository {
        down: AtomicBool,
    }

    #[async_trait]
    impl ClaimsRepository for DownRepository {
        async fn create(&self, _new: NewClaim) -> Result<Claim, ClaimError> {
            Err(ClaimError::RepositoryUnavailable("503".to_string()))
        }

        async fn get(&self, _id: &str) -> Result<Option<Claim>, ClaimError> {
            Ok(None)
        }

        async fn list(&self, _query: &ClaimQuery) -> Result<ClaimPage, ClaimError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(ClaimError::RepositoryUnavailable("503".to_string()));
            }
            Ok(ClaimPage::default())
        }

        async fn update_status(
            &self,
            _id: &str,
            _expected: Option<ClaimStatus>,
            _status: ClaimStatus,
        ) -> Result<StatusUpdate, ClaimError> {
            Ok(StatusUpdate::NotFound)
        }
    }

    fn wallet(chain: u64, allow_switch: bool) -> Arc<FakeWallet> {
        Arc::new(FakeWallet {
            account: Some("0xowner".to_string()),
            chain: AtomicU64::new(chain),
            allow_switch,
        })
    }

    fn trigger(error: Option<ProviderError>) -> Arc<FakeTrigger> {
        Arc::new(FakeTrigger {
            calls: AtomicUsize::new(0),
            error,
        })
    }

    #[tokio::test]
    async fn test_claim_switches_network_and_persists() {
        let repo = Arc::new(Storage::temp());
        let manager =
            ClaimLifecycleManager::new(wallet(1, true), Arc::new(FixedFee), trigger(None), repo.clone(), 8453);

        let result = manager.initiate_claim("0xowner", "0xtoken", "coin-1", true).await;
        assert!(result.success, "{:?}", result);
        assert_eq!(result.transaction_hash.as_deref(), Some("0xhash0"));
        assert_eq!(result.fee, Some(BigUint::from(1_000u32)));
        assert_eq!(manager.stage(), ClaimStage::Submitted);

        let stored = repo
            .list_all(&ClaimQuery::for_owner("0xowner"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, ClaimStatus::InProgress);
        assert_eq!(stored[0].transaction_hash, "0xhash0");
    }

    #[tokio::test]
    async fn test_duplicate_initiation_is_refused() {
        let trig = trigger(None);
        let manager = ClaimLifecycleManager::new(
            wallet(8453, true),
            Arc::new(FixedFee),
            trig.clone(),
            Arc::new(Storage::temp()),
            8453,
        );
        assert!(manager.initiate_claim("0xowner", "0xtoken", "coin-1", true).await.success);

        let second = manager.initiate_claim("0xOWNER", "0xtoken", "coin-1", false).await;
        assert!(!second.success);
        assert_eq!(second.error, Some(ErrorKind::ClaimInProgress));
        assert_eq!(trig.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_connected_and_rejected_switch() {
        let disconnected = Arc::new(FakeWallet {
            account: None,
            chain: AtomicU64::new(8453),
            allow_switch: true,
        });
        let trig = trigger(None);
        let manager = ClaimLifecycleManager::new(
            disconnected,
            Arc::new(FixedFee),
            trig.clone(),
            Arc::new(Storage::temp()),
            8453,
        );
        let result = manager.initiate_claim("0xowner", "0xtoken", "c", true).await;
        assert_eq!(result.error, Some(ErrorKind::NotConnected));

        let manager = ClaimLifecycleManager::new(
            wallet(1, false),
            Arc::new(FixedFee),
            trig.clone(),
            Arc::new(Storage::temp()),
            8453,
        );
        let result = manager.initiate_claim("0xowner", "0xtoken", "c", true).await;
        assert_eq!(result.error, Some(ErrorKind::WrongNetwork));
        assert_eq!(trig.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_transaction_fails_then_dismisses() {
        let manager = ClaimLifecycleManager::new(
            wallet(8453, true),
            Arc::new(FixedFee),
            trigger(Some(ProviderError::new(Some(4001), "User denied transaction signature"))),
            Arc::new(Storage::temp()),
            8453,
        )
        .with_dismiss_after(Duration::from_millis(20));

        let result = manager.initiate_claim("0xowner", "0xtoken", "c", true).await;
        assert_eq!(result.error, Some(ErrorKind::UserRejected));
        assert_eq!(
            manager.stage(),
            ClaimStage::Failed {
                kind: ErrorKind::UserRejected
            }
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.stage(), ClaimStage::Idle);

        // the pair is free again after a failure
        let again = manager.initiate_claim("0xowner", "0xtoken", "c", true).await;
        assert_eq!(again.error, Some(ErrorKind::UserRejected));
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_classified() {
        let manager = ClaimLifecycleManager::new(
            wallet(8453, true),
            Arc::new(FixedFee),
            trigger(Some(ProviderError::new(
                Some(-32000),
                "insufficient funds for gas * price + value",
            ))),
            Arc::new(Storage::temp()),
            8453,
        );
        let result = manager.initiate_claim("0xowner", "0xtoken", "c", true).await;
        assert_eq!(result.error, Some(ErrorKind::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_surfaced() {
        let repo: Arc<dyn ClaimsRepository> = Arc::new(DownRepository {
            down: AtomicBool::new(false),
        });
        let outbox = Arc::new(ClaimOutbox::new(Arc::new(Storage::temp()), repo.clone()));
        let manager = ClaimLifecycleManager::new(
            wallet(8453, true),
            Arc::new(FixedFee),
            trigger(None),
            repo,
            8453,
        )
        .with_outbox(outbox.clone());

        let result = manager.initiate_claim("0xowner", "0xtoken", "coin-1", true).await;
        assert!(result.success);
        let pending = outbox.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].transaction_hash, "0xhash0");
    }

    #[tokio::test]
    async fn test_queued_claim_or_unreachable_repository_blocks_second_trigger() {
        let repo = Arc::new(DownRepository {
            down: AtomicBool::new(false),
        });
        let outbox = Arc::new(ClaimOutbox::new(Arc::new(Storage::temp()), repo.clone()));
        let trig = trigger(None);
        let manager = ClaimLifecycleManager::new(
            wallet(8453, true),
            Arc::new(FixedFee),
            trig.clone(),
            repo.clone(),
            8453,
        )
        .with_outbox(outbox.clone());

        // First claim confirms on-chain but only reaches the outbox.
        assert!(manager.initiate_claim("0xowner", "0xtoken", "coin-1", true).await.success);
        assert_eq!(outbox.pending().len(), 1);

        let retry = manager.initiate_claim("0xOwner", "0xtoken", "coin-1", false).await;
        assert_eq!(retry.error, Some(ErrorKind::ClaimInProgress));
        assert_eq!(trig.calls.load(Ordering::SeqCst), 1);

        // Listing is down too: other coins are refused instead of waved through.
        repo.down.store(true, Ordering::SeqCst);
        let other = manager.initiate_claim("0xowner", "0xtoken", "coin-2", true).await;
        assert_eq!(other.error, Some(ErrorKind::RepositoryUnavailable));
        assert_eq!(trig.calls.load(Ordering::SeqCst), 1);
    }
}
