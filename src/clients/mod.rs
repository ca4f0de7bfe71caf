//! # External Collaborators
//!
//! Seams to everything this engine observes or drives but does not own:
//! wallet, bridge contract, pricing oracle, relay explorer, chain reads and
//! the coin API. HTTP/JSON-RPC implementations live in the submodules.

pub mod coins;
pub mod relay;
pub mod repository;
pub mod rpc;

use crate::chain::{BridgeState, ClaimCounters, RelayMessageStatus};
use crate::error::ProviderError;
use async_trait::async_trait;
use num_bigint::BigUint;
use std::time::Duration;

pub use coins::HttpBridgeStateSource;
pub use relay::ExplorerRelayClient;
pub use repository::HttpClaimsRepository;
pub use rpc::JsonRpcChainReader;

/// Bridge message discriminants understood by the fee oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Migration = 0,
    Claim = 1,
}

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Connected account, if any.
    async fn account(&self) -> Option<String>;
    async fn chain_id(&self) -> Result<u64, ProviderError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait PricingOracle: Send + Sync {
    async fn quote_tokens_out(
        &self,
        token: &str,
        eth_amount: &BigUint,
    ) -> Result<BigUint, ProviderError>;

    async fn quote_eth_out(
        &self,
        token: &str,
        token_amount: &BigUint,
    ) -> Result<BigUint, ProviderError>;
}

#[async_trait]
pub trait FeeOracle: Send + Sync {
    async fn quote_fee(
        &self,
        token: &str,
        message_type: MessageType,
    ) -> Result<BigUint, ProviderError>;
}

#[async_trait]
pub trait ClaimTrigger: Send + Sync {
    /// Submits the claim call with `fee` attached and waits for confirmation.
    async fn trigger_claim(
        &self,
        owner: &str,
        token: &str,
        is_first_claim: bool,
        fee: &BigUint,
    ) -> Result<TxReceipt, ProviderError>;
}

#[async_trait]
pub trait RelayStatusSource: Send + Sync {
    async fn message_status(&self, tx_hash: &str) -> Result<RelayMessageStatus, ProviderError>;
}

#[async_trait]
pub trait ClaimCounterReader: Send + Sync {
    async fn claim_counters(&self, token: &str, owner: &str)
        -> Result<ClaimCounters, ProviderError>;

    async fn l2_balance(&self, token: &str, owner: &str) -> Result<BigUint, ProviderError>;
}

#[async_trait]
pub trait BridgeStateSource: Send + Sync {
    async fn bridge_state(&self, coin_id: &str) -> Result<BridgeState, ProviderError>;
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
