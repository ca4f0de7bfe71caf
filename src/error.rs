//! # Error Taxonomy
//!
//! User-facing error kinds for claims and trades, plus the mapping from raw
//! wallet / JSON-RPC provider failures onto that taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializable discriminant handed to the presentation layer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    WrongNetwork,
    InsufficientFunds,
    UserRejected,
    NoBalanceToClaim,
    InvalidSlippage,
    InvalidAmount,
    RepositoryUnavailable,
    ClaimInProgress,
    Unexpected,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimError {
    #[error("Wallet is not connected")]
    NotConnected,
    #[error("Wrong network: expected chain {expected}")]
    WrongNetwork { expected: u64 },
    #[error("Insufficient funds to cover the transaction")]
    InsufficientFunds,
    #[error("Request rejected in wallet")]
    UserRejected,
    #[error("Nothing to claim for this coin")]
    NoBalanceToClaim,
    #[error("Slippage tolerance must be between 0% and {max}% (got {given})")]
    InvalidSlippage { given: String, max: u32 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Claims repository unavailable: {0}")]
    RepositoryUnavailable(String),
    #[error("A claim is already in progress for coin {coin_id}")]
    ClaimInProgress { coin_id: String },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ClaimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClaimError::NotConnected => ErrorKind::NotConnected,
            ClaimError::WrongNetwork { .. } => ErrorKind::WrongNetwork,
            ClaimError::InsufficientFunds => ErrorKind::InsufficientFunds,
            ClaimError::UserRejected => ErrorKind::UserRejected,
            ClaimError::NoBalanceToClaim => ErrorKind::NoBalanceToClaim,
            ClaimError::InvalidSlippage { .. } => ErrorKind::InvalidSlippage,
            ClaimError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            ClaimError::RepositoryUnavailable(_) => ErrorKind::RepositoryUnavailable,
            ClaimError::ClaimInProgress { .. } => ErrorKind::ClaimInProgress,
            ClaimError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Builds the error for a classified provider failure.
    pub fn from_provider(kind: ErrorKind, err: &ProviderError, expected_chain: u64) -> Self {
        match kind {
            ErrorKind::NotConnected => ClaimError::NotConnected,
            ErrorKind::WrongNetwork => ClaimError::WrongNetwork {
                expected: expected_chain,
            },
            ErrorKind::InsufficientFunds => ClaimError::InsufficientFunds,
            ErrorKind::UserRejected => ClaimError::UserRejected,
            ErrorKind::NoBalanceToClaim => ClaimError::NoBalanceToClaim,
            ErrorKind::RepositoryUnavailable => {
                ClaimError::RepositoryUnavailable(err.message.clone())
            }
            _ => ClaimError::Unexpected(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ClaimError {
    fn from(e: anyhow::Error) -> Self {
        ClaimError::RepositoryUnavailable(format!("{:#}", e))
    }
}

/// JSON error payload of the claims API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ClaimError> for ErrorBody {
    fn from(e: &ClaimError) -> Self {
        ErrorBody {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Raw failure reported by a wallet, contract call or JSON-RPC endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code: {code:?})")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::message(e.to_string())
    }
}

/// JSON-RPC error responses keep their code so the classifier can see it.
impl From<alloy::contract::Error> for ProviderError {
    fn from(e: alloy::contract::Error) -> Self {
        if let alloy::contract::Error::TransportError(rpc) = &e {
            if let Some(payload) = rpc.as_error_resp() {
                return ProviderError::new(Some(payload.code), payload.message.to_string());
            }
        }
        ProviderError::message(e.to_string())
    }
}

/// Maps a provider failure onto the taxonomy. Swap per provider.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, err: &ProviderError) -> ErrorKind;
}

/// EIP-1193 codes first, message patterns as a fallback.
#[derive(Debug, Default, Clone)]
pub struct ProviderErrorClassifier;

const USER_REJECTED_CODE: i64 = 4001;
const UNAUTHORIZED_CODE: i64 = 4100;
const DISCONNECTED_CODE: i64 = 4900;
const CHAIN_DISCONNECTED_CODE: i64 = 4901;
const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

impl ErrorClassifier for ProviderErrorClassifier {
    fn classify(&self, err: &ProviderError) -> ErrorKind {
        match err.code {
            Some(USER_REJECTED_CODE) => return ErrorKind::UserRejected,
            Some(UNAUTHORIZED_CODE) | Some(DISCONNECTED_CODE) => return ErrorKind::NotConnected,
            Some(CHAIN_DISCONNECTED_CODE) | Some(UNRECOGNIZED_CHAIN_CODE) => {
                return ErrorKind::WrongNetwork
            }
            _ => {}
        }

        let msg = err.message.to_ascii_lowercase();
        if msg.contains("insufficient funds") || msg.contains("exceeds balance") {
            ErrorKind::InsufficientFunds
        } else if msg.contains("user rejected")
            || msg.contains("user denied")
            || msg.contains("rejected the request")
        {
            ErrorKind::UserRejected
        } else if msg.contains("nobalancetoclaim")
            || msg.contains("no balance to claim")
            || msg.contains("nothing to claim")
        {
            ErrorKind::NoBalanceToClaim
        } else if msg.contains("chain mismatch") || msg.contains("unrecognized chain") {
            ErrorKind::WrongNetwork
        } else if msg.contains("not connected") || msg.contains("no account") {
            ErrorKind::NotConnected
        } else {
            ErrorKind::Unexpected
        }
    }
}
