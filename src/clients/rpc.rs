//! # Contract Reads
//!
//! Read-only calls against the L2: claim counters and balance on the token,
//! bonding-curve quotes and the bridge fee. Bindings come from `sol!`.

use super::{ClaimCounterReader, FeeOracle, MessageType, PricingOracle};
use crate::chain::ClaimCounters;
use crate::error::ProviderError;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use num_bigint::BigUint;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IClaimToken {
        function balanceOf(address account) external view returns (uint256);
        function claimsOnL1(address owner) external view returns (uint256);
        function claimsOnL2(address owner) external view returns (uint256);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IBondingCurve {
        function calculateTokensToReceive(address token, uint256 ethAmount) external view returns (uint256);
        function calculateEthToReceive(address token, uint256 tokenAmount) external view returns (uint256);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IBridge {
        function quoteFee(address token, uint8 messageType) external view returns (uint256);
    }
}

pub struct JsonRpcChainReader {
    provider: DynProvider,
    bonding_curve: String,
    bridge: String,
}

impl JsonRpcChainReader {
    pub fn new(rpc_url: &str, bonding_curve: &str, bridge: &str) -> Result<Self, anyhow::Error> {
        let url = rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| anyhow::anyhow!("Invalid L2 RPC URL {}: {}", rpc_url, e))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self {
            provider,
            bonding_curve: bonding_curve.to_string(),
            bridge: bridge.to_string(),
        })
    }
}

pub fn parse_address(address: &str) -> Result<Address, ProviderError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| ProviderError::message(format!("invalid address {}: {}", address, e)))
}

fn to_u256(value: &BigUint) -> Result<U256, ProviderError> {
    U256::try_from_be_slice(&value.to_bytes_be())
        .ok_or_else(|| ProviderError::message("value does not fit in uint256"))
}

fn to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

#[async_trait]
impl ClaimCounterReader for JsonRpcChainReader {
    async fn claim_counters(
        &self,
        token: &str,
        owner: &str,
    ) -> Result<ClaimCounters, ProviderError> {
        let contract = IClaimToken::new(parse_address(token)?, self.provider.clone());
        let owner = parse_address(owner)?;
        let l1 = contract.claimsOnL1(owner);
        let l2 = contract.claimsOnL2(owner);
        let (l1, l2) = tokio::try_join!(async { l1.call().await }, async { l2.call().await })?;
        Ok(ClaimCounters {
            l1: to_biguint(l1),
            l2: to_biguint(l2),
        })
    }

    async fn l2_balance(&self, token: &str, owner: &str) -> Result<BigUint, ProviderError> {
        let contract = IClaimToken::new(parse_address(token)?, self.provider.clone());
        let balance = contract.balanceOf(parse_address(owner)?).call().await?;
        Ok(to_biguint(balance))
    }
}

#[async_trait]
impl PricingOracle for JsonRpcChainReader {
    async fn quote_tokens_out(
        &self,
        token: &str,
        eth_amount: &BigUint,
    ) -> Result<BigUint, ProviderError> {
        let curve = IBondingCurve::new(parse_address(&self.bonding_curve)?, self.provider.clone());
        let out = curve
            .calculateTokensToReceive(parse_address(token)?, to_u256(eth_amount)?)
            .call()
            .await?;
        Ok(to_biguint(out))
    }

    async fn quote_eth_out(
        &self,
        token: &str,
        token_amount: &BigUint,
    ) -> Result<BigUint, ProviderError> {
        let curve = IBondingCurve::new(parse_address(&self.bonding_curve)?, self.provider.clone());
        let out = curve
            .calculateEthToReceive(parse_address(token)?, to_u256(token_amount)?)
            .call()
            .await?;
        Ok(to_biguint(out))
    }
}

#[async_trait]
impl FeeOracle for JsonRpcChainReader {
    async fn quote_fee(
        &self,
        token: &str,
        message_type: MessageType,
    ) -> Result<BigUint, ProviderError> {
        let bridge = IBridge::new(parse_address(&self.bridge)?, self.provider.clone());
        let fee = bridge
            .quoteFee(parse_address(token)?, message_type as u8)
            .call()
            .await?;
        Ok(to_biguint(fee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_call_encoding() {
        assert_eq!(IClaimToken::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);

        let account = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
        let data = IClaimToken::balanceOfCall { account }.abi_encode();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(data[35], 0xaa);

        let token = parse_address("0x00000000000000000000000000000000000000bb").unwrap();
        let data = IBridge::quoteFeeCall {
            token,
            messageType: MessageType::Claim as u8,
        }
        .abi_encode();
        assert_eq!(data.len(), 4 + 2 * 32);
        assert_eq!(data[67], 1);
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz00000000000000000000000000000000000000").is_err());
        // case is not a checksum requirement here
        assert_eq!(
            parse_address("0xABCDEF0000000000000000000000000000000001").unwrap(),
            parse_address("0xabcdef0000000000000000000000000000000001").unwrap()
        );
    }

    #[test]
    fn test_uint_conversions() {
        let value = BigUint::from(890_000u64);
        assert_eq!(to_biguint(to_u256(&value).unwrap()), value);
        assert_eq!(to_biguint(U256::MAX), (BigUint::from(1u8) << 256) - 1u8);
        assert!(to_u256(&(BigUint::from(1u8) << 256)).is_err());
    }

    #[tokio::test]
    async fn test_bad_rpc_url_is_rejected() {
        assert!(JsonRpcChainReader::new("not a url", "", "").is_err());
        assert!(JsonRpcChainReader::new("http://127.0.0.1:8545", "", "").is_ok());
    }
}
