//! Cached bonding-curve quotes.
//!
//! Oracle reads may revert or time out; callers get the last good quote
//! (flagged stale) or a zero quote instead of an error.

use super::slippage::{SlippageOrderBuilder, SlippageTolerance, TradeOrder, TradeSide};
use crate::chain::parse_units;
use crate::clients::PricingOracle;
use crate::error::ClaimError;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub amount_out: BigUint,
    pub fetched_at: DateTime<Utc>,
    /// Set when the oracle failed and this value came from the cache (or is zero).
    pub stale: bool,
}

type QuoteKey = (String, TradeSide);

/// Latest quote for a (token, side); a new input amount replaces it.
#[derive(Debug, Clone)]
struct CachedQuote {
    input: BigUint,
    quote: Quote,
}

pub struct QuoteService {
    oracle: Arc<dyn PricingOracle>,
    cache: Mutex<HashMap<QuoteKey, CachedQuote>>,
    freshness: Duration,
}

impl QuoteService {
    pub fn new(oracle: Arc<dyn PricingOracle>, freshness: Duration) -> Self {
        Self {
            oracle,
            cache: Mutex::new(HashMap::new()),
            freshness,
        }
    }

    fn key(token: &str, side: TradeSide) -> QuoteKey {
        (token.to_ascii_lowercase(), side)
    }

    /// Buy quotes tokens out for ETH in; sell quotes ETH out for tokens in.
    pub async fn quote(&self, token: &str, side: TradeSide, input: &BigUint) -> Quote {
        let result = match side {
            TradeSide::Buy => self.oracle.quote_tokens_out(token, input).await,
            TradeSide::Sell => self.oracle.quote_eth_out(token, input).await,
        };
        match result {
            Ok(amount_out) => {
                let quote = Quote {
                    amount_out,
                    fetched_at: Utc::now(),
                    stale: false,
                };
                self.cache.lock().unwrap().insert(
                    Self::key(token, side),
                    CachedQuote {
                        input: input.clone(),
                        quote: quote.clone(),
                    },
                );
                quote
            }
            Err(e) => {
                log::warn!("Quote for {} ({:?}) failed: {}", token, side, e);
                match self.cached(token, side, input) {
                    Some(cached) => Quote {
                        stale: true,
                        ..cached
                    },
                    None => Quote {
                        amount_out: BigUint::zero(),
                        fetched_at: Utc::now(),
                        stale: true,
                    },
                }
            }
        }
    }

    /// True when no quote is cached for this input or the cached one aged out.
    pub fn needs_refresh(&self, token: &str, side: TradeSide, input: &BigUint) -> bool {
        match self.cached(token, side, input) {
            Some(q) => {
                let age = Utc::now().signed_duration_since(q.fetched_at);
                age.to_std().map(|a| a > self.freshness).unwrap_or(false)
            }
            None => true,
        }
    }

    fn cached(&self, token: &str, side: TradeSide, input: &BigUint) -> Option<Quote> {
        self.cache
            .lock()
            .unwrap()
            .get(&Self::key(token, side))
            .filter(|c| &c.input == input)
            .map(|c| c.quote.clone())
    }

    /// Quotes (re-using a fresh cached quote) and builds a bounded order.
    pub async fn prepare_order(
        &self,
        builder: &SlippageOrderBuilder,
        token: &str,
        side: TradeSide,
        input_amount: &str,
        slippage_percent: &str,
        decimals: u32,
    ) -> Result<TradeOrder, ClaimError> {
        let tolerance = SlippageTolerance::parse(slippage_percent)?;
        let input = parse_units(input_amount, decimals)?;

        let quote = match self.cached(token, side, &input) {
            Some(q) if !self.needs_refresh(token, side, &input) => q,
            _ => self.quote(token, side, &input).await,
        };
        if quote.amount_out.is_zero() {
            return Err(ClaimError::Unexpected(
                "no price quote available for this trade".to_string(),
            ));
        }
        Ok(builder.build_order_units(side, input, tolerance, &quote.amount_out))
    }
}
