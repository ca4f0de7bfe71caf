//! # Slippage-Bounded Orders
//!
//! Turns a user-entered amount and slippage tolerance into a trade order with
//! a guaranteed minimum output. The guaranteed-minimum path is integer-only:
//!
//! `minimum = quote * (1000 - (tolerance% + 1) * 10) / 1000`, floored.
//!
//! The extra percentage point absorbs drift between quote and execution.

use crate::chain::parse_units;
use crate::error::ClaimError;
use crate::utils::constants::{
    MAX_SLIPPAGE_PERCENT, SLIPPAGE_DENOMINATOR, SLIPPAGE_SAFETY_MARGIN_PERCENT, TOKEN_DECIMALS,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Where the order executes: the L2 bonding curve before migration,
/// the settlement-chain pool after it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Venue {
    BondingCurve,
    SettlementSwap,
}

/// Slippage tolerance in per-mille (tenths of a percent), 0..=250.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlippageTolerance {
    per_mille: u32,
}

impl SlippageTolerance {
    pub fn from_percent(percent: u32) -> Result<Self, ClaimError> {
        if percent > MAX_SLIPPAGE_PERCENT {
            return Err(ClaimError::InvalidSlippage {
                given: percent.to_string(),
                max: MAX_SLIPPAGE_PERCENT,
            });
        }
        Ok(Self {
            per_mille: percent * 10,
        })
    }

    /// Parses a percentage such as "10" or "0.5".
    ///
    /// Digits past the first decimal round the tolerance up, which rounds the
    /// minimum output down.
    pub fn parse(input: &str) -> Result<Self, ClaimError> {
        let invalid = || ClaimError::InvalidSlippage {
            given: input.to_string(),
            max: MAX_SLIPPAGE_PERCENT,
        };
        let s = input.trim().trim_end_matches('%');
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if (int_part.is_empty() && frac_part.is_empty())
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || int_part.len() > 3
        {
            return Err(invalid());
        }

        let whole: u32 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut frac = frac_part.chars();
        let tenths = frac
            .next()
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0);
        let round_up = frac.any(|c| c != '0') as u32;

        let per_mille = whole * 10 + tenths + round_up;
        if per_mille > MAX_SLIPPAGE_PERCENT * 10 {
            return Err(invalid());
        }
        Ok(Self { per_mille })
    }

    pub fn per_mille(&self) -> u32 {
        self.per_mille
    }

    /// Share of the quote guaranteed to the user, in per-mille.
    pub fn min_output_factor(&self) -> u32 {
        SLIPPAGE_DENOMINATOR - (self.per_mille + SLIPPAGE_SAFETY_MARGIN_PERCENT * 10)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeOrder {
    pub side: TradeSide,
    pub venue: Venue,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub input_amount: BigUint,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub quoted_output: BigUint,
    /// User-entered tolerance, per-mille.
    pub slippage_per_mille: u32,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub minimum_output: BigUint,
}

/// Floor of `quote * factor / 1000`.
pub fn minimum_output(quote: &BigUint, tolerance: SlippageTolerance) -> BigUint {
    quote * BigUint::from(tolerance.min_output_factor()) / BigUint::from(SLIPPAGE_DENOMINATOR)
}

#[derive(Debug, Clone, Copy)]
pub struct SlippageOrderBuilder {
    venue: Venue,
    decimals: u32,
}

impl Default for SlippageOrderBuilder {
    fn default() -> Self {
        Self::new(Venue::BondingCurve)
    }
}

impl SlippageOrderBuilder {
    pub fn new(venue: Venue) -> Self {
        Self {
            venue,
            decimals: TOKEN_DECIMALS,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Builds an order from raw user input. Pure: submission and quote
    /// refreshing are the caller's job.
    pub fn build_order(
        &self,
        side: TradeSide,
        input_amount: &str,
        slippage_percent: &str,
        quote: &BigUint,
    ) -> Result<TradeOrder, ClaimError> {
        let tolerance = SlippageTolerance::parse(slippage_percent)?;
        let input = parse_units(input_amount, self.decimals)?;
        Ok(self.build_order_units(side, input, tolerance, quote))
    }

    pub fn build_order_units(
        &self,
        side: TradeSide,
        input_amount: BigUint,
        tolerance: SlippageTolerance,
        quote: &BigUint,
    ) -> TradeOrder {
        TradeOrder {
            side,
            venue: self.venue,
            input_amount,
            quoted_output: quote.clone(),
            slippage_per_mille: tolerance.per_mille(),
            minimum_output: minimum_output(quote, tolerance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_percent_on_one_million() {
        let order = SlippageOrderBuilder::default()
            .with_decimals(0)
            .build_order(TradeSide::Buy, "5", "10", &BigUint::from(1_000_000u32))
            .unwrap();
        assert_eq!(order.minimum_output, BigUint::from(890_000u32));
        assert_eq!(order.slippage_per_mille, 100);
        assert_eq!(order.venue, Venue::BondingCurve);
    }

    #[test]
    fn test_minimum_never_exceeds_quote_and_shrinks_with_tolerance() {
        for quote in [1u64, 7, 999, 1_000_000, 123_456_789_012_345_678] {
            let q = BigUint::from(quote);
            let mut previous: Option<BigUint> = None;
            for pct in 0..=MAX_SLIPPAGE_PERCENT {
                let min = minimum_output(&q, SlippageTolerance::from_percent(pct).unwrap());
                assert!(min <= q);
                if let Some(prev) = &previous {
                    assert!(&min <= prev, "not monotonic at {}% for {}", pct, quote);
                }
                previous = Some(min);
            }
        }
    }

    #[test]
    fn test_rejects_out_of_range_slippage() {
        let builder = SlippageOrderBuilder::default();
        let q = BigUint::from(100u32);
        for bad in ["26", "25.1", "-1", "abc", "", "1000"] {
            assert!(
                matches!(
                    builder.build_order(TradeSide::Sell, "1", bad, &q),
                    Err(ClaimError::InvalidSlippage { .. })
                ),
                "{:?}",
                bad
            );
        }
        assert!(builder.build_order(TradeSide::Sell, "1", "25", &q).is_ok());
        assert!(builder.build_order(TradeSide::Sell, "1", "0", &q).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let builder = SlippageOrderBuilder::default();
        let q = BigUint::from(100u32);
        for bad in ["0", "-3", "", "ten"] {
            assert!(matches!(
                builder.build_order(TradeSide::Buy, bad, "5", &q),
                Err(ClaimError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_fractional_tolerance_rounds_against_the_user() {
        assert_eq!(SlippageTolerance::parse("0.5").unwrap().per_mille(), 5);
        assert_eq!(SlippageTolerance::parse("0.55").unwrap().per_mille(), 6);
        assert_eq!(SlippageTolerance::parse("2.50").unwrap().per_mille(), 25);
        assert_eq!(SlippageTolerance::parse("3%").unwrap().per_mille(), 30);

        // 1000 - (5.5 + 10) = 984.5 -> floors to 984
        let t = SlippageTolerance::parse("0.55").unwrap();
        assert_eq!(t.min_output_factor(), 984);
    }
}
