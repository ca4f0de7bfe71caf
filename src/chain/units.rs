//! Decimal <-> base-unit conversion for user-entered amounts.

use crate::error::ClaimError;
use num_bigint::BigUint;
use num_traits::Zero;

/// Parses a user-entered decimal amount ("1.5") into base units.
///
/// Rejects empty, signed, non-numeric and zero inputs, and inputs carrying
/// more fractional digits than the token has decimals.
pub fn parse_units(input: &str, decimals: u32) -> Result<BigUint, ClaimError> {
    let s = input.trim().replace('_', "");
    if s.is_empty() {
        return Err(ClaimError::InvalidAmount("amount is empty".to_string()));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ClaimError::InvalidAmount(input.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ClaimError::InvalidAmount(input.to_string()));
    }
    if frac_part.len() > decimals as usize {
        return Err(ClaimError::InvalidAmount(format!(
            "{} has more than {} decimals",
            input, decimals
        )));
    }

    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    let value = if digits.is_empty() {
        BigUint::zero()
    } else {
        BigUint::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| ClaimError::InvalidAmount(input.to_string()))?
    };

    if value.is_zero() {
        return Err(ClaimError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// Renders base units as a decimal string, trimming trailing zeros.
pub fn format_units(value: &BigUint, decimals: u32) -> String {
    let raw = value.to_str_radix(10);
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }
    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(
            parse_units("1.5", 18).unwrap(),
            BigUint::from(1_500_000_000_000_000_000u64)
        );
        assert_eq!(parse_units(" 42 ", 0).unwrap(), BigUint::from(42u32));
        assert_eq!(parse_units(".25", 2).unwrap(), BigUint::from(25u32));
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        for bad in ["", "0", "0.000", "-1", "abc", "1.2.3", "1e18", "."] {
            assert!(
                matches!(parse_units(bad, 18), Err(ClaimError::InvalidAmount(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(parse_units("0.001", 2).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(&BigUint::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(&BigUint::from(5u32), 3), "0.005");
        assert_eq!(format_units(&BigUint::from(7000u32), 3), "7");
    }
}
