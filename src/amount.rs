//! Exact base-unit arithmetic for payment amounts.
//!
//! All financial math runs on 256-bit unsigned integers in the asset's base
//! units (wei-style). Decimal strings are only ever parsed into base units or
//! rendered out of them for display; display output never feeds back into
//! on-chain amounts.

use alloy::primitives::U256;

use crate::error::EngineError;

/// 10^decimals as a U256. Decimals is a u8, so this cannot overflow.
pub fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

fn invalid(raw: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidAmount {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

/// Parse an amount string into base units.
///
/// A string containing a decimal point is treated as a human decimal and
/// scaled by `10^decimals`; anything else must be a plain base-unit integer.
/// Rejects negative, non-numeric and empty input, and decimals that would
/// need more fractional digits than the asset provides.
pub fn parse_amount(raw: &str, decimals: u8) -> Result<U256, EngineError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid(raw, "empty amount"));
    }
    if s.starts_with('-') {
        return Err(invalid(raw, "amounts cannot be negative"));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return Err(invalid(raw, "no digits"));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(raw, "non-numeric integer part"));
    }

    let int_units = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| invalid(raw, "amount out of range"))?
    };

    let Some(frac) = frac_part else {
        return Ok(int_units);
    };

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(raw, "non-numeric fractional part"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid(
            raw,
            format!("more than {decimals} fractional digits"),
        ));
    }

    let frac_units = if frac.is_empty() {
        U256::ZERO
    } else {
        let padding = decimals as usize - frac.len();
        U256::from_str_radix(frac, 10)
            .map_err(|_| invalid(raw, "amount out of range"))?
            .checked_mul(scale(padding as u8))
            .ok_or_else(|| invalid(raw, "amount out of range"))?
    };

    int_units
        .checked_mul(scale(decimals))
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| invalid(raw, "amount out of range"))
}

/// Render base units as a decimal string for display.
pub fn format_amount(units: U256, decimals: u8) -> String {
    let scale = scale(decimals);
    let whole = units / scale;
    let rem = units % scale;
    if rem.is_zero() {
        return whole.to_string();
    }
    let digits = rem.to_string();
    let frac = format!("{}{}", "0".repeat(decimals as usize - digits.len()), digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Exact checked sum of a sequence of base-unit amounts.
pub fn sum_amounts<'a, I>(amounts: I) -> Result<U256, EngineError>
where
    I: IntoIterator<Item = &'a U256>,
{
    amounts
        .into_iter()
        .try_fold(U256::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or_else(|| invalid("<sum>", "total overflows 256 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn parses_base_unit_integers() {
        assert_eq!(parse_amount("1000", 18).unwrap(), u(1000));
        assert_eq!(parse_amount("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn parses_decimals_scaled() {
        assert_eq!(
            parse_amount("1.5", 18).unwrap(),
            U256::from(15u64) * scale(17)
        );
        assert_eq!(parse_amount("0.000001", 6).unwrap(), u(1));
        assert_eq!(parse_amount("2.", 6).unwrap(), u(2_000_000));
        assert_eq!(parse_amount(".5", 6).unwrap(), u(500_000));
    }

    #[test]
    fn rejects_excess_precision() {
        let err = parse_amount("1.0000001", 6).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount { .. }));
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "-5", "abc", "1.2.3", "1,000", "."] {
            assert!(
                matches!(parse_amount(raw, 18), Err(EngineError::InvalidAmount { .. })),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn handles_amounts_past_u64() {
        // 10_000 tokens at 18 decimals does not fit in 64 bits.
        let v = parse_amount("10000", 0).unwrap() * scale(18);
        assert_eq!(parse_amount("10000000000000000000000", 18).unwrap(), v);
        assert_eq!(format_amount(v, 18), "10000");
    }

    #[test]
    fn formats_trimming_trailing_zeros() {
        assert_eq!(format_amount(u(1_500_000), 6), "1.5");
        assert_eq!(format_amount(u(1), 6), "0.000001");
        assert_eq!(format_amount(U256::ZERO, 6), "0");
    }

    #[test]
    fn sum_is_exact() {
        let amounts = vec![u(100); 450];
        assert_eq!(sum_amounts(&amounts).unwrap(), u(45_000));
    }

    #[test]
    fn sum_overflow_is_an_error() {
        let amounts = [U256::MAX, u(1)];
        assert!(sum_amounts(&amounts).is_err());
    }

    #[test]
    fn display_round_trips_for_display_only() {
        let units = parse_amount("123.456", 6).unwrap();
        assert_eq!(format_amount(units, 6), "123.456");
    }
}
