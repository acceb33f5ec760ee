//! Checked fixed-point helpers.

use primitive_types::U256;

use crate::{error::LaunchpadError, Balance, BPS_DENOM};

/// floor(a * b / d) over a 256-bit intermediate; errors only when the quotient
/// does not fit u128.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, LaunchpadError> {
    if d == 0 {
        return Err(LaunchpadError::MathOverflow);
    }
    if let Some(p) = a.checked_mul(b) {
        return Ok(p / d);
    }
    let q = U256::from(a) * U256::from(b) / U256::from(d);
    u128::try_from(q).map_err(|_| LaunchpadError::MathOverflow)
}

/// Scale by basis points (bps / 10_000).
#[inline]
pub fn mul_bps(amount: Balance, bps: u32) -> Result<Balance, LaunchpadError> {
    mul_div(amount, bps as u128, BPS_DENOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_floored() {
        assert_eq!(mul_div(10, 3, 4).unwrap(), 7);
        assert_eq!(mul_bps(1_000, 1_000).unwrap(), 100);
        assert_eq!(mul_bps(999, 3_333).unwrap(), 332);
    }

    #[test]
    fn high_unit_price_keeps_precision() {
        const UNIT: u128 = crate::UNIT;
        // 500 payment tokens at 1000 per sale token
        assert_eq!(mul_div(500 * UNIT, UNIT, 1_000 * UNIT).unwrap(), UNIT / 2);
        assert_eq!(mul_div(u128::MAX, UNIT, 3 * UNIT).unwrap(), u128::MAX / 3);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
    }

    #[test]
    fn wide_product_uses_split_path() {
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 4).unwrap(), a);
        assert_eq!(mul_bps(u128::MAX, 5_000).unwrap(), u128::MAX / 2);
    }

    #[test]
    fn zero_divisor_and_overflow() {
        assert!(matches!(mul_div(1, 1, 0), Err(LaunchpadError::MathOverflow)));
        assert!(matches!(mul_div(u128::MAX, u128::MAX, 1), Err(LaunchpadError::MathOverflow)));
    }
}
