//! Checked U256 arithmetic for ledger accounting.
//!
//! Every helper that can overflow, underflow or divide by zero returns a
//! [`ChainError`] instead of wrapping, so a bad input aborts the whole call
//! rather than corrupting balances.

use alloy::primitives::U256;

use crate::error::{ChainError, Result};

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Basis points denominator as a plain integer.
pub const MAX_BPS: u64 = 10_000;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

#[inline(always)]
pub fn add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(ChainError::Overflow)
}

#[inline(always)]
pub fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(ChainError::Underflow)
}

#[inline(always)]
pub fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(ChainError::Overflow)
}

#[inline(always)]
pub fn div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(ChainError::DivisionByZero)
}

/// Floor of `a * b / denominator`.
#[inline(always)]
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    div(mul(a, b)?, denominator)
}

/// Take `bps` basis points of `value`, rounding down.
///
/// Example: bps(1000, 250) = 25
#[inline(always)]
pub fn bps(value: U256, basis_points: u64) -> Result<U256> {
    mul_div(value, U256::from(basis_points), BPS_DENOMINATOR)
}

/// Integer square root (Babylonian method), rounding down.
pub fn sqrt(x: U256) -> U256 {
    if x.is_zero() {
        return U256::ZERO;
    }
    let mut z = x;
    let mut y = x / U256::from(2u8) + U256::from(1u8);
    while y < z {
        z = y;
        y = (x / y + y) / U256::from(2u8);
    }
    z
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

/// Convert f64 to WAD (18 decimals).
/// Use for converting configuration values to U256.
#[inline(always)]
pub fn f64_to_wad(value: f64) -> U256 {
    if value <= 0.0 {
        return U256::ZERO;
    }
    U256::from((value * 1e18) as u128)
}

/// Whole tokens to WAD without going through floating point.
#[inline(always)]
pub fn ether(units: u64) -> U256 {
    U256::from(units) * WAD
}

/// Safe minimum of two U256 values
#[inline(always)]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// Safe maximum of two U256 values
#[inline(always)]
pub fn max(a: U256, b: U256) -> U256 {
    if a > b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bps() {
        let value = U256::from(1000u64);
        assert_eq!(bps(value, 100).unwrap(), U256::from(10u64));
        assert_eq!(bps(value, 250).unwrap(), U256::from(25u64));
        assert_eq!(bps(value, 0).unwrap(), U256::ZERO);
        // Rounds down
        assert_eq!(bps(U256::from(3u64), 5000).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_checked_ops() {
        assert_eq!(sub(U256::from(1u64), U256::from(2u64)), Err(ChainError::Underflow));
        assert_eq!(add(U256::MAX, U256::from(1u64)), Err(ChainError::Overflow));
        assert_eq!(mul(U256::MAX, U256::from(2u64)), Err(ChainError::Overflow));
        assert_eq!(div(U256::from(1u64), U256::ZERO), Err(ChainError::DivisionByZero));
        assert_eq!(
            mul_div(U256::from(10u64), U256::from(3u64), U256::from(4u64)).unwrap(),
            U256::from(7u64)
        );
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(U256::ZERO), U256::ZERO);
        assert_eq!(sqrt(U256::from(1u64)), U256::from(1u64));
        assert_eq!(sqrt(U256::from(15u64)), U256::from(3u64));
        assert_eq!(sqrt(U256::from(16u64)), U256::from(4u64));
        // sqrt(1e18 * 1e18) = 1e18
        assert_eq!(sqrt(WAD * WAD), WAD);
        // sqrt(1e18 * 0.1e18) = 316227766016837933
        assert_eq!(
            sqrt(WAD * (WAD / U256::from(10u64))),
            U256::from(316_227_766_016_837_933u64)
        );
        let root = sqrt(U256::MAX);
        assert!(root * root <= U256::MAX);
    }

    #[test]
    fn test_wad_to_f64() {
        let wad = U256::from(1000u64) * WAD;
        assert!((wad_to_f64(wad) - 1000.0).abs() < 0.001);
        assert_eq!(f64_to_wad(0.5), WAD / U256::from(2u64));
        assert_eq!(f64_to_wad(-1.0), U256::ZERO);
        assert_eq!(ether(3), U256::from(3u64) * WAD);
    }
}
