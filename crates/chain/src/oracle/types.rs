//! Oracle type definitions.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::u256_math;

/// Price of `token0` denominated in `token1`, 18 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Price value (1e18 = 1 token1 per token0)
    pub price: U256,
    /// Timestamp when the feeder posted the price
    pub last_update: u64,
}

impl PriceData {
    pub fn new(price: U256, last_update: u64) -> Self {
        Self { price, last_update }
    }

    /// Get price as f64.
    pub fn price_f64(&self) -> f64 {
        u256_math::wad_to_f64(self.price)
    }

    /// Check if price is older than `max_age_secs`.
    pub fn is_stale(&self, max_age_secs: u64, current_time: u64) -> bool {
        self.age_secs(current_time) > max_age_secs
    }

    /// Get age in seconds.
    pub fn age_secs(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.last_update)
    }

    /// Price of the reverse direction (`1e36 / price`).
    pub fn inverse(&self) -> Option<Self> {
        if self.price.is_zero() {
            return None;
        }
        let wad_sq = u256_math::WAD * u256_math::WAD;
        Some(Self {
            price: wad_sq / self.price,
            last_update: self.last_update,
        })
    }
}

/// Directed price key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceSource {
    pub token0: Address,
    pub token1: Address,
}

impl PriceSource {
    pub fn new(token0: Address, token1: Address) -> Self {
        Self { token0, token1 }
    }

    pub fn reversed(&self) -> Self {
        Self {
            token0: self.token1,
            token1: self.token0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::WAD;

    #[test]
    fn test_price_data_conversion() {
        let price = PriceData::new(WAD * U256::from(2000u64), 1_700_000_000);
        assert!((price.price_f64() - 2000.0).abs() < 0.01);
    }

    #[test]
    fn test_inverse() {
        // 10 farm per base -> 0.1 base per farm
        let price = PriceData::new(WAD * U256::from(10u64), 1);
        assert_eq!(price.inverse().unwrap().price, WAD / U256::from(10u64));
        assert!(PriceData::new(U256::ZERO, 1).inverse().is_none());
    }

    #[test]
    fn test_staleness() {
        let price = PriceData::new(WAD, 1_700_000_000);
        let max_age = 86_400;
        assert!(price.is_stale(max_age, 1_700_000_000 + 86_401));
        assert!(!price.is_stale(max_age, 1_700_000_000 + 86_400));
    }
}
