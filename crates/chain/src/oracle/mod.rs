//! Price oracle used by worker stability checks.
//!
//! A single feeder posts directed prices; reads fall back to the inverse
//! direction when only the reverse pair was posted.
//!
//! - [`PriceOracle`]: read interface consumed by worker configs
//! - [`SimplePriceOracle`]: feeder-driven implementation

mod types;

pub use types::{PriceData, PriceSource};

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

use crate::error::{ChainError, Result};

/// Read side of a price oracle.
pub trait PriceOracle: Send + Sync + Debug {
    /// Price of `token0` in `token1` (1e18 scale) and the time it was posted.
    fn get_price(&self, token0: Address, token1: Address) -> Result<(U256, u64)>;
}

/// Oracle fed by one privileged account.
#[derive(Debug, Clone)]
pub struct SimplePriceOracle {
    /// Account allowed to post prices
    pub feeder: Address,
    prices: HashMap<PriceSource, PriceData>,
}

impl SimplePriceOracle {
    pub fn new(feeder: Address) -> Self {
        Self {
            feeder,
            prices: HashMap::new(),
        }
    }

    /// Post a batch of prices at `now`. Only the feeder may call this.
    pub fn set_prices(
        &mut self,
        caller: Address,
        updates: &[(Address, Address, U256)],
        now: u64,
    ) -> Result<()> {
        if caller != self.feeder {
            return Err(ChainError::NotFeeder);
        }
        for &(token0, token1, price) in updates {
            self.prices
                .insert(PriceSource::new(token0, token1), PriceData::new(price, now));
            debug!(token0 = %token0, token1 = %token1, price = %price, "Price posted");
        }
        Ok(())
    }

    pub fn set_feeder(&mut self, feeder: Address) {
        self.feeder = feeder;
    }

    fn lookup(&self, source: PriceSource) -> Option<PriceData> {
        if let Some(data) = self.prices.get(&source) {
            return Some(*data);
        }
        self.prices.get(&source.reversed()).and_then(PriceData::inverse)
    }
}

impl PriceOracle for SimplePriceOracle {
    fn get_price(&self, token0: Address, token1: Address) -> Result<(U256, u64)> {
        let data = self
            .lookup(PriceSource::new(token0, token1))
            .ok_or(ChainError::NoPrice)?;
        if data.price.is_zero() {
            return Err(ChainError::NoPrice);
        }
        Ok((data.price, data.last_update))
    }
}
