//! Position valuation and the vault-side stability check.

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::{self, mul, MAX_BPS, WAD};
use farmvault_chain::{Chain, ChainError, PriceOracle};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Worker;
use crate::config::WorkerParams;
use crate::error::{ProtocolError, Result};

impl Worker {
    /// Base-token value of position `id`: its LP split pro rata into both
    /// legs, with the farming leg sold into the rest of the pool.
    pub fn health(&self, chain: &Chain, id: u64) -> Result<U256> {
        let lp_balance = self.share_to_balance(chain, self.share_of(id))?;
        if lp_balance.is_zero() {
            return Ok(U256::ZERO);
        }
        let (r_base, r_farming) = chain.amm.get_reserves(self.tokens.base, self.tokens.farming)?;
        let lp_supply = chain.tokens.total_supply(self.tokens.lp);

        let base_amount = u256_math::mul_div(lp_balance, r_base, lp_supply)?;
        let farming_amount = u256_math::mul_div(lp_balance, r_farming, lp_supply)?;
        let sold = market_sell_amount(
            chain,
            farming_amount,
            u256_math::sub(r_farming, farming_amount)?,
            u256_math::sub(r_base, base_amount)?,
        )?;
        Ok(u256_math::add(base_amount, sold)?)
    }
}

fn market_sell_amount(chain: &Chain, amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
    if amount_in.is_zero() {
        return Ok(U256::ZERO);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(ChainError::BadReserves.into());
    }
    Ok(chain.amm.get_amount_out(amount_in, reserve_in, reserve_out)?)
}

/// Risk parameters the vault applies to one worker.
///
/// Factor lookups fail unless the worker's pool is stable: reserves in sync
/// with balances and the pool price within `max_price_diff` of a fresh
/// oracle price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub accept_debt: bool,
    pub work_factor: u64,
    pub kill_factor: u64,
    pub max_price_diff: u64,
    pub max_price_age: u64,
}

impl From<&WorkerParams> for WorkerConfig {
    fn from(params: &WorkerParams) -> Self {
        Self {
            accept_debt: params.accept_debt,
            work_factor: params.work_factor_bps,
            kill_factor: params.kill_factor_bps,
            max_price_diff: params.max_price_diff_bps,
            max_price_age: params.max_price_age_secs,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.work_factor > self.kill_factor || self.kill_factor > MAX_BPS {
            return Err(ProtocolError::BadParam("bad work/kill factor"));
        }
        if self.max_price_diff < MAX_BPS {
            return Err(ProtocolError::BadParam("max price diff below 100%"));
        }
        Ok(())
    }

    /// Fails with the first stability check `worker`'s pool does not pass.
    pub fn ensure_stable(&self, chain: &Chain, worker: &Worker) -> Result<()> {
        let result = self.check_stable(chain, worker);
        if let Err(err) = &result {
            warn!(worker = %worker.address, error = %err, "Worker unstable");
        }
        result
    }

    pub fn is_stable(&self, chain: &Chain, worker: &Worker) -> bool {
        self.check_stable(chain, worker).is_ok()
    }

    fn check_stable(&self, chain: &Chain, worker: &Worker) -> Result<()> {
        let pair = chain.amm.pair(&worker.tokens.lp)?;
        let (r0, r1) = (pair.reserve0, pair.reserve1);

        // Balances may drift above reserves by at most 1%
        let hundred = U256::from(100u8);
        let hundred_one = U256::from(101u8);
        let balance0 = chain.balance_of(pair.token0, pair.address);
        let balance1 = chain.balance_of(pair.token1, pair.address);
        if mul(balance0, hundred)? > mul(r0, hundred_one)? {
            return Err(ProtocolError::ReserveImbalance("t0"));
        }
        if mul(balance1, hundred)? > mul(r1, hundred_one)? {
            return Err(ProtocolError::ReserveImbalance("t1"));
        }

        let (price, last_update) = chain.oracle.get_price(pair.token0, pair.token1)?;
        if last_update.saturating_add(self.max_price_age) < chain.now() {
            return Err(ProtocolError::PriceTooStale);
        }

        let lp_price = u256_math::mul_div(r1, WAD, r0)?;
        let bps = U256::from(MAX_BPS);
        let max_diff = U256::from(self.max_price_diff);
        if mul(lp_price, bps)? > mul(price, max_diff)? {
            return Err(ProtocolError::PriceTooHigh);
        }
        if mul(lp_price, max_diff)? < mul(price, bps)? {
            return Err(ProtocolError::PriceTooLow);
        }
        Ok(())
    }

    pub fn accept_debt(&self, chain: &Chain, worker: &Worker) -> Result<bool> {
        self.ensure_stable(chain, worker)?;
        Ok(self.accept_debt)
    }

    pub fn work_factor(&self, chain: &Chain, worker: &Worker) -> Result<u64> {
        self.ensure_stable(chain, worker)?;
        Ok(self.work_factor)
    }

    pub fn kill_factor(&self, chain: &Chain, worker: &Worker) -> Result<u64> {
        self.ensure_stable(chain, worker)?;
        Ok(self.kill_factor)
    }
}

/// Oracle price of `token0` in `token1` matching the pair's current ratio.
pub fn spot_price(chain: &Chain, token0: Address, token1: Address) -> Result<U256> {
    let (r0, r1) = chain.amm.get_reserves(token0, token1)?;
    Ok(u256_math::mul_div(r1, WAD, r0)?)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, open};
    use super::*;
    use farmvault_chain::u256_math::ether;

    fn post_spot(chain: &mut Chain, worker: &Worker) {
        let pair = chain.amm.pair(&worker.tokens.lp).unwrap();
        let (t0, t1) = (pair.token0, pair.token1);
        let price = spot_price(chain, t0, t1).unwrap();
        let feeder = chain.feeder();
        chain.post_prices(feeder, &[(t0, t1, price)]).unwrap();
    }

    #[test]
    fn test_health_walks_amm_formula() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));

        let lp = f.worker.share_to_balance(&f.chain, f.worker.share_of(1)).unwrap();
        let tokens = f.worker.tokens;
        let (r_base, r_farm) = f.chain.amm.get_reserves(tokens.base, tokens.farming).unwrap();
        let supply = f.chain.tokens.total_supply(tokens.lp);
        let base_amount = lp * r_base / supply;
        let farm_amount = lp * r_farm / supply;
        let expected = base_amount
            + f.chain
                .amm
                .get_amount_out(farm_amount, r_farm - farm_amount, r_base - base_amount)
                .unwrap();

        assert_eq!(f.worker.health(&f.chain, 1).unwrap(), expected);
        assert_eq!(expected, U256::from(997_672_723_405_490_085u64));
    }

    #[test]
    fn test_health_of_empty_position() {
        let f = fixture();
        assert_eq!(f.worker.health(&f.chain, 7).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_stable_with_fresh_matching_price() {
        let mut f = fixture();
        post_spot(&mut f.chain, &f.worker);
        let config = WorkerConfig::from(&WorkerParams::default());
        assert!(config.is_stable(&f.chain, &f.worker));
        assert_eq!(config.work_factor(&f.chain, &f.worker).unwrap(), 7000);
    }

    #[test]
    fn test_stale_price() {
        let mut f = fixture();
        post_spot(&mut f.chain, &f.worker);
        f.chain.advance_time(86_401);
        let config = WorkerConfig::from(&WorkerParams::default());
        assert_eq!(
            config.kill_factor(&f.chain, &f.worker).unwrap_err(),
            ProtocolError::PriceTooStale
        );
    }

    #[test]
    fn test_price_divergence() {
        let mut f = fixture();
        let pair = f.chain.amm.pair(&f.worker.tokens.lp).unwrap();
        let (t0, t1) = (pair.token0, pair.token1);
        let feeder = f.chain.feeder();
        let config = WorkerConfig::from(&WorkerParams::default());

        // Pool says 1.0; oracle at 0.5 means the pool price is too high
        f.chain.post_prices(feeder, &[(t0, t1, ether(1) / U256::from(2u8))]).unwrap();
        assert_eq!(config.ensure_stable(&f.chain, &f.worker).unwrap_err(), ProtocolError::PriceTooHigh);

        f.chain.post_prices(feeder, &[(t0, t1, ether(2))]).unwrap();
        assert_eq!(config.ensure_stable(&f.chain, &f.worker).unwrap_err(), ProtocolError::PriceTooLow);
    }

    #[test]
    fn test_reserve_imbalance() {
        let mut f = fixture();
        post_spot(&mut f.chain, &f.worker);
        let pair = f.chain.amm.pair(&f.worker.tokens.lp).unwrap();
        let (t0, lp) = (pair.token0, pair.address);
        // Donation without sync leaves balance 2% over reserve
        f.chain.mint(t0, lp, ether(1) / U256::from(5u8)).unwrap();
        let config = WorkerConfig::from(&WorkerParams::default());
        assert_eq!(
            config.accept_debt(&f.chain, &f.worker).unwrap_err(),
            ProtocolError::ReserveImbalance("t0")
        );
    }

    #[test]
    fn test_missing_price_is_unstable() {
        let f = fixture();
        let config = WorkerConfig::from(&WorkerParams::default());
        assert!(!config.is_stable(&f.chain, &f.worker));
    }
}
