//! Farm reward compounding.

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::{self, MAX_BPS};
use farmvault_chain::Chain;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, info};

use super::{Strategies, Worker};
use crate::config::ReinvestParams;
use crate::error::{ProtocolError, Result};
use crate::strategy::{StrategyCall, StrategyKind};

/// Hard ceiling for any reinvest bounty setting.
pub const MAX_REINVEST_BOUNTY_CEILING: u64 = 3000;

pub type SwapPath = SmallVec<[Address; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinvestConfig {
    /// Cut of the harvest paid to whoever calls `reinvest`
    pub reinvest_bounty_bps: u64,
    pub max_reinvest_bounty_bps: u64,
    /// Receives the bounty when `work` compounds on its own
    pub treasury_account: Address,
    pub treasury_bounty_bps: u64,
    /// Held reward above which `work` compounds first
    pub reinvest_threshold: U256,
    /// Reward token to base token
    pub reinvest_path: SwapPath,
    /// Receives part of every bounty, zero when unset
    pub beneficial_vault: Address,
    pub beneficial_vault_bounty_bps: u64,
    /// Reward token to the beneficial vault's token
    pub reward_path: SwapPath,
}

impl ReinvestConfig {
    pub fn from_params(params: &ReinvestParams, treasury: Address, reward: Address, base: Address) -> Result<Self> {
        let config = Self {
            reinvest_bounty_bps: params.reinvest_bounty_bps,
            max_reinvest_bounty_bps: params.max_reinvest_bounty_bps,
            treasury_account: treasury,
            treasury_bounty_bps: params.treasury_bounty_bps,
            reinvest_threshold: params.reinvest_threshold_wad(),
            reinvest_path: smallvec![reward, base],
            beneficial_vault: Address::ZERO,
            beneficial_vault_bounty_bps: params.beneficial_vault_bounty_bps,
            reward_path: smallvec![reward],
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let max = self.max_reinvest_bounty_bps;
        if max > MAX_REINVEST_BOUNTY_CEILING {
            return Err(ProtocolError::BadMaxBounty(max));
        }
        if self.reinvest_bounty_bps > max || self.treasury_bounty_bps > max {
            return Err(ProtocolError::BountyTooHigh);
        }
        if self.beneficial_vault_bounty_bps > MAX_BPS {
            return Err(ProtocolError::BadParam("beneficial vault bounty above 100%"));
        }
        Ok(())
    }
}

impl Worker {
    /// Harvest, pay the caller's bounty and compound the rest into staked LP.
    ///
    /// Returns the bounty. A harvest of zero is a no-op.
    pub fn reinvest(&mut self, chain: &mut Chain, strategies: &Strategies, caller: Address) -> Result<U256> {
        if !self.is_reinvestor(&caller) {
            return Err(ProtocolError::NotReinvestor);
        }
        let bounty_bps = self.reinvest.reinvest_bounty_bps;
        self.reinvest_inner(chain, strategies, caller, bounty_bps, U256::ZERO, U256::ZERO)
    }

    /// Reward waiting to be compounded: pending in the farm plus held.
    pub fn pending_reward(&self, chain: &Chain) -> Result<U256> {
        let pending = chain.farm_pending(self.farm, self.pid, self.address)?;
        let held = chain.balance_of(self.reward_token, self.address);
        Ok(u256_math::add(pending, held)?)
    }

    /// `caller_balance` is base token already at the worker that belongs to
    /// an in-flight `work` call and must not be compounded.
    pub(super) fn reinvest_inner(
        &mut self,
        chain: &mut Chain,
        strategies: &Strategies,
        bounty_to: Address,
        bounty_bps: u64,
        caller_balance: U256,
        threshold: U256,
    ) -> Result<U256> {
        chain.farm_harvest(self.farm, self.pid, self.address)?;
        let reward = chain.balance_of(self.reward_token, self.address);
        if reward.is_zero() || reward <= threshold {
            return Ok(U256::ZERO);
        }

        let bounty = u256_math::bps(reward, bounty_bps)?;
        if !bounty.is_zero() {
            let beneficial = u256_math::bps(bounty, self.reinvest.beneficial_vault_bounty_bps)?;
            if !beneficial.is_zero() {
                self.reward_to_beneficial_vault(chain, beneficial)?;
            }
            chain.transfer(self.reward_token, self.address, bounty_to, u256_math::sub(bounty, beneficial)?)?;
        }

        let to_swap = u256_math::sub(reward, bounty)?;
        if self.reinvest.reinvest_path.len() >= 2 && !to_swap.is_zero() {
            chain.swap_exact_in(self.address, to_swap, U256::ZERO, &self.reinvest.reinvest_path, self.address)?;
        }

        self.sell_farming_dust(chain)?;

        let base = chain.balance_of(self.tokens.base, self.address);
        let to_add = u256_math::sub(base, caller_balance)?;
        if !to_add.is_zero() {
            self.compound(chain, strategies, to_add)?;
        }

        let lp = chain.balance_of(self.tokens.lp, self.address);
        if !lp.is_zero() {
            chain.farm_deposit(self.farm, self.pid, self.address, lp)?;
        }

        info!(
            worker = %self.address,
            reward = %reward,
            bounty = %bounty,
            bounty_to = %bounty_to,
            compounded = %to_add,
            "Reinvest"
        );
        Ok(bounty)
    }

    /// Zap `amount` base token into LP through the add strategy.
    fn compound(&mut self, chain: &mut Chain, strategies: &Strategies, amount: U256) -> Result<()> {
        let strategy_address = self.add_strategy;
        let strategy = strategies
            .get(&strategy_address)
            .ok_or(ProtocolError::UnknownStrategy(strategy_address))?;
        let call = match strategy.kind {
            StrategyKind::AddBaseTokenOnly => StrategyCall::AddBaseTokenOnly { min_lp: U256::ZERO },
            StrategyKind::AddTwoSidesOptimal => StrategyCall::AddTwoSidesOptimal {
                farming_amount: U256::ZERO,
                min_lp: U256::ZERO,
            },
            StrategyKind::AddBaseWithFarm => StrategyCall::AddBaseWithFarm {
                farming_amount: U256::ZERO,
                min_lp: U256::ZERO,
            },
            _ => return Err(ProtocolError::UnapprovedAddStrategy),
        };

        chain.transfer(self.tokens.base, self.address, strategy_address, amount)?;
        strategy.execute(chain, self.address, self.tokens, Address::ZERO, U256::ZERO, &call.encode())?;
        self.ensure_no_residual(chain, strategy_address)?;
        debug!(amount = %amount, "Reward compounded");
        Ok(())
    }

    /// Farming token a previous zap handed back to the worker goes into the
    /// next compound. Amounts too small to quote any base stay behind.
    fn sell_farming_dust(&self, chain: &mut Chain) -> Result<()> {
        let dust = chain.balance_of(self.tokens.farming, self.address);
        if dust.is_zero() {
            return Ok(());
        }
        let path = [self.tokens.farming, self.tokens.base];
        let amounts = chain.amm.get_amounts_out(dust, &path)?;
        if amounts[amounts.len() - 1].is_zero() {
            return Ok(());
        }
        chain.swap_exact_in(self.address, dust, U256::ZERO, &path, self.address)?;
        debug!(dust = %dust, "Farming dust sold");
        Ok(())
    }

    fn reward_to_beneficial_vault(&self, chain: &mut Chain, amount: U256) -> Result<()> {
        let to = self.reinvest.beneficial_vault;
        if to.is_zero() {
            return Err(ProtocolError::BadParam("beneficial vault not set"));
        }
        if self.reinvest.reward_path.len() < 2 {
            chain.transfer(self.reward_token, self.address, to, amount)?;
        } else {
            chain.swap_exact_in(self.address, amount, U256::ZERO, &self.reinvest.reward_path, to)?;
        }
        debug!(beneficial_vault = %to, amount = %amount, "Bounty shared with beneficial vault");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, open};
    use super::*;
    use farmvault_chain::u256_math::ether;

    #[test]
    fn test_not_reinvestor() {
        let mut f = fixture();
        let user = f.user;
        let err = f.worker.reinvest(&mut f.chain, &f.strategies, user).unwrap_err();
        assert_eq!(err, ProtocolError::NotReinvestor);
    }

    #[test]
    fn test_zero_harvest_is_noop() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));
        let (owner, bot) = (f.worker.owner, f.user);
        f.worker.set_reinvestor_ok(owner, &[bot], true).unwrap();

        let before = f.worker.total_balance(&f.chain).unwrap();
        let bounty = f.worker.reinvest(&mut f.chain, &f.strategies, bot).unwrap();
        assert_eq!(bounty, U256::ZERO);
        assert_eq!(f.worker.total_balance(&f.chain).unwrap(), before);
    }

    #[test]
    fn test_reinvest_pays_bounty_and_grows_stake() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));
        open(&mut f, 2, ether(3));
        let (owner, bot) = (f.worker.owner, f.user);
        f.worker.set_reinvestor_ok(owner, &[bot], true).unwrap();
        let shares = (f.worker.share_of(1), f.worker.share_of(2));
        let lp_before = f.worker.share_to_balance(&f.chain, shares.0).unwrap();

        f.chain.advance_time(100);
        let pending = f.worker.pending_reward(&f.chain).unwrap();
        let bounty = f.worker.reinvest(&mut f.chain, &f.strategies, bot).unwrap();

        assert_eq!(bounty, u256_math::bps(pending, 100).unwrap());
        assert_eq!(f.chain.balance_of(f.worker.reward_token, bot), bounty);
        // Shares untouched, each worth more LP
        assert_eq!((f.worker.share_of(1), f.worker.share_of(2)), shares);
        assert!(f.worker.share_to_balance(&f.chain, shares.0).unwrap() > lp_before);
        assert_eq!(f.worker.sum_of_shares(), f.worker.total_share());
        assert_eq!(f.chain.balance_of(f.worker.reward_token, f.worker.address), U256::ZERO);
    }

    #[test]
    fn test_beneficial_vault_takes_part_of_bounty() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));
        let (owner, bot) = (f.worker.owner, f.user);
        let beneficial = f.chain.deploy_contract();
        let path: SwapPath = smallvec![f.worker.reward_token, f.worker.tokens.base];
        f.worker.set_reinvestor_ok(owner, &[bot], true).unwrap();
        f.worker
            .set_beneficial_vault_config(owner, 5000, beneficial, path)
            .unwrap();

        f.chain.advance_time(100);
        let bounty = f.worker.reinvest(&mut f.chain, &f.strategies, bot).unwrap();
        let half = u256_math::bps(bounty, 5000).unwrap();

        assert_eq!(f.chain.balance_of(f.worker.reward_token, bot), bounty - half);
        assert!(f.chain.balance_of(f.worker.tokens.base, beneficial) > U256::ZERO);
    }

    #[test]
    fn test_work_compounds_above_threshold() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));
        let owner = f.worker.owner;
        let path = f.worker.reinvest.reinvest_path.clone();
        f.worker
            .set_reinvest_config(owner, 100, ether(1), path)
            .unwrap();
        let treasury = f.worker.reinvest.treasury_account;

        f.chain.advance_time(10);
        let before = f.worker.total_balance(&f.chain).unwrap();
        open(&mut f, 2, ether(1));

        // Treasury bounty on the 10 CAKE harvested before position 2 was added
        assert!(f.chain.balance_of(f.worker.reward_token, treasury) > U256::ZERO);
        let share_one = f.worker.share_to_balance(&f.chain, f.worker.share_of(1)).unwrap();
        assert!(share_one > before);
    }

    #[test]
    fn test_farming_dust_is_compounded() {
        let mut f = fixture();
        open(&mut f, 1, ether(1));
        let (owner, bot) = (f.worker.owner, f.user);
        f.worker.set_reinvestor_ok(owner, &[bot], true).unwrap();
        let (farming, worker) = (f.worker.tokens.farming, f.worker.address);
        let dust = ether(1) / U256::from(100u8);
        f.chain.mint(farming, worker, dust).unwrap();

        f.chain.advance_time(100);
        f.worker.reinvest(&mut f.chain, &f.strategies, bot).unwrap();
        // Only this zap's own rounding is left
        assert!(f.chain.balance_of(farming, worker) < U256::from(1_000_000_000u64));
        assert_eq!(f.worker.sum_of_shares(), f.worker.total_share());
    }
}
