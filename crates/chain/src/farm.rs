//! MasterChef-style staking farm.
//!
//! Rewards accrue per pool proportional to `alloc_point`, either per second or
//! per block, and are minted to the staker on every deposit or withdraw.
//! A withdraw of zero is a plain harvest.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::clock::Clock;
use crate::error::{ChainError, Result};
use crate::token::TokenLedger;
use crate::u256_math::{self, add, mul_div, sub};

/// Precision of `acc_reward_per_share`.
pub const ACC_PRECISION: U256 = U256::from_limbs([1_000_000_000_000u64, 0, 0, 0]);

/// How reward emission is metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emission {
    #[default]
    PerSecond,
    PerBlock,
}

impl Emission {
    fn now(&self, clock: &Clock) -> u64 {
        match self {
            Self::PerSecond => clock.timestamp,
            Self::PerBlock => clock.block_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub lp_token: Address,
    pub alloc_point: u64,
    /// Last second or block rewards were accounted for
    pub last_reward: u64,
    pub acc_reward_per_share: U256,
    pub total_staked: U256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub amount: U256,
    pub reward_debt: U256,
}

#[derive(Debug, Clone)]
pub struct Farm {
    pub address: Address,
    pub reward_token: Address,
    /// Reward emitted per second or per block across all pools
    pub reward_per_unit: U256,
    pub emission: Emission,
    pub total_alloc_point: u64,
    pools: Vec<PoolInfo>,
    users: HashMap<(usize, Address), UserInfo>,
}

impl Farm {
    pub fn new(address: Address, reward_token: Address, reward_per_unit: U256, emission: Emission) -> Self {
        Self {
            address,
            reward_token,
            reward_per_unit,
            emission,
            total_alloc_point: 0,
            pools: Vec::new(),
            users: HashMap::new(),
        }
    }

    /// Add a pool and return its id.
    pub fn add_pool(&mut self, clock: &Clock, lp_token: Address, alloc_point: u64) -> Result<usize> {
        self.mass_update(clock)?;
        self.total_alloc_point += alloc_point;
        self.pools.push(PoolInfo {
            lp_token,
            alloc_point,
            last_reward: self.emission.now(clock),
            acc_reward_per_share: U256::ZERO,
            total_staked: U256::ZERO,
        });
        Ok(self.pools.len() - 1)
    }

    pub fn pool_length(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, pid: usize) -> Result<&PoolInfo> {
        self.pools.get(pid).ok_or(ChainError::UnknownFarmPool(pid))
    }

    pub fn user_info(&self, pid: usize, user: Address) -> UserInfo {
        self.users.get(&(pid, user)).copied().unwrap_or_default()
    }

    /// Accumulator value as of `clock`, without mutating the pool.
    fn projected_acc(&self, pool: &PoolInfo, clock: &Clock) -> Result<U256> {
        let now = self.emission.now(clock);
        if now <= pool.last_reward || pool.total_staked.is_zero() || self.total_alloc_point == 0 {
            return Ok(pool.acc_reward_per_share);
        }
        let elapsed = U256::from(now - pool.last_reward);
        let reward = mul_div(
            u256_math::mul(elapsed, self.reward_per_unit)?,
            U256::from(pool.alloc_point),
            U256::from(self.total_alloc_point),
        )?;
        add(
            pool.acc_reward_per_share,
            mul_div(reward, ACC_PRECISION, pool.total_staked)?,
        )
    }

    pub fn pending_reward(&self, pid: usize, user: Address, clock: &Clock) -> Result<U256> {
        let pool = self.pool(pid)?;
        let acc = self.projected_acc(pool, clock)?;
        let info = self.user_info(pid, user);
        Ok(mul_div(info.amount, acc, ACC_PRECISION)?.saturating_sub(info.reward_debt))
    }

    pub fn update_pool(&mut self, pid: usize, clock: &Clock) -> Result<()> {
        let acc = self.projected_acc(self.pool(pid)?, clock)?;
        let now = self.emission.now(clock);
        let pool = &mut self.pools[pid];
        pool.acc_reward_per_share = acc;
        pool.last_reward = pool.last_reward.max(now);
        Ok(())
    }

    fn mass_update(&mut self, clock: &Clock) -> Result<()> {
        for pid in 0..self.pools.len() {
            self.update_pool(pid, clock)?;
        }
        Ok(())
    }

    fn settle(&mut self, tokens: &mut TokenLedger, pid: usize, user: Address) -> Result<U256> {
        let acc = self.pools[pid].acc_reward_per_share;
        let info = self.user_info(pid, user);
        let pending = sub(mul_div(info.amount, acc, ACC_PRECISION)?, info.reward_debt)?;
        if !pending.is_zero() {
            tokens.mint(self.reward_token, user, pending)?;
        }
        Ok(pending)
    }

    /// Stake `amount` LP from `user`, paying out pending rewards first.
    pub fn deposit(
        &mut self,
        tokens: &mut TokenLedger,
        clock: &Clock,
        pid: usize,
        user: Address,
        amount: U256,
    ) -> Result<U256> {
        self.update_pool(pid, clock)?;
        let harvested = self.settle(tokens, pid, user)?;
        let lp_token = self.pools[pid].lp_token;
        tokens.transfer(lp_token, user, self.address, amount)?;

        let acc = self.pools[pid].acc_reward_per_share;
        self.pools[pid].total_staked = add(self.pools[pid].total_staked, amount)?;
        let info = self.users.entry((pid, user)).or_default();
        info.amount = add(info.amount, amount)?;
        info.reward_debt = mul_div(info.amount, acc, ACC_PRECISION)?;
        trace!(farm = %self.address, pid, user = %user, amount = %amount, "farm deposit");
        Ok(harvested)
    }

    /// Unstake `amount` LP to `user`, paying out pending rewards first.
    pub fn withdraw(
        &mut self,
        tokens: &mut TokenLedger,
        clock: &Clock,
        pid: usize,
        user: Address,
        amount: U256,
    ) -> Result<U256> {
        if self.user_info(pid, user).amount < amount {
            return Err(ChainError::WithdrawExceedsStake);
        }
        self.update_pool(pid, clock)?;
        let harvested = self.settle(tokens, pid, user)?;
        let lp_token = self.pools[pid].lp_token;
        tokens.transfer(lp_token, self.address, user, amount)?;

        let acc = self.pools[pid].acc_reward_per_share;
        self.pools[pid].total_staked = sub(self.pools[pid].total_staked, amount)?;
        let info = self.users.entry((pid, user)).or_default();
        info.amount = sub(info.amount, amount)?;
        info.reward_debt = mul_div(info.amount, acc, ACC_PRECISION)?;
        trace!(farm = %self.address, pid, user = %user, amount = %amount, "farm withdraw");
        Ok(harvested)
    }

    /// Pay out pending rewards without moving stake.
    pub fn harvest(&mut self, tokens: &mut TokenLedger, clock: &Clock, pid: usize, user: Address) -> Result<U256> {
        self.withdraw(tokens, clock, pid, user, U256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::{ether, WAD};

    const FARM: Address = Address::repeat_byte(0xF0);
    const REWARD: Address = Address::repeat_byte(0xCA);
    const LP: Address = Address::repeat_byte(0x30);
    const ALICE: Address = Address::repeat_byte(1);
    const BOB: Address = Address::repeat_byte(2);

    fn setup(emission: Emission) -> (Farm, TokenLedger, Clock) {
        let mut tokens = TokenLedger::new();
        tokens.register(REWARD, "CAKE", 18).unwrap();
        tokens.register(LP, "LP", 18).unwrap();
        tokens.mint(LP, ALICE, ether(10)).unwrap();
        tokens.mint(LP, BOB, ether(10)).unwrap();
        let clock = Clock::default();
        let mut farm = Farm::new(FARM, REWARD, WAD, emission);
        farm.add_pool(&clock, LP, 100).unwrap();
        (farm, tokens, clock)
    }

    #[test]
    fn test_rewards_split_by_stake() {
        let (mut farm, mut tokens, mut clock) = setup(Emission::PerSecond);
        farm.deposit(&mut tokens, &clock, 0, ALICE, ether(1)).unwrap();
        farm.deposit(&mut tokens, &clock, 0, BOB, ether(3)).unwrap();

        clock.advance_secs(100);
        assert_eq!(farm.pending_reward(0, ALICE, &clock).unwrap(), ether(25));
        assert_eq!(farm.pending_reward(0, BOB, &clock).unwrap(), ether(75));

        let got = farm.harvest(&mut tokens, &clock, 0, ALICE).unwrap();
        assert_eq!(got, ether(25));
        assert_eq!(tokens.balance_of(REWARD, ALICE), ether(25));
        assert_eq!(farm.pending_reward(0, ALICE, &clock).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_per_block_emission() {
        let (mut farm, mut tokens, mut clock) = setup(Emission::PerBlock);
        farm.deposit(&mut tokens, &clock, 0, ALICE, ether(1)).unwrap();
        clock.advance_blocks(5);
        assert_eq!(farm.pending_reward(0, ALICE, &clock).unwrap(), ether(5));
    }

    #[test]
    fn test_withdraw_more_than_staked() {
        let (mut farm, mut tokens, clock) = setup(Emission::PerSecond);
        farm.deposit(&mut tokens, &clock, 0, ALICE, ether(1)).unwrap();
        let err = farm
            .withdraw(&mut tokens, &clock, 0, ALICE, ether(2))
            .unwrap_err();
        assert_eq!(err, ChainError::WithdrawExceedsStake);

        farm.withdraw(&mut tokens, &clock, 0, ALICE, ether(1)).unwrap();
        assert_eq!(tokens.balance_of(LP, ALICE), ether(10));
        assert_eq!(farm.user_info(0, ALICE).amount, U256::ZERO);
    }

    #[test]
    fn test_unknown_pool() {
        let (farm, _, clock) = setup(Emission::PerSecond);
        assert_eq!(
            farm.pending_reward(3, ALICE, &clock),
            Err(ChainError::UnknownFarmPool(3))
        );
    }
}
