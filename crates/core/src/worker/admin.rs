//! Owner-only worker settings.
//!
//! Every setter checks its value against the current ceilings, so lowering
//! `max_reinvest_bounty_bps` below a live bounty fails instead of leaving
//! the two out of order.

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::MAX_BPS;
use farmvault_chain::Chain;
use std::collections::HashSet;
use tracing::info;

use super::reinvest::{SwapPath, MAX_REINVEST_BOUNTY_CEILING};
use super::{Strategies, Worker};
use crate::error::{ProtocolError, Result};
use crate::strategy::StrategyKind;

fn set_flags(set: &mut HashSet<Address>, accounts: &[Address], ok: bool) {
    for account in accounts {
        if ok {
            set.insert(*account);
        } else {
            set.remove(account);
        }
    }
}

impl Worker {
    fn only_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(ProtocolError::NotOwner("worker"));
        }
        Ok(())
    }

    pub fn set_strategy_ok(&mut self, caller: Address, strategies: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.ok_strategies, strategies, ok);
        info!(worker = %self.address, count = strategies.len(), ok, "Set strategy ok");
        Ok(())
    }

    pub fn set_reinvestor_ok(&mut self, caller: Address, reinvestors: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.ok_reinvestors, reinvestors, ok);
        info!(worker = %self.address, count = reinvestors.len(), ok, "Set reinvestor ok");
        Ok(())
    }

    pub fn set_whitelisted_callers(&mut self, caller: Address, callers: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.whitelisted_callers, callers, ok);
        info!(worker = %self.address, count = callers.len(), ok, "Set whitelisted callers");
        Ok(())
    }

    pub fn set_reinvest_bounty_bps(&mut self, caller: Address, bps: u64) -> Result<()> {
        self.only_owner(caller)?;
        if bps > self.reinvest.max_reinvest_bounty_bps {
            return Err(ProtocolError::BountyTooHigh);
        }
        self.reinvest.reinvest_bounty_bps = bps;
        info!(worker = %self.address, bps, "Set reinvest bounty");
        Ok(())
    }

    /// Bounty, auto-compound threshold and reward-to-base path at once.
    pub fn set_reinvest_config(&mut self, caller: Address, bounty_bps: u64, threshold: U256, path: SwapPath) -> Result<()> {
        self.only_owner(caller)?;
        if bounty_bps > self.reinvest.max_reinvest_bounty_bps {
            return Err(ProtocolError::BountyTooHigh);
        }
        if path.len() < 2 || path[0] != self.reward_token || path[path.len() - 1] != self.tokens.base {
            return Err(ProtocolError::BadParam("reinvest path must go reward token to base token"));
        }
        self.reinvest.reinvest_bounty_bps = bounty_bps;
        self.reinvest.reinvest_threshold = threshold;
        self.reinvest.reinvest_path = path;
        info!(worker = %self.address, bounty_bps, threshold = %threshold, "Set reinvest config");
        Ok(())
    }

    pub fn set_treasury_config(&mut self, caller: Address, account: Address, bps: u64) -> Result<()> {
        self.only_owner(caller)?;
        if bps > self.reinvest.max_reinvest_bounty_bps {
            return Err(ProtocolError::BountyTooHigh);
        }
        self.reinvest.treasury_account = account;
        self.reinvest.treasury_bounty_bps = bps;
        info!(worker = %self.address, account = %account, bps, "Set treasury config");
        Ok(())
    }

    /// New ceiling must cover every live bounty and stay within 30%.
    pub fn set_max_reinvest_bounty_bps(&mut self, caller: Address, max: u64) -> Result<()> {
        self.only_owner(caller)?;
        if max < self.reinvest.reinvest_bounty_bps
            || max < self.reinvest.treasury_bounty_bps
            || max > MAX_REINVEST_BOUNTY_CEILING
        {
            return Err(ProtocolError::BadMaxBounty(max));
        }
        self.reinvest.max_reinvest_bounty_bps = max;
        info!(worker = %self.address, max, "Set max reinvest bounty");
        Ok(())
    }

    pub fn set_beneficial_vault_config(
        &mut self,
        caller: Address,
        bps: u64,
        vault: Address,
        reward_path: SwapPath,
    ) -> Result<()> {
        self.only_owner(caller)?;
        if bps > MAX_BPS {
            return Err(ProtocolError::BadParam("beneficial vault bounty above 100%"));
        }
        if reward_path.first() != Some(&self.reward_token) {
            return Err(ProtocolError::BadParam("reward path must start at the reward token"));
        }
        self.reinvest.beneficial_vault_bounty_bps = bps;
        self.reinvest.beneficial_vault = vault;
        self.reinvest.reward_path = reward_path;
        info!(worker = %self.address, vault = %vault, bps, "Set beneficial vault config");
        Ok(())
    }

    /// Strategies the worker itself uses for compounding and `liquidate`.
    pub fn set_critical_strategies(
        &mut self,
        caller: Address,
        strategies: &Strategies,
        add: Address,
        liquidate: Address,
    ) -> Result<()> {
        self.only_owner(caller)?;
        let add_kind = strategies.get(&add).ok_or(ProtocolError::UnknownStrategy(add))?.kind;
        let liquidate_kind = strategies
            .get(&liquidate)
            .ok_or(ProtocolError::UnknownStrategy(liquidate))?
            .kind;
        if !add_kind.is_add() {
            return Err(ProtocolError::BadParam("critical add strategy must add liquidity"));
        }
        if liquidate_kind != StrategyKind::Liquidate {
            return Err(ProtocolError::BadParam("critical liquidate strategy must liquidate"));
        }
        self.add_strategy = add;
        self.liquidate_strategy = liquidate;
        info!(worker = %self.address, add = %add, liquidate = %liquidate, "Set critical strategies");
        Ok(())
    }

    /// Move the whole stake to pool `pid` of `new_farm`. One shot.
    ///
    /// The new pool must stake the worker's LP and pay the same reward
    /// token. Rewards pending at the old farm are harvested into the worker
    /// and compounded by the next reinvest.
    pub fn migrate_farm(&mut self, chain: &mut Chain, caller: Address, new_farm: Address, pid: usize) -> Result<()> {
        self.only_owner(caller)?;
        if self.migrated {
            return Err(ProtocolError::AlreadyMigrated);
        }
        let farm = chain.farm(&new_farm)?;
        if farm.pool(pid)?.lp_token != self.tokens.lp {
            return Err(ProtocolError::BadPoolId);
        }
        if farm.reward_token != self.reward_token {
            return Err(ProtocolError::BadParam("new farm pays a different reward token"));
        }

        let staked = self.total_balance(chain)?;
        chain.farm_withdraw(self.farm, self.pid, self.address, staked)?;
        let old = (self.farm, self.pid);
        self.farm = new_farm;
        self.pid = pid;
        if !staked.is_zero() {
            chain.farm_deposit(self.farm, self.pid, self.address, staked)?;
        }
        self.migrated = true;

        info!(
            worker = %self.address,
            old_farm = %old.0,
            old_pid = old.1,
            new_farm = %new_farm,
            new_pid = pid,
            staked = %staked,
            "Farm migrated"
        );
        Ok(())
    }
}
