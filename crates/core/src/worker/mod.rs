//! LP staking worker bound to one vault.
//!
//! The worker owns every position's LP, staked in a MasterChef-style farm,
//! and tracks each position's claim as a share of the total stake. Reinvest
//! grows the stake without minting shares, so every claim appreciates
//! together.

mod admin;
mod health;
mod reinvest;

pub use health::{spot_price, WorkerConfig};
pub use reinvest::{ReinvestConfig, SwapPath, MAX_REINVEST_BOUNTY_CEILING};

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::{self, add, sub};
use farmvault_chain::Chain;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::ReinvestParams;
use crate::error::{ProtocolError, Result};
use crate::strategy::{decode_work, Strategy, StrategyCall, WorkerTokens};

/// Strategies deployed alongside a worker, keyed by address.
pub type Strategies = HashMap<Address, Strategy>;

/// Wiring for a new worker.
#[derive(Debug, Clone)]
pub struct WorkerSetup {
    pub owner: Address,
    /// The vault allowed to call `work` and `liquidate`
    pub operator: Address,
    pub tokens: WorkerTokens,
    pub farm: Address,
    pub pid: usize,
    pub add_strategy: Address,
    pub liquidate_strategy: Address,
    /// Receives the treasury bounty on auto-reinvest
    pub treasury: Address,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub address: Address,
    pub owner: Address,
    pub operator: Address,
    pub tokens: WorkerTokens,
    pub reward_token: Address,
    pub farm: Address,
    pub pid: usize,
    pub add_strategy: Address,
    pub liquidate_strategy: Address,
    pub reinvest: ReinvestConfig,
    shares: HashMap<u64, U256>,
    total_share: U256,
    ok_strategies: HashSet<Address>,
    ok_reinvestors: HashSet<Address>,
    whitelisted_callers: HashSet<Address>,
    migrated: bool,
}

impl Worker {
    /// Bind a worker to `setup.farm`'s pool `setup.pid`, which must stake the
    /// worker's LP token.
    pub fn new(address: Address, chain: &Chain, setup: WorkerSetup, params: &ReinvestParams) -> Result<Self> {
        let farm = chain.farm(&setup.farm)?;
        if farm.pool(setup.pid)?.lp_token != setup.tokens.lp {
            return Err(ProtocolError::BadPoolId);
        }
        let reward_token = farm.reward_token;
        if reward_token == setup.tokens.base {
            return Err(ProtocolError::BadParam("reward token must differ from base token"));
        }

        let reinvest = ReinvestConfig::from_params(params, setup.treasury, reward_token, setup.tokens.base)?;
        let ok_strategies = HashSet::from([setup.add_strategy, setup.liquidate_strategy]);

        info!(
            worker = %address,
            operator = %setup.operator,
            farm = %setup.farm,
            pid = setup.pid,
            "Worker deployed"
        );

        Ok(Self {
            address,
            owner: setup.owner,
            operator: setup.operator,
            tokens: setup.tokens,
            reward_token,
            farm: setup.farm,
            pid: setup.pid,
            add_strategy: setup.add_strategy,
            liquidate_strategy: setup.liquidate_strategy,
            reinvest,
            shares: HashMap::new(),
            total_share: U256::ZERO,
            ok_strategies,
            ok_reinvestors: HashSet::new(),
            whitelisted_callers: HashSet::new(),
            migrated: false,
        })
    }

    pub fn share_of(&self, id: u64) -> U256 {
        self.shares.get(&id).copied().unwrap_or_default()
    }

    pub fn total_share(&self) -> U256 {
        self.total_share
    }

    /// Sum of every position's share, for conservation checks.
    pub fn sum_of_shares(&self) -> U256 {
        self.shares.values().fold(U256::ZERO, |acc, s| acc + *s)
    }

    pub fn is_strategy_ok(&self, strategy: &Address) -> bool {
        self.ok_strategies.contains(strategy)
    }

    pub fn is_reinvestor(&self, account: &Address) -> bool {
        self.ok_reinvestors.contains(account)
    }

    pub fn is_migrated(&self) -> bool {
        self.migrated
    }

    /// LP staked in the farm on behalf of all positions.
    pub fn total_balance(&self, chain: &Chain) -> Result<U256> {
        Ok(chain.farm_staked(self.farm, self.pid, self.address)?)
    }

    pub fn share_to_balance(&self, chain: &Chain, share: U256) -> Result<U256> {
        if self.total_share.is_zero() {
            return Ok(share);
        }
        let total_balance = self.total_balance(chain)?;
        Ok(u256_math::mul_div(share, total_balance, self.total_share)?)
    }

    pub fn balance_to_share(&self, chain: &Chain, balance: U256) -> Result<U256> {
        if self.total_share.is_zero() {
            return Ok(balance);
        }
        let total_balance = self.total_balance(chain)?;
        Ok(u256_math::mul_div(balance, self.total_share, total_balance)?)
    }

    fn only_operator(&self, caller: Address) -> Result<()> {
        if caller != self.operator && !self.whitelisted_callers.contains(&caller) {
            return Err(ProtocolError::NotOperator);
        }
        Ok(())
    }

    /// Run the strategy named in `data` for position `id`.
    ///
    /// The position's LP is unstaked and escrowed at the strategy together
    /// with every base token the worker holds. Whatever LP comes back is
    /// staked again under the position; base token goes to the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn work(
        &mut self,
        chain: &mut Chain,
        strategies: &Strategies,
        caller: Address,
        id: u64,
        user: Address,
        debt: U256,
        data: &[u8],
    ) -> Result<()> {
        self.only_operator(caller)?;

        let caller_balance = chain.balance_of(self.tokens.base, self.address);
        let threshold = self.reinvest.reinvest_threshold;
        let treasury = self.reinvest.treasury_account;
        let treasury_bps = self.reinvest.treasury_bounty_bps;
        self.reinvest_inner(chain, strategies, treasury, treasury_bps, caller_balance, threshold)?;

        self.remove_share(chain, id)?;

        let (strategy_address, payload) = decode_work(data)?;
        if !self.is_strategy_ok(&strategy_address) {
            return Err(ProtocolError::UnapprovedWorkStrategy);
        }
        let strategy = strategies
            .get(&strategy_address)
            .ok_or(ProtocolError::UnknownStrategy(strategy_address))?;

        self.escrow(chain, strategy_address)?;
        strategy.execute(chain, self.address, self.tokens, user, debt, &payload)?;
        self.ensure_no_residual(chain, strategy_address)?;

        self.add_share(chain, id)?;
        let returned = chain.tokens.transfer_all(self.tokens.base, self.address, caller)?;

        info!(
            worker = %self.address,
            id,
            strategy = %strategy_address,
            kind = strategy.kind.name(),
            debt = %debt,
            returned = %returned,
            share = %self.share_of(id),
            "Worker work"
        );
        Ok(())
    }

    /// Unwind position `id` through the liquidate strategy and send every
    /// base token to the caller.
    pub fn liquidate(&mut self, chain: &mut Chain, strategies: &Strategies, caller: Address, id: u64) -> Result<U256> {
        self.only_operator(caller)?;
        self.remove_share(chain, id)?;

        let strategy_address = self.liquidate_strategy;
        let strategy = strategies
            .get(&strategy_address)
            .ok_or(ProtocolError::UnknownStrategy(strategy_address))?;
        let call = StrategyCall::Liquidate { min_base: U256::ZERO };

        self.escrow(chain, strategy_address)?;
        strategy.execute(chain, self.address, self.tokens, Address::ZERO, U256::ZERO, &call.encode())?;
        self.ensure_no_residual(chain, strategy_address)?;

        let proceeds = chain.tokens.transfer_all(self.tokens.base, self.address, caller)?;
        info!(worker = %self.address, id, proceeds = %proceeds, "Worker liquidate");
        Ok(proceeds)
    }

    /// Every LP and base token the worker holds, to `strategy`.
    fn escrow(&self, chain: &mut Chain, strategy: Address) -> Result<()> {
        chain.tokens.transfer_all(self.tokens.lp, self.address, strategy)?;
        chain.tokens.transfer_all(self.tokens.base, self.address, strategy)?;
        Ok(())
    }

    fn ensure_no_residual(&self, chain: &Chain, strategy: Address) -> Result<()> {
        for token in [self.tokens.base, self.tokens.farming, self.tokens.lp] {
            if !chain.balance_of(token, strategy).is_zero() {
                return Err(ProtocolError::StrategyResidual);
            }
        }
        Ok(())
    }

    /// Stake all held LP and credit the resulting share to `id`.
    fn add_share(&mut self, chain: &mut Chain, id: u64) -> Result<()> {
        let balance = chain.balance_of(self.tokens.lp, self.address);
        if balance.is_zero() {
            return Ok(());
        }
        // Priced before the deposit moves total balance
        let share = self.balance_to_share(chain, balance)?;
        chain.farm_deposit(self.farm, self.pid, self.address, balance)?;
        let current = self.share_of(id);
        self.shares.insert(id, add(current, share)?);
        self.total_share = add(self.total_share, share)?;
        debug!(id, share = %share, balance = %balance, "Share added");
        Ok(())
    }

    /// Unstake the LP behind `id`'s share and burn the share.
    fn remove_share(&mut self, chain: &mut Chain, id: u64) -> Result<()> {
        let share = self.share_of(id);
        if share.is_zero() {
            return Ok(());
        }
        let balance = self.share_to_balance(chain, share)?;
        chain.farm_withdraw(self.farm, self.pid, self.address, balance)?;
        self.total_share = sub(self.total_share, share)?;
        self.shares.insert(id, U256::ZERO);
        debug!(id, share = %share, balance = %balance, "Share removed");
        Ok(())
    }
}
