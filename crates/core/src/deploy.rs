//! Bootstrap a complete market from a [`DeploymentConfig`].
//!
//! Creates the tokens, the base/farming pair, a reward/base pair for
//! reinvest swaps, the farm, one vault, one worker and every strategy, then
//! wires the whitelists and posts an oracle price matching the pool.

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::f64_to_wad;
use farmvault_chain::Chain;
use tracing::info;

use crate::config::DeploymentConfig;
use crate::error::Result;
use crate::ledger::{Ledger, State};
use crate::strategy::{Strategy, StrategyKind, WorkerTokens};
use crate::vault::Vault;
use crate::worker::{spot_price, Worker, WorkerConfig, WorkerSetup};

/// Addresses of every deployed strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyAddresses {
    pub add_base_token_only: Address,
    pub add_two_sides_optimal: Address,
    pub add_base_with_farm: Address,
    pub liquidate: Address,
    pub withdraw_minimize_trading: Address,
    pub partial_close_liquidate: Address,
    pub partial_close_minimize_trading: Address,
}

impl StrategyAddresses {
    pub fn of(&self, kind: StrategyKind) -> Address {
        match kind {
            StrategyKind::AddBaseTokenOnly => self.add_base_token_only,
            StrategyKind::AddTwoSidesOptimal => self.add_two_sides_optimal,
            StrategyKind::AddBaseWithFarm => self.add_base_with_farm,
            StrategyKind::Liquidate => self.liquidate,
            StrategyKind::WithdrawMinimizeTrading => self.withdraw_minimize_trading,
            StrategyKind::PartialCloseLiquidate => self.partial_close_liquidate,
            StrategyKind::PartialCloseMinimizeTrading => self.partial_close_minimize_trading,
        }
    }

    pub fn all(&self) -> [Address; 7] {
        StrategyKind::ALL.map(|kind| self.of(kind))
    }

    pub fn adds(&self) -> [Address; 3] {
        [
            self.add_base_token_only,
            self.add_two_sides_optimal,
            self.add_base_with_farm,
        ]
    }
}

/// Addresses of a bootstrapped market.
#[derive(Debug, Clone, Copy)]
pub struct Deployment {
    pub base: Address,
    pub farming: Address,
    pub reward: Address,
    pub lp: Address,
    pub reward_lp: Address,
    pub farm: Address,
    pub pid: usize,
    pub vault: Address,
    pub share_token: Address,
    pub worker: Address,
    pub strategies: StrategyAddresses,
    /// Owns the vault and the worker
    pub owner: Address,
    pub treasury: Address,
    /// Whitelisted liquidator and reinvestor
    pub keeper: Address,
    pub lp_provider: Address,
}

impl Deployment {
    pub fn bootstrap(config: &DeploymentConfig) -> Result<(Ledger, Self)> {
        let market = &config.market;
        let protocol = &config.protocol;
        protocol.validate()?;

        let mut chain = Chain::new(market.swap_fee);
        let base = chain.create_token(&market.base_symbol, 18)?;
        let farming = chain.create_token(&market.farming_symbol, 18)?;
        let reward = chain.create_token(&market.reward_symbol, 18)?;
        let share_token = chain.create_token(&format!("ib{}", market.base_symbol), 18)?;

        let lp = chain.create_pair(base, farming)?;
        let reward_lp = chain.create_pair(reward, base)?;
        let lp_provider = chain.new_account();
        chain.seed_liquidity(
            lp_provider,
            base,
            farming,
            f64_to_wad(market.base_liquidity),
            f64_to_wad(market.farming_liquidity),
        )?;
        chain.seed_liquidity(
            lp_provider,
            reward,
            base,
            f64_to_wad(market.reward_liquidity),
            f64_to_wad(market.reward_base_liquidity),
        )?;

        let farm = chain.create_farm(reward, f64_to_wad(market.reward_per_unit), market.emission)?;
        let pid = chain.add_farm_pool(farm, lp, market.alloc_point)?;

        let owner = chain.new_account();
        let treasury = chain.new_account();
        let keeper = chain.new_account();
        let vault_address = chain.deploy_contract();
        let worker_address = chain.deploy_contract();

        let mut state = State::new(chain);
        let deploy_strategy = |state: &mut State, kind: StrategyKind| {
            let mut strategy = Strategy::new(state.chain.deploy_contract(), kind);
            strategy.set_workers_ok(&[worker_address], true);
            let address = strategy.address;
            state.strategies.insert(address, strategy);
            address
        };
        let strategies = StrategyAddresses {
            add_base_token_only: deploy_strategy(&mut state, StrategyKind::AddBaseTokenOnly),
            add_two_sides_optimal: deploy_strategy(&mut state, StrategyKind::AddTwoSidesOptimal),
            add_base_with_farm: deploy_strategy(&mut state, StrategyKind::AddBaseWithFarm),
            liquidate: deploy_strategy(&mut state, StrategyKind::Liquidate),
            withdraw_minimize_trading: deploy_strategy(&mut state, StrategyKind::WithdrawMinimizeTrading),
            partial_close_liquidate: deploy_strategy(&mut state, StrategyKind::PartialCloseLiquidate),
            partial_close_minimize_trading: deploy_strategy(&mut state, StrategyKind::PartialCloseMinimizeTrading),
        };

        let setup = WorkerSetup {
            owner,
            operator: vault_address,
            tokens: WorkerTokens { base, farming, lp },
            farm,
            pid,
            add_strategy: strategies.add_base_token_only,
            liquidate_strategy: strategies.liquidate,
            treasury,
        };
        let mut worker = Worker::new(worker_address, &state.chain, setup, &protocol.reinvest)?;
        worker.set_strategy_ok(owner, &strategies.all(), true)?;
        worker.set_reinvestor_ok(owner, &[keeper], true)?;

        let mut vault = Vault::new(
            vault_address,
            &state.chain,
            owner,
            base,
            share_token,
            &protocol.vault,
            treasury,
        )?;
        vault.set_workers(owner, &[(worker_address, WorkerConfig::from(&protocol.worker))])?;
        vault.set_approved_add_strategies(owner, &strategies.adds(), true)?;
        vault.set_whitelisted_liquidators(owner, &[keeper], true)?;

        state.workers.insert(worker_address, worker);
        state.vaults.insert(vault_address, vault);

        let deployment = Self {
            base,
            farming,
            reward,
            lp,
            reward_lp,
            farm,
            pid,
            vault: vault_address,
            share_token,
            worker: worker_address,
            strategies,
            owner,
            treasury,
            keeper,
            lp_provider,
        };
        deployment.post_prices(&mut state.chain)?;

        info!(
            name = %config.deployment.name,
            vault = %vault_address,
            worker = %worker_address,
            lp = %lp,
            farm = %farm,
            "Market deployed"
        );
        Ok((Ledger::new(state), deployment))
    }

    /// Post the pair's current price to the oracle as the feeder.
    pub fn post_prices(&self, chain: &mut Chain) -> Result<()> {
        let pair = chain.amm.pair(&self.lp)?;
        let (token0, token1) = (pair.token0, pair.token1);
        let price = spot_price(chain, token0, token1)?;
        let feeder = chain.feeder();
        chain.post_prices(feeder, &[(token0, token1, price)])?;
        Ok(())
    }

    /// Feeder update on a live ledger.
    pub fn refresh_prices(&self, ledger: &Ledger) -> Result<()> {
        ledger.transact(|s| self.post_prices(&mut s.chain))
    }

    /// Mint base token to `account`, as a faucet.
    pub fn fund(&self, ledger: &Ledger, account: Address, amount: U256) -> Result<()> {
        ledger.transact(|s| Ok(s.chain.mint(self.base, account, amount)?))
    }

    /// New externally-owned account on the ledger.
    pub fn new_account(&self, ledger: &Ledger) -> Result<Address> {
        ledger.transact(|s| Ok(s.chain.new_account()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_wires_everything() {
        let (ledger, d) = Deployment::bootstrap(&DeploymentConfig::testing()).unwrap();
        ledger.view(|s| {
            let worker = s.worker(&d.worker).unwrap();
            let vault = s.vault(&d.vault).unwrap();
            for strategy in d.strategies.all() {
                assert!(worker.is_strategy_ok(&strategy));
                assert!(s.strategies[&strategy].is_worker_ok(&d.worker));
            }
            assert!(worker.is_reinvestor(&d.keeper));
            assert!(vault.config.is_liquidator(&d.keeper));
            assert!(vault.config.is_approved_add_strategy(&d.strategies.add_base_token_only));
            assert!(!vault.config.is_approved_add_strategy(&d.strategies.liquidate));

            let config = vault.config.worker(&d.worker).unwrap();
            assert!(config.is_stable(&s.chain, worker));
        });
    }
}
