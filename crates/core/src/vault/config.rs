//! Vault-level settings and their owner-only setters.

use alloy::primitives::{Address, U256};
use farmvault_chain::Chain;
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::Vault;
use crate::config::VaultParams;
use crate::error::{ProtocolError, Result};
use crate::interest::InterestModel;
use crate::worker::WorkerConfig;

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub min_debt_size: U256,
    pub reserve_pool_bps: u64,
    pub kill_bps: u64,
    pub kill_treasury_bps: u64,
    /// Receives the kill treasury fee
    pub treasury: Address,
    pub interest: InterestModel,
    workers: HashMap<Address, WorkerConfig>,
    approved_add_strategies: HashSet<Address>,
    whitelisted_callers: HashSet<Address>,
    whitelisted_liquidators: HashSet<Address>,
}

impl VaultConfig {
    pub fn from_params(params: &VaultParams, treasury: Address) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            min_debt_size: params.min_debt_size_wad(),
            reserve_pool_bps: params.reserve_pool_bps,
            kill_bps: params.kill_bps,
            kill_treasury_bps: params.kill_treasury_bps,
            treasury,
            interest: params.interest,
            workers: HashMap::new(),
            approved_add_strategies: HashSet::new(),
            whitelisted_callers: HashSet::new(),
            whitelisted_liquidators: HashSet::new(),
        })
    }

    pub fn worker(&self, worker: &Address) -> Result<&WorkerConfig> {
        self.workers.get(worker).ok_or(ProtocolError::NotWorker)
    }

    pub fn workers(&self) -> impl Iterator<Item = &Address> {
        self.workers.keys()
    }

    pub fn is_worker(&self, worker: &Address) -> bool {
        self.workers.contains_key(worker)
    }

    pub fn is_approved_add_strategy(&self, strategy: &Address) -> bool {
        self.approved_add_strategies.contains(strategy)
    }

    pub fn is_liquidator(&self, account: &Address) -> bool {
        self.whitelisted_liquidators.contains(account)
    }

    /// Externally-owned accounts may always call; contracts only when
    /// whitelisted.
    pub fn ensure_caller(&self, chain: &Chain, caller: Address) -> Result<()> {
        if chain.is_contract(&caller) && !self.whitelisted_callers.contains(&caller) {
            return Err(ProtocolError::NotWhitelistedCaller);
        }
        Ok(())
    }
}

fn set_flags(set: &mut HashSet<Address>, accounts: &[Address], ok: bool) {
    for account in accounts {
        if ok {
            set.insert(*account);
        } else {
            set.remove(account);
        }
    }
}

impl Vault {
    pub fn set_params(&mut self, caller: Address, params: &VaultParams, treasury: Address) -> Result<()> {
        self.only_owner(caller)?;
        let fresh = VaultConfig::from_params(params, treasury)?;
        let config = &mut self.config;
        config.min_debt_size = fresh.min_debt_size;
        config.reserve_pool_bps = fresh.reserve_pool_bps;
        config.kill_bps = fresh.kill_bps;
        config.kill_treasury_bps = fresh.kill_treasury_bps;
        config.treasury = fresh.treasury;
        config.interest = fresh.interest;
        info!(
            vault = %self.address,
            min_debt_size = %config.min_debt_size,
            reserve_pool_bps = config.reserve_pool_bps,
            kill_bps = config.kill_bps,
            "Set vault params"
        );
        Ok(())
    }

    pub fn set_workers(&mut self, caller: Address, workers: &[(Address, WorkerConfig)]) -> Result<()> {
        self.only_owner(caller)?;
        for (_, config) in workers {
            config.validate()?;
        }
        for (worker, config) in workers {
            self.config.workers.insert(*worker, *config);
            info!(
                vault = %self.address,
                worker = %worker,
                accept_debt = config.accept_debt,
                work_factor = config.work_factor,
                kill_factor = config.kill_factor,
                "Set worker config"
            );
        }
        Ok(())
    }

    pub fn set_approved_add_strategies(&mut self, caller: Address, strategies: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.config.approved_add_strategies, strategies, ok);
        info!(vault = %self.address, count = strategies.len(), ok, "Set approved add strategies");
        Ok(())
    }

    pub fn set_whitelisted_callers(&mut self, caller: Address, callers: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.config.whitelisted_callers, callers, ok);
        info!(vault = %self.address, count = callers.len(), ok, "Set whitelisted callers");
        Ok(())
    }

    pub fn set_whitelisted_liquidators(&mut self, caller: Address, liquidators: &[Address], ok: bool) -> Result<()> {
        self.only_owner(caller)?;
        set_flags(&mut self.config.whitelisted_liquidators, liquidators, ok);
        info!(vault = %self.address, count = liquidators.len(), ok, "Set whitelisted liquidators");
        Ok(())
    }
}
