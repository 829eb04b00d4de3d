//! Transactional world state.
//!
//! Every entry point runs against a draft copy of the whole state under one
//! lock and is committed only if it returns `Ok`. A failed call leaves no
//! trace, and two calls never interleave.

use alloy::primitives::{Address, U256};
use farmvault_chain::Chain;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::vault::{KillOutcome, Vault, WorkRequest};
use crate::worker::{Strategies, Worker};

/// Host chain plus every deployed protocol contract.
#[derive(Debug, Clone)]
pub struct State {
    pub chain: Chain,
    pub vaults: HashMap<Address, Vault>,
    pub workers: HashMap<Address, Worker>,
    pub strategies: Strategies,
}

/// Mutable borrows of one vault and one worker alongside the chain.
pub struct Parts<'a> {
    pub chain: &'a mut Chain,
    pub vault: &'a mut Vault,
    pub worker: &'a mut Worker,
    pub strategies: &'a Strategies,
}

impl State {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            vaults: HashMap::new(),
            workers: HashMap::new(),
            strategies: Strategies::new(),
        }
    }

    pub fn vault(&self, vault: &Address) -> Result<&Vault> {
        self.vaults.get(vault).ok_or(ProtocolError::UnknownVault(*vault))
    }

    pub fn vault_mut(&mut self, vault: &Address) -> Result<&mut Vault> {
        self.vaults.get_mut(vault).ok_or(ProtocolError::UnknownVault(*vault))
    }

    pub fn worker(&self, worker: &Address) -> Result<&Worker> {
        self.workers.get(worker).ok_or(ProtocolError::UnknownWorker(*worker))
    }

    pub fn worker_mut(&mut self, worker: &Address) -> Result<&mut Worker> {
        self.workers.get_mut(worker).ok_or(ProtocolError::UnknownWorker(*worker))
    }

    pub fn parts(&mut self, vault: Address, worker: Address) -> Result<Parts<'_>> {
        let State {
            chain,
            vaults,
            workers,
            strategies,
        } = self;
        let vault = vaults.get_mut(&vault).ok_or(ProtocolError::UnknownVault(vault))?;
        let worker = workers
            .get_mut(&worker)
            .ok_or(ProtocolError::UnknownWorker(worker))?;
        Ok(Parts {
            chain,
            vault,
            worker,
            strategies,
        })
    }

    /// Worker bound to position `id` of `vault`.
    pub fn position_worker(&self, vault: Address, id: u64) -> Result<Address> {
        Ok(self.vault(&vault)?.position(id)?.worker)
    }
}

#[derive(Debug)]
pub struct Ledger {
    state: Mutex<State>,
}

impl Ledger {
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Run `f` on a draft and commit it only on success.
    pub fn transact<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        match f(&mut draft) {
            Ok(out) => {
                *state = draft;
                Ok(out)
            }
            Err(err) => {
                debug!(error = %err, kind = ?err.kind(), "Call reverted");
                Err(err)
            }
        }
    }

    /// Read-only access to the committed state.
    pub fn view<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        f(&self.state.lock())
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> State {
        self.state.lock().clone()
    }

    pub fn advance_time(&self, secs: u64) {
        self.state.lock().chain.advance_time(secs);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.lock().chain.advance_blocks(blocks);
    }

    pub fn now(&self) -> u64 {
        self.view(|s| s.chain.now())
    }

    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.view(|s| s.chain.balance_of(token, account))
    }

    pub fn deposit(&self, vault: Address, caller: Address, amount: U256) -> Result<U256> {
        self.transact(|s| {
            let State { chain, vaults, .. } = s;
            let vault = vaults.get_mut(&vault).ok_or(ProtocolError::UnknownVault(vault))?;
            vault.deposit(chain, caller, amount)
        })
    }

    pub fn withdraw(&self, vault: Address, caller: Address, share: U256) -> Result<U256> {
        self.transact(|s| {
            let State { chain, vaults, .. } = s;
            let vault = vaults.get_mut(&vault).ok_or(ProtocolError::UnknownVault(vault))?;
            vault.withdraw(chain, caller, share)
        })
    }

    pub fn work(&self, vault: Address, caller: Address, request: &WorkRequest) -> Result<u64> {
        self.transact(|s| {
            let p = s.parts(vault, request.worker)?;
            p.vault.work(p.chain, p.worker, p.strategies, caller, request)
        })
    }

    pub fn kill(&self, vault: Address, caller: Address, id: u64) -> Result<KillOutcome> {
        self.transact(|s| {
            let worker = s.position_worker(vault, id)?;
            let p = s.parts(vault, worker)?;
            p.vault.kill(p.chain, p.worker, p.strategies, caller, id)
        })
    }

    pub fn add_collateral(
        &self,
        vault: Address,
        caller: Address,
        id: u64,
        amount: U256,
        go_rogue: bool,
        data: &[u8],
    ) -> Result<()> {
        self.transact(|s| {
            let worker = s.position_worker(vault, id)?;
            let p = s.parts(vault, worker)?;
            p.vault
                .add_collateral(p.chain, p.worker, p.strategies, caller, id, amount, go_rogue, data)
        })
    }

    pub fn reinvest(&self, worker: Address, caller: Address) -> Result<U256> {
        self.transact(|s| {
            let State {
                chain,
                workers,
                strategies,
                ..
            } = s;
            let worker = workers
                .get_mut(&worker)
                .ok_or(ProtocolError::UnknownWorker(worker))?;
            worker.reinvest(chain, strategies, caller)
        })
    }

    pub fn position_info(&self, vault: Address, id: u64) -> Result<(U256, U256)> {
        self.view(|s| {
            let vault = s.vault(&vault)?;
            let worker = s.worker(&vault.position(id)?.worker)?;
            vault.position_info(&s.chain, worker, id)
        })
    }

    pub fn total_token(&self, vault: Address) -> Result<U256> {
        self.view(|s| s.vault(&vault)?.total_token(&s.chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultParams;
    use farmvault_chain::u256_math::ether;

    fn ledger() -> (Ledger, Address, Address, Address) {
        let mut chain = Chain::default();
        let token = chain.create_token("BTOKEN", 18).unwrap();
        let share = chain.create_token("ibBTOKEN", 18).unwrap();
        let owner = chain.new_account();
        let alice = chain.new_account();
        chain.mint(token, alice, ether(5)).unwrap();
        let address = chain.deploy_contract();
        let vault = Vault::new(address, &chain, owner, token, share, &VaultParams::default(), owner).unwrap();
        let mut state = State::new(chain);
        state.vaults.insert(address, vault);
        (Ledger::new(state), address, token, alice)
    }

    #[test]
    fn test_failed_call_leaves_no_trace() {
        let (ledger, vault, token, alice) = ledger();
        let err = ledger
            .transact(|s| {
                let State { chain, vaults, .. } = s;
                vaults
                    .get_mut(&vault)
                    .ok_or(ProtocolError::UnknownVault(vault))?
                    .deposit(chain, alice, ether(1))?;
                Err::<(), _>(ProtocolError::ZeroAmount)
            })
            .unwrap_err();
        assert_eq!(err, ProtocolError::ZeroAmount);
        assert_eq!(ledger.balance_of(token, alice), ether(5));
        assert_eq!(ledger.total_token(vault).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_successful_call_commits() {
        let (ledger, vault, token, alice) = ledger();
        ledger.deposit(vault, alice, ether(2)).unwrap();
        assert_eq!(ledger.balance_of(token, alice), ether(3));
        assert_eq!(ledger.total_token(vault).unwrap(), ether(2));
    }

    #[test]
    fn test_unknown_vault() {
        let (ledger, _, _, alice) = ledger();
        let err = ledger.deposit(Address::ZERO, alice, ether(1)).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownVault(Address::ZERO));
    }
}
