//! Lending pool for one base token.
//!
//! Depositors hold interest-bearing shares minted as a chain token. Each
//! position's debt is a debt share; interest accrues on the pool-wide debt
//! value, so every borrower is charged without touching positions.

mod config;
mod work;

pub use config::VaultConfig;
pub use work::{KillOutcome, WorkRequest};
pub(crate) use work::within_factor;

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::{self, add, sub, WAD};
use farmvault_chain::Chain;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::VaultParams;
use crate::error::{ProtocolError, Result};

/// Share supply must be zero or above this after a deposit or withdraw.
pub const MIN_SHARE_SUPPLY: U256 = U256::from_limbs([100_000_000_000_000_000u64, 0, 0, 0]);

/// A leveraged position. Never deleted once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub worker: Address,
    pub owner: Address,
    pub debt_share: U256,
}

#[derive(Debug, Clone)]
pub struct Vault {
    pub address: Address,
    pub owner: Address,
    /// Base token lent out
    pub token: Address,
    /// Interest-bearing deposit share token
    pub share_token: Address,
    pub config: VaultConfig,
    positions: BTreeMap<u64, Position>,
    next_position_id: u64,
    vault_debt_share: U256,
    vault_debt_val: U256,
    reserve_pool: U256,
    last_accrue_time: u64,
}

impl Vault {
    pub fn new(
        address: Address,
        chain: &Chain,
        owner: Address,
        token: Address,
        share_token: Address,
        params: &VaultParams,
        treasury: Address,
    ) -> Result<Self> {
        let config = VaultConfig::from_params(params, treasury)?;
        info!(vault = %address, token = %token, share_token = %share_token, "Vault deployed");
        Ok(Self {
            address,
            owner,
            token,
            share_token,
            config,
            positions: BTreeMap::new(),
            next_position_id: 1,
            vault_debt_share: U256::ZERO,
            vault_debt_val: U256::ZERO,
            reserve_pool: U256::ZERO,
            last_accrue_time: chain.now(),
        })
    }

    pub fn position(&self, id: u64) -> Result<&Position> {
        self.positions.get(&id).ok_or(ProtocolError::UnknownPosition(id))
    }

    pub fn positions(&self) -> impl Iterator<Item = (u64, &Position)> {
        self.positions.iter().map(|(id, p)| (*id, p))
    }

    pub fn next_position_id(&self) -> u64 {
        self.next_position_id
    }

    pub fn vault_debt_share(&self) -> U256 {
        self.vault_debt_share
    }

    pub fn vault_debt_val(&self) -> U256 {
        self.vault_debt_val
    }

    pub fn reserve_pool(&self) -> U256 {
        self.reserve_pool
    }

    pub fn last_accrue_time(&self) -> u64 {
        self.last_accrue_time
    }

    /// Idle base token held by the vault.
    pub fn cash(&self, chain: &Chain) -> U256 {
        chain.balance_of(self.token, self.address)
    }

    /// Cash plus outstanding debt, less the protocol reserve.
    pub fn total_token(&self, chain: &Chain) -> Result<U256> {
        let gross = add(self.cash(chain), self.vault_debt_val)?;
        Ok(sub(gross, self.reserve_pool)?)
    }

    pub fn total_shares(&self, chain: &Chain) -> U256 {
        chain.tokens.total_supply(self.share_token)
    }

    /// Interest owed since the last accrual. `value` is base token already
    /// sent to the vault in the current call, left out of utilization.
    pub fn pending_interest(&self, chain: &Chain, value: U256) -> Result<U256> {
        let now = chain.now();
        if now <= self.last_accrue_time {
            return Ok(U256::ZERO);
        }
        let elapsed = U256::from(now - self.last_accrue_time);
        let floating = sub(self.cash(chain), value)?;
        let rate = self.config.interest.rate_per_second(self.vault_debt_val, floating)?;
        let per_wad = u256_math::mul(u256_math::mul(rate, self.vault_debt_val)?, elapsed)?;
        Ok(u256_math::div(per_wad, WAD)?)
    }

    /// Charge interest up to now. Runs at most once per timestamp.
    pub fn accrue(&mut self, chain: &Chain) -> Result<()> {
        let now = chain.now();
        if now <= self.last_accrue_time {
            return Ok(());
        }
        let interest = self.pending_interest(chain, U256::ZERO)?;
        let to_reserve = u256_math::bps(interest, self.config.reserve_pool_bps)?;
        self.reserve_pool = add(self.reserve_pool, to_reserve)?;
        self.vault_debt_val = add(self.vault_debt_val, interest)?;
        self.last_accrue_time = now;
        if !interest.is_zero() {
            debug!(vault = %self.address, interest = %interest, to_reserve = %to_reserve, "Interest accrued");
        }
        Ok(())
    }

    pub fn debt_share_to_val(&self, share: U256) -> Result<U256> {
        if self.vault_debt_share.is_zero() {
            return Ok(share);
        }
        Ok(u256_math::mul_div(share, self.vault_debt_val, self.vault_debt_share)?)
    }

    pub fn debt_val_to_share(&self, val: U256) -> Result<U256> {
        if self.vault_debt_share.is_zero() {
            return Ok(val);
        }
        Ok(u256_math::mul_div(val, self.vault_debt_share, self.vault_debt_val)?)
    }

    /// Debt value of position `id`, without accruing.
    pub fn debt_of(&self, id: u64) -> Result<U256> {
        self.debt_share_to_val(self.position(id)?.debt_share)
    }

    /// Debt value of position `id` as the next accrual would see it.
    pub fn projected_debt_of(&self, chain: &Chain, id: u64) -> Result<U256> {
        let share = self.position(id)?.debt_share;
        if share.is_zero() {
            return Ok(U256::ZERO);
        }
        let val = add(self.vault_debt_val, self.pending_interest(chain, U256::ZERO)?)?;
        Ok(u256_math::mul_div(share, val, self.vault_debt_share)?)
    }

    /// Sum of every position's debt share, for conservation checks.
    pub fn sum_of_debt_shares(&self) -> U256 {
        self.positions.values().fold(U256::ZERO, |acc, p| acc + p.debt_share)
    }

    fn ensure_share_supply(supply: U256) -> Result<()> {
        if !supply.is_zero() && supply <= MIN_SHARE_SUPPLY {
            return Err(ProtocolError::TinyShares);
        }
        Ok(())
    }

    /// Lend `amount` base token to the pool. Returns the shares minted.
    pub fn deposit(&mut self, chain: &mut Chain, caller: Address, amount: U256) -> Result<U256> {
        self.accrue(chain)?;
        if amount.is_zero() {
            return Err(ProtocolError::ZeroAmount);
        }
        let total = self.total_token(chain)?;
        let supply = self.total_shares(chain);
        let share = if total.is_zero() {
            amount
        } else {
            u256_math::mul_div(amount, supply, total)?
        };
        if share.is_zero() {
            return Err(ProtocolError::ZeroAmount);
        }
        Self::ensure_share_supply(add(supply, share)?)?;

        chain.transfer(self.token, caller, self.address, amount)?;
        chain.mint(self.share_token, caller, share)?;

        info!(vault = %self.address, caller = %caller, amount = %amount, share = %share, "Deposit");
        Ok(share)
    }

    /// Burn `share` and pay out its base token. Fails when the vault does not
    /// hold enough idle cash.
    pub fn withdraw(&mut self, chain: &mut Chain, caller: Address, share: U256) -> Result<U256> {
        self.accrue(chain)?;
        if share.is_zero() {
            return Err(ProtocolError::ZeroAmount);
        }
        let total = self.total_token(chain)?;
        let supply = self.total_shares(chain);
        let amount = u256_math::mul_div(share, total, supply)?;
        if amount > self.cash(chain) {
            return Err(ProtocolError::InsufficientFunds);
        }
        Self::ensure_share_supply(sub(supply, share)?)?;

        chain.tokens.burn(self.share_token, caller, share)?;
        chain.transfer(self.token, self.address, caller, amount)?;

        info!(vault = %self.address, caller = %caller, share = %share, amount = %amount, "Withdraw");
        Ok(amount)
    }

    /// Pay `amount` of the reserve out of the vault's cash to `to`.
    pub fn withdraw_reserve(&mut self, chain: &mut Chain, caller: Address, to: Address, amount: U256) -> Result<()> {
        self.only_owner(caller)?;
        if amount > self.reserve_pool {
            return Err(ProtocolError::InsufficientReserve);
        }
        self.reserve_pool -= amount;
        chain.transfer(self.token, self.address, to, amount)?;
        info!(vault = %self.address, to = %to, amount = %amount, "Reserve withdrawn");
        Ok(())
    }

    /// Release `amount` of the reserve back to depositors.
    pub fn reduce_reserve(&mut self, caller: Address, amount: U256) -> Result<()> {
        self.only_owner(caller)?;
        if amount > self.reserve_pool {
            return Err(ProtocolError::InsufficientReserve);
        }
        self.reserve_pool -= amount;
        info!(vault = %self.address, amount = %amount, "Reserve reduced");
        Ok(())
    }

    fn only_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(ProtocolError::NotOwner("vault"));
        }
        Ok(())
    }

    fn open_position(&mut self, worker: Address, owner: Address) -> u64 {
        let id = self.next_position_id;
        self.next_position_id += 1;
        self.positions.insert(
            id,
            Position {
                worker,
                owner,
                debt_share: U256::ZERO,
            },
        );
        id
    }

    fn add_debt(&mut self, id: u64, amount: U256) -> Result<()> {
        let share = self.debt_val_to_share(amount)?;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownPosition(id))?;
        position.debt_share = add(position.debt_share, share)?;
        self.vault_debt_share = add(self.vault_debt_share, share)?;
        self.vault_debt_val = add(self.vault_debt_val, amount)?;
        debug!(id, amount = %amount, share = %share, "Debt added");
        Ok(())
    }

    /// Clear position `id`'s debt and return its value.
    fn remove_debt(&mut self, id: u64) -> Result<U256> {
        let share = self.position(id)?.debt_share;
        if share.is_zero() {
            return Ok(U256::ZERO);
        }
        let val = self.debt_share_to_val(share)?;
        self.vault_debt_share = sub(self.vault_debt_share, share)?;
        self.vault_debt_val = sub(self.vault_debt_val, val)?;
        if let Some(position) = self.positions.get_mut(&id) {
            position.debt_share = U256::ZERO;
        }
        debug!(id, val = %val, share = %share, "Debt removed");
        Ok(val)
    }
}
