//! In-process host ledger: clock, balances, AMM, farms and oracle.
//!
//! Addresses are handed out deterministically from a counter. Contract
//! deployments are remembered so callers can be told apart from
//! externally-owned accounts.

use alloy::primitives::{Address, U256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::amm::{Amm, SwapFee};
use crate::clock::Clock;
use crate::error::{ChainError, Result};
use crate::farm::{Emission, Farm};
use crate::oracle::SimplePriceOracle;
use crate::token::TokenLedger;

/// Everything the lending protocol treats as "the outside world".
#[derive(Debug, Clone)]
pub struct Chain {
    pub clock: Clock,
    pub tokens: TokenLedger,
    pub amm: Amm,
    pub oracle: SimplePriceOracle,
    farms: HashMap<Address, Farm>,
    contracts: HashSet<Address>,
    next_address: u64,
}

impl Chain {
    /// Fresh ledger. The oracle feeder is allocated as the first account.
    pub fn new(fee: SwapFee) -> Self {
        let feeder = Self::address_from_counter(1);
        Self {
            clock: Clock::default(),
            tokens: TokenLedger::new(),
            amm: Amm::new(fee),
            oracle: SimplePriceOracle::new(feeder),
            farms: HashMap::new(),
            contracts: HashSet::new(),
            next_address: 2,
        }
    }

    fn address_from_counter(n: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address::from(bytes)
    }

    fn allocate(&mut self) -> Address {
        let address = Self::address_from_counter(self.next_address);
        self.next_address += 1;
        address
    }

    /// New externally-owned account.
    pub fn new_account(&mut self) -> Address {
        self.allocate()
    }

    /// Reserve an address for a contract.
    pub fn deploy_contract(&mut self) -> Address {
        let address = self.allocate();
        self.contracts.insert(address);
        address
    }

    pub fn is_contract(&self, account: &Address) -> bool {
        self.contracts.contains(account)
    }

    pub fn feeder(&self) -> Address {
        self.oracle.feeder
    }

    pub fn now(&self) -> u64 {
        self.clock.timestamp
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.clock.advance_secs(secs);
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.clock.advance_blocks(blocks);
    }

    pub fn create_token(&mut self, symbol: &str, decimals: u8) -> Result<Address> {
        let address = self.deploy_contract();
        self.tokens.register(address, symbol, decimals)?;
        info!(token = %address, symbol, "Token deployed");
        Ok(address)
    }

    pub fn create_pair(&mut self, token_a: Address, token_b: Address) -> Result<Address> {
        let address = self.deploy_contract();
        self.amm.create_pair(&mut self.tokens, address, token_a, token_b)
    }

    pub fn create_farm(&mut self, reward_token: Address, reward_per_unit: U256, emission: Emission) -> Result<Address> {
        if !self.tokens.is_registered(&reward_token) {
            return Err(ChainError::UnknownToken(reward_token));
        }
        let address = self.deploy_contract();
        self.farms
            .insert(address, Farm::new(address, reward_token, reward_per_unit, emission));
        debug!(farm = %address, reward_token = %reward_token, ?emission, "Farm deployed");
        Ok(address)
    }

    pub fn farm(&self, farm: &Address) -> Result<&Farm> {
        self.farms.get(farm).ok_or(ChainError::UnknownFarm(*farm))
    }

    pub fn add_farm_pool(&mut self, farm: Address, lp_token: Address, alloc_point: u64) -> Result<usize> {
        let clock = self.clock;
        self.farms
            .get_mut(&farm)
            .ok_or(ChainError::UnknownFarm(farm))?
            .add_pool(&clock, lp_token, alloc_point)
    }

    pub fn farm_deposit(&mut self, farm: Address, pid: usize, user: Address, amount: U256) -> Result<U256> {
        let clock = self.clock;
        self.farms
            .get_mut(&farm)
            .ok_or(ChainError::UnknownFarm(farm))?
            .deposit(&mut self.tokens, &clock, pid, user, amount)
    }

    pub fn farm_withdraw(&mut self, farm: Address, pid: usize, user: Address, amount: U256) -> Result<U256> {
        let clock = self.clock;
        self.farms
            .get_mut(&farm)
            .ok_or(ChainError::UnknownFarm(farm))?
            .withdraw(&mut self.tokens, &clock, pid, user, amount)
    }

    pub fn farm_harvest(&mut self, farm: Address, pid: usize, user: Address) -> Result<U256> {
        self.farm_withdraw(farm, pid, user, U256::ZERO)
    }

    pub fn farm_staked(&self, farm: Address, pid: usize, user: Address) -> Result<U256> {
        let farm = self.farm(&farm)?;
        farm.pool(pid)?;
        Ok(farm.user_info(pid, user).amount)
    }

    pub fn farm_pending(&self, farm: Address, pid: usize, user: Address) -> Result<U256> {
        self.farm(&farm)?.pending_reward(pid, user, &self.clock)
    }

    /// Post prices as the feeder at the current time.
    pub fn post_prices(&mut self, caller: Address, updates: &[(Address, Address, U256)]) -> Result<()> {
        let now = self.now();
        self.oracle.set_prices(caller, updates, now)
    }

    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.tokens.balance_of(token, account)
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        self.tokens.mint(token, to, amount)
    }

    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        self.tokens.transfer(token, from, to, amount)
    }

    /// Seed a pool at the given amounts, minting both legs to `provider` first.
    pub fn seed_liquidity(
        &mut self,
        provider: Address,
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<U256> {
        self.tokens.mint(token_a, provider, amount_a)?;
        self.tokens.mint(token_b, provider, amount_b)?;
        let (_, _, liquidity) = self.amm.add_liquidity(
            &mut self.tokens,
            provider,
            token_a,
            token_b,
            amount_a,
            amount_b,
            U256::ZERO,
            U256::ZERO,
            provider,
        )?;
        Ok(liquidity)
    }

    /// Swap an exact input along `path` on behalf of `caller`.
    pub fn swap_exact_in(
        &mut self,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
    ) -> Result<U256> {
        let amounts = self
            .amm
            .swap_exact_tokens_for_tokens(&mut self.tokens, caller, amount_in, amount_out_min, path, to)?;
        Ok(amounts[amounts.len() - 1])
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(SwapFee::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::{ether, WAD};

    #[test]
    fn test_addresses_are_deterministic() {
        let mut a = Chain::default();
        let mut b = Chain::default();
        assert_eq!(a.new_account(), b.new_account());
        let contract = a.deploy_contract();
        assert!(a.is_contract(&contract));
        let eoa = a.new_account();
        assert!(!a.is_contract(&eoa));
        assert_ne!(contract, eoa);
    }

    #[test]
    fn test_farm_through_host() {
        let mut chain = Chain::default();
        let base = chain.create_token("BUSD", 18).unwrap();
        let farming = chain.create_token("FTOKEN", 18).unwrap();
        let cake = chain.create_token("CAKE", 18).unwrap();
        let lp = chain.create_pair(base, farming).unwrap();
        let farm = chain.create_farm(cake, WAD, Emission::PerSecond).unwrap();
        let pid = chain.add_farm_pool(farm, lp, 1).unwrap();

        let alice = chain.new_account();
        let minted = chain
            .seed_liquidity(alice, base, farming, ether(10), ether(1))
            .unwrap();
        chain.farm_deposit(farm, pid, alice, minted).unwrap();
        chain.advance_time(60);

        let pending = chain.farm_pending(farm, pid, alice).unwrap();
        // Accumulator precision loses a few wei
        assert!(pending <= ether(60) && pending > ether(60) - U256::from(1_000_000u64));
        chain.farm_harvest(farm, pid, alice).unwrap();
        assert_eq!(chain.balance_of(cake, alice), pending);
        assert_eq!(chain.farm_staked(farm, pid, alice).unwrap(), minted);
    }

    #[test]
    fn test_feeder_posts_at_current_time() {
        let mut chain = Chain::default();
        let base = chain.create_token("BUSD", 18).unwrap();
        let farming = chain.create_token("FTOKEN", 18).unwrap();
        chain.advance_time(10);
        let feeder = chain.feeder();
        chain.post_prices(feeder, &[(farming, base, WAD)]).unwrap();

        use crate::oracle::PriceOracle;
        let (_, at) = chain.oracle.get_price(farming, base).unwrap();
        assert_eq!(at, chain.now());
    }
}
