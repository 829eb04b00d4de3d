//! Constant-product AMM venue: pair factory plus router.
//!
//! The core consumes this venue through the router-style operations below
//! (`add_liquidity`, `remove_liquidity`, `swap_exact_tokens_for_tokens`,
//! `swap_tokens_for_exact_tokens`) and the pure quote helpers. The fee is
//! factory-wide, so position health math and swaps agree exactly.
//!
//! Deadlines are not modeled: every call executes in the current block.

mod pair;

pub use pair::{get_amount_in, get_amount_out, quote, sort_tokens, Pair, SwapFee, MINIMUM_LIQUIDITY};

use alloy::primitives::{Address, U256};
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ChainError, Result};
use crate::token::TokenLedger;

/// Per-hop amounts of a routed swap. Paths rarely exceed three hops.
pub type Amounts = SmallVec<[U256; 4]>;

/// Pair factory and router.
#[derive(Debug, Clone, Default)]
pub struct Amm {
    /// Factory-wide swap fee
    pub fee: SwapFee,
    /// Pairs by LP token address
    pairs: HashMap<Address, Pair>,
    /// Sorted token pair -> pair address
    index: HashMap<(Address, Address), Address>,
}

impl Amm {
    pub fn new(fee: SwapFee) -> Self {
        Self {
            fee,
            ..Default::default()
        }
    }

    /// Create a pair at `pair_address` and register its LP token.
    pub fn create_pair(
        &mut self,
        tokens: &mut TokenLedger,
        pair_address: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address> {
        let pair = Pair::new(pair_address, token_a, token_b)?;
        let key = (pair.token0, pair.token1);
        if self.index.contains_key(&key) {
            return Err(ChainError::PairExists);
        }
        let symbol = format!("{}-{} LP", tokens.symbol(&pair.token0), tokens.symbol(&pair.token1));
        tokens.register(pair_address, symbol, 18)?;
        self.index.insert(key, pair_address);
        self.pairs.insert(pair_address, pair);
        debug!(pair = %pair_address, token0 = %key.0, token1 = %key.1, "Pair created");
        Ok(pair_address)
    }

    pub fn pair(&self, address: &Address) -> Result<&Pair> {
        self.pairs
            .get(address)
            .ok_or(ChainError::UnknownPair(*address, Address::ZERO))
    }

    pub fn pair_address(&self, token_a: Address, token_b: Address) -> Result<Address> {
        self.index
            .get(&sort_tokens(token_a, token_b))
            .copied()
            .ok_or(ChainError::UnknownPair(token_a, token_b))
    }

    pub fn pair_for(&self, token_a: Address, token_b: Address) -> Result<&Pair> {
        let address = self.pair_address(token_a, token_b)?;
        self.pair(&address)
    }

    fn pair_mut(&mut self, token_a: Address, token_b: Address) -> Result<&mut Pair> {
        let address = self.pair_address(token_a, token_b)?;
        self.pairs
            .get_mut(&address)
            .ok_or(ChainError::UnknownPair(token_a, token_b))
    }

    /// Reserves ordered as `(reserve_a, reserve_b)`.
    pub fn get_reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256)> {
        self.pair_for(token_a, token_b)?.reserves_for(token_a)
    }

    pub fn get_amount_out(&self, amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
        get_amount_out(amount_in, reserve_in, reserve_out, self.fee)
    }

    pub fn get_amount_in(&self, amount_out: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
        get_amount_in(amount_out, reserve_in, reserve_out, self.fee)
    }

    /// Chained output amounts along `path`.
    pub fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Amounts> {
        if path.len() < 2 {
            return Err(ChainError::InvalidPath);
        }
        let mut amounts: Amounts = smallvec![amount_in];
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self.get_reserves(hop[0], hop[1])?;
            let last = *amounts.last().unwrap_or(&U256::ZERO);
            amounts.push(self.get_amount_out(last, reserve_in, reserve_out)?);
        }
        Ok(amounts)
    }

    /// Chained input amounts along `path` for an exact final output.
    pub fn get_amounts_in(&self, amount_out: U256, path: &[Address]) -> Result<Amounts> {
        if path.len() < 2 {
            return Err(ChainError::InvalidPath);
        }
        let mut amounts: Amounts = smallvec![U256::ZERO; path.len()];
        amounts[path.len() - 1] = amount_out;
        for i in (1..path.len()).rev() {
            let (reserve_in, reserve_out) = self.get_reserves(path[i - 1], path[i])?;
            amounts[i - 1] = self.get_amount_in(amounts[i], reserve_in, reserve_out)?;
        }
        Ok(amounts)
    }

    /// Add liquidity at the current ratio, pulling tokens from `caller`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        caller: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
    ) -> Result<(U256, U256, U256)> {
        let (reserve_a, reserve_b) = self.get_reserves(token_a, token_b)?;
        let (amount_a, amount_b) = if reserve_a.is_zero() && reserve_b.is_zero() {
            (amount_a_desired, amount_b_desired)
        } else {
            let amount_b_optimal = quote(amount_a_desired, reserve_a, reserve_b)?;
            if amount_b_optimal <= amount_b_desired {
                if amount_b_optimal < amount_b_min {
                    return Err(ChainError::InsufficientAmount("B"));
                }
                (amount_a_desired, amount_b_optimal)
            } else {
                let amount_a_optimal = quote(amount_b_desired, reserve_b, reserve_a)?;
                if amount_a_optimal > amount_a_desired {
                    return Err(ChainError::InsufficientAmount("A"));
                }
                if amount_a_optimal < amount_a_min {
                    return Err(ChainError::InsufficientAmount("A"));
                }
                (amount_a_optimal, amount_b_desired)
            }
        };

        let pair = self.pair_mut(token_a, token_b)?;
        tokens.transfer(token_a, caller, pair.address, amount_a)?;
        tokens.transfer(token_b, caller, pair.address, amount_b)?;
        let liquidity = pair.mint(tokens, to)?;
        Ok((amount_a, amount_b, liquidity))
    }

    /// Burn `liquidity` LP from `caller` and send both legs to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        caller: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
    ) -> Result<(U256, U256)> {
        let pair = self.pair_mut(token_a, token_b)?;
        tokens.transfer(pair.address, caller, pair.address, liquidity)?;
        let (amount0, amount1) = pair.burn(tokens, to)?;
        let (amount_a, amount_b) = if token_a == pair.token0 {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        if amount_a < amount_a_min {
            return Err(ChainError::InsufficientAmount("A"));
        }
        if amount_b < amount_b_min {
            return Err(ChainError::InsufficientAmount("B"));
        }
        Ok((amount_a, amount_b))
    }

    /// Swap an exact input along `path`.
    pub fn swap_exact_tokens_for_tokens(
        &mut self,
        tokens: &mut TokenLedger,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
    ) -> Result<Amounts> {
        let amounts = self.get_amounts_out(amount_in, path)?;
        if amounts[amounts.len() - 1] < amount_out_min {
            return Err(ChainError::InsufficientOutputAmount);
        }
        let first = self.pair_address(path[0], path[1])?;
        tokens.transfer(path[0], caller, first, amounts[0])?;
        self.swap_along(tokens, &amounts, path, to)?;
        Ok(amounts)
    }

    /// Swap for an exact output along `path`, spending at most `amount_in_max`.
    pub fn swap_tokens_for_exact_tokens(
        &mut self,
        tokens: &mut TokenLedger,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
    ) -> Result<Amounts> {
        let amounts = self.get_amounts_in(amount_out, path)?;
        if amounts[0] > amount_in_max {
            return Err(ChainError::ExcessiveInputAmount);
        }
        let first = self.pair_address(path[0], path[1])?;
        tokens.transfer(path[0], caller, first, amounts[0])?;
        self.swap_along(tokens, &amounts, path, to)?;
        Ok(amounts)
    }

    fn swap_along(&mut self, tokens: &mut TokenLedger, amounts: &[U256], path: &[Address], to: Address) -> Result<()> {
        let fee = self.fee;
        for i in 0..path.len() - 1 {
            let (input, output) = (path[i], path[i + 1]);
            let amount_out = amounts[i + 1];
            let recipient = if i + 2 < path.len() {
                self.pair_address(output, path[i + 2])?
            } else {
                to
            };
            let pair = self.pair_mut(input, output)?;
            let (amount0_out, amount1_out) = if input == pair.token0 {
                (U256::ZERO, amount_out)
            } else {
                (amount_out, U256::ZERO)
            };
            pair.swap(tokens, amount0_out, amount1_out, recipient, fee)?;
        }
        Ok(())
    }
}
