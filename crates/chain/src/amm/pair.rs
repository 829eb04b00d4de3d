//! Constant-product pair with a fixed swap fee.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::token::TokenLedger;
use crate::u256_math::{self, add, mul, sub};

/// Liquidity permanently locked at the zero address on first mint.
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Swap fee as a numerator/denominator pair, e.g. 9975/10000 for 0.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapFee {
    pub numerator: u64,
    pub denominator: u64,
}

impl SwapFee {
    /// 0.25% fee (9975/10000).
    pub const PANCAKE_V2: Self = Self {
        numerator: 9975,
        denominator: 10000,
    };

    /// 0.30% fee (997/1000).
    pub const UNISWAP_V2: Self = Self {
        numerator: 997,
        denominator: 1000,
    };

    pub fn numerator(&self) -> U256 {
        U256::from(self.numerator)
    }

    pub fn denominator(&self) -> U256 {
        U256::from(self.denominator)
    }
}

impl Default for SwapFee {
    fn default() -> Self {
        Self::PANCAKE_V2
    }
}

/// Output amount for an exact input, fee-adjusted.
///
/// `amountOut = amountIn * fee * reserveOut / (reserveIn * feeDenom + amountIn * fee)`
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee: SwapFee) -> Result<U256> {
    if amount_in.is_zero() {
        return Err(ChainError::InsufficientInputAmount);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(ChainError::InsufficientLiquidity);
    }
    let amount_in_with_fee = mul(amount_in, fee.numerator())?;
    let numerator = mul(amount_in_with_fee, reserve_out)?;
    let denominator = add(mul(reserve_in, fee.denominator())?, amount_in_with_fee)?;
    u256_math::div(numerator, denominator)
}

/// Input amount required for an exact output, fee-adjusted and rounded up.
pub fn get_amount_in(amount_out: U256, reserve_in: U256, reserve_out: U256, fee: SwapFee) -> Result<U256> {
    if amount_out.is_zero() {
        return Err(ChainError::InsufficientOutputAmount);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
        return Err(ChainError::InsufficientLiquidity);
    }
    let numerator = mul(mul(reserve_in, amount_out)?, fee.denominator())?;
    let denominator = mul(sub(reserve_out, amount_out)?, fee.numerator())?;
    add(u256_math::div(numerator, denominator)?, U256::from(1u8))
}

/// Equivalent amount of the other asset at the current reserve ratio.
pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256> {
    if amount_a.is_zero() {
        return Err(ChainError::InsufficientAmount("input"));
    }
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Err(ChainError::InsufficientLiquidity);
    }
    u256_math::mul_div(amount_a, reserve_b, reserve_a)
}

/// Pair state. The LP token of the pair lives at the pair's own address.
#[derive(Debug, Clone)]
pub struct Pair {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

impl Pair {
    pub fn new(address: Address, token_a: Address, token_b: Address) -> Result<Self> {
        if token_a == token_b {
            return Err(ChainError::IdenticalAddresses);
        }
        let (token0, token1) = sort_tokens(token_a, token_b);
        Ok(Self {
            address,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
        })
    }

    pub fn contains(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }

    /// The other token of the pair.
    pub fn other(&self, token: Address) -> Result<Address> {
        if token == self.token0 {
            Ok(self.token1)
        } else if token == self.token1 {
            Ok(self.token0)
        } else {
            Err(ChainError::InvalidPath)
        }
    }

    /// Reserves ordered as `(reserve_of(token), reserve_of(other))`.
    pub fn reserves_for(&self, token: Address) -> Result<(U256, U256)> {
        if token == self.token0 {
            Ok((self.reserve0, self.reserve1))
        } else if token == self.token1 {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(ChainError::InvalidPath)
        }
    }

    /// LP supply, including the locked minimum liquidity.
    pub fn total_supply(&self, tokens: &TokenLedger) -> U256 {
        tokens.total_supply(self.address)
    }

    pub(crate) fn sync(&mut self, tokens: &TokenLedger) {
        self.reserve0 = tokens.balance_of(self.token0, self.address);
        self.reserve1 = tokens.balance_of(self.token1, self.address);
    }

    /// Mint LP for whatever was transferred in since the last sync.
    pub(crate) fn mint(&mut self, tokens: &mut TokenLedger, to: Address) -> Result<U256> {
        let balance0 = tokens.balance_of(self.token0, self.address);
        let balance1 = tokens.balance_of(self.token1, self.address);
        let amount0 = sub(balance0, self.reserve0)?;
        let amount1 = sub(balance1, self.reserve1)?;

        let total_supply = self.total_supply(tokens);
        let liquidity = if total_supply.is_zero() {
            let minimum = U256::from(MINIMUM_LIQUIDITY);
            let root = u256_math::sqrt(mul(amount0, amount1)?);
            let liquidity = root
                .checked_sub(minimum)
                .ok_or(ChainError::InsufficientLiquidityMinted)?;
            tokens.mint(self.address, Address::ZERO, minimum)?;
            liquidity
        } else {
            u256_math::min(
                u256_math::mul_div(amount0, total_supply, self.reserve0)?,
                u256_math::mul_div(amount1, total_supply, self.reserve1)?,
            )
        };
        if liquidity.is_zero() {
            return Err(ChainError::InsufficientLiquidityMinted);
        }
        tokens.mint(self.address, to, liquidity)?;
        self.sync(tokens);
        Ok(liquidity)
    }

    /// Burn the LP held by the pair itself and pay out both legs.
    pub(crate) fn burn(&mut self, tokens: &mut TokenLedger, to: Address) -> Result<(U256, U256)> {
        let balance0 = tokens.balance_of(self.token0, self.address);
        let balance1 = tokens.balance_of(self.token1, self.address);
        let liquidity = tokens.balance_of(self.address, self.address);
        let total_supply = self.total_supply(tokens);

        let amount0 = u256_math::mul_div(liquidity, balance0, total_supply)?;
        let amount1 = u256_math::mul_div(liquidity, balance1, total_supply)?;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(ChainError::InsufficientLiquidityBurned);
        }
        tokens.burn(self.address, self.address, liquidity)?;
        tokens.transfer(self.token0, self.address, to, amount0)?;
        tokens.transfer(self.token1, self.address, to, amount1)?;
        self.sync(tokens);
        Ok((amount0, amount1))
    }

    /// Low-level swap: pay out the requested amounts, then check the fee-adjusted invariant.
    pub(crate) fn swap(
        &mut self,
        tokens: &mut TokenLedger,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        fee: SwapFee,
    ) -> Result<()> {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(ChainError::InsufficientOutputAmount);
        }
        if amount0_out >= self.reserve0 || amount1_out >= self.reserve1 {
            return Err(ChainError::InsufficientLiquidity);
        }
        tokens.transfer(self.token0, self.address, to, amount0_out)?;
        tokens.transfer(self.token1, self.address, to, amount1_out)?;

        let balance0 = tokens.balance_of(self.token0, self.address);
        let balance1 = tokens.balance_of(self.token1, self.address);
        let remaining0 = self.reserve0 - amount0_out;
        let remaining1 = self.reserve1 - amount1_out;
        let amount0_in = balance0.saturating_sub(remaining0);
        let amount1_in = balance1.saturating_sub(remaining1);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(ChainError::InsufficientInputAmount);
        }

        let fee_cut = U256::from(fee.denominator - fee.numerator);
        let adjusted0 = sub(mul(balance0, fee.denominator())?, mul(amount0_in, fee_cut)?)?;
        let adjusted1 = sub(mul(balance1, fee.denominator())?, mul(amount1_in, fee_cut)?)?;
        let k_before = mul(
            mul(self.reserve0, self.reserve1)?,
            mul(fee.denominator(), fee.denominator())?,
        )?;
        if mul(adjusted0, adjusted1)? < k_before {
            return Err(ChainError::BadReserves);
        }
        self.sync(tokens);
        Ok(())
    }
}

/// Order two token addresses the way pairs store them.
pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}
