//! Optimal swap sizing before adding liquidity.
//!
//! For a fee of `n / D`, swapping `x` of token A into a pool with reserve `r`
//! leaves the remaining A and the received B exactly at the post-swap pool
//! ratio when `x` solves
//! `n * x^2 + (D + n) * r * x - D * a * r = 0`.

use alloy::primitives::U256;
use farmvault_chain::u256_math::{self, add, div, mul, sqrt, sub};
use farmvault_chain::SwapFee;

use crate::error::Result;

/// Amount of a single token to swap before pairing it with the output.
///
/// `x = (sqrt(r * ((D + n)^2 * r + 4 * n * D * a)) - (D + n) * r) / (2 * n)`
pub fn one_sided_swap_amount(amount: U256, reserve_in: U256, fee: SwapFee) -> Result<U256> {
    if amount.is_zero() || reserve_in.is_zero() {
        return Ok(U256::ZERO);
    }
    let n = fee.numerator();
    let d = fee.denominator();
    let d_plus_n = add(d, n)?;
    let four = U256::from(4u8);

    let inner = add(
        mul(mul(d_plus_n, d_plus_n)?, reserve_in)?,
        mul(mul(mul(four, n)?, d)?, amount)?,
    )?;
    let root = sqrt(mul(reserve_in, inner)?);
    let numerator = sub(root, mul(d_plus_n, reserve_in)?)?;
    Ok(div(numerator, mul(U256::from(2u8), n)?)?)
}

/// Rebalancing swap for unequal amounts of both legs.
///
/// Returns the amount to swap and whether the swap goes B -> A.
pub fn two_sided_swap_amount(
    amount_a: U256,
    amount_b: U256,
    reserve_a: U256,
    reserve_b: U256,
    fee: SwapFee,
) -> Result<(U256, bool)> {
    if mul(amount_a, reserve_b)? >= mul(amount_b, reserve_a)? {
        Ok((optimal_deposit_a(amount_a, amount_b, reserve_a, reserve_b, fee)?, false))
    } else {
        Ok((optimal_deposit_a(amount_b, amount_a, reserve_b, reserve_a, fee)?, true))
    }
}

/// Assumes `amount_a * reserve_b >= amount_b * reserve_a`.
fn optimal_deposit_a(
    amount_a: U256,
    amount_b: U256,
    reserve_a: U256,
    reserve_b: U256,
    fee: SwapFee,
) -> Result<U256> {
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Ok(U256::ZERO);
    }
    let n = fee.numerator();
    let d = fee.denominator();

    let a = n;
    let b = mul(add(d, n)?, reserve_a)?;
    let excess = sub(mul(amount_a, reserve_b)?, mul(amount_b, reserve_a)?)?;
    let c = mul(
        u256_math::mul_div(excess, d, add(amount_b, reserve_b)?)?,
        reserve_a,
    )?;
    let discriminant = add(mul(b, b)?, mul(mul(a, c)?, U256::from(4u8))?)?;
    let numerator = sub(sqrt(discriminant), b)?;
    Ok(div(numerator, mul(a, U256::from(2u8))?)?)
}
