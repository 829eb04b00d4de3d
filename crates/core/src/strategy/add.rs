//! Strategies that turn escrowed tokens into LP.

use alloy::primitives::U256;
use tracing::debug;

use super::optimal;
use super::Exec;
use crate::error::{ProtocolError, Result};

/// Zap escrowed base token into LP with the optimal one-sided swap.
pub(super) fn add_base_token_only(exec: &mut Exec<'_>, min_lp: U256) -> Result<()> {
    let (base, farming) = (exec.tokens.base, exec.tokens.farming);
    let amount = exec.balance(base);
    let (reserve_base, _) = exec.reserves()?;
    let swap = optimal::one_sided_swap_amount(amount, reserve_base, exec.chain.amm.fee)?;
    exec.swap_exact_in(swap, base, farming)?;
    finish_add(exec, min_lp)
}

/// Rebalance both legs with one swap, then add liquidity.
pub(super) fn add_two_sides_optimal(exec: &mut Exec<'_>, farming_amount: U256, min_lp: U256) -> Result<()> {
    exec.pull_farming(farming_amount)?;
    let (base, farming) = (exec.tokens.base, exec.tokens.farming);
    let base_amount = exec.balance(base);
    let farming_amount = exec.balance(farming);
    let (reserve_base, reserve_farming) = exec.reserves()?;

    let (swap, reversed) = optimal::two_sided_swap_amount(
        base_amount,
        farming_amount,
        reserve_base,
        reserve_farming,
        exec.chain.amm.fee,
    )?;
    if reversed {
        exec.swap_exact_in(swap, farming, base)?;
    } else {
        exec.swap_exact_in(swap, base, farming)?;
    }
    finish_add(exec, min_lp)
}

/// Pair escrowed base token with farming token supplied by the user, no swap.
pub(super) fn add_base_with_farm(exec: &mut Exec<'_>, farming_amount: U256, min_lp: U256) -> Result<()> {
    exec.pull_farming(farming_amount)?;
    finish_add(exec, min_lp)
}

fn finish_add(exec: &mut Exec<'_>, min_lp: U256) -> Result<()> {
    let liquidity = exec.add_all_liquidity()?;
    if liquidity < min_lp {
        return Err(ProtocolError::InsufficientLpReceived);
    }
    let base_debris = exec.balance(exec.tokens.base);
    exec.return_to_worker()?;
    let farming_debris = exec.return_farming_to_user()?;
    debug!(liquidity = %liquidity, base_debris = %base_debris, farming_debris = %farming_debris, "Liquidity added");
    Ok(())
}
