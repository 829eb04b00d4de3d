//! Strategies that unwind LP and sell the farming leg for base token.

use alloy::primitives::U256;
use farmvault_chain::u256_math;
use tracing::debug;

use super::Exec;
use crate::error::{ProtocolError, Result};

/// Remove all LP, sell all farming token, send base token to the worker.
pub(super) fn liquidate(exec: &mut Exec<'_>, min_base: U256) -> Result<()> {
    let lp = exec.balance(exec.tokens.lp);
    exec.remove_liquidity(lp)?;
    sell_all_farming(exec)?;

    let base = exec.balance(exec.tokens.base);
    if base < min_base {
        return Err(ProtocolError::InsufficientBaseReceived);
    }
    debug!(lp = %lp, base = %base, "Position liquidated");
    exec.return_to_worker()
}

/// Remove up to `max_lp` LP (more than escrowed is an error), sell the
/// farming leg and return base token plus the remaining LP to the worker.
///
/// `max_debt_repayment` is clamped to the position's debt; the user must end
/// up with at least `min_base` after that repayment.
pub(super) fn partial_close(
    exec: &mut Exec<'_>,
    max_lp: U256,
    max_debt_repayment: U256,
    min_base: U256,
) -> Result<()> {
    let held = exec.balance(exec.tokens.lp);
    if max_lp > held {
        return Err(ProtocolError::InsufficientLpAmount);
    }
    exec.remove_liquidity(max_lp)?;
    sell_all_farming(exec)?;

    let less_debt = u256_math::min(max_debt_repayment, exec.debt);
    let base = exec.balance(exec.tokens.base);
    if base < less_debt || base - less_debt < min_base {
        return Err(ProtocolError::InsufficientBaseReceived);
    }
    debug!(lp = %max_lp, base = %base, less_debt = %less_debt, "Position partially closed");
    exec.return_to_worker()
}

fn sell_all_farming(exec: &mut Exec<'_>) -> Result<()> {
    let (base, farming) = (exec.tokens.base, exec.tokens.farming);
    let amount = exec.balance(farming);
    exec.swap_exact_in(amount, farming, base)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{Strategy, StrategyCall, StrategyKind, WorkerTokens};
    use crate::error::ProtocolError;
    use alloy::primitives::{Address, U256};
    use farmvault_chain::amm::get_amount_out;
    use farmvault_chain::u256_math::ether;
    use farmvault_chain::{Chain, SwapFee};

    /// Strategy holding 1 LP of a 10:10 pool owned by a provider.
    fn setup(kind: StrategyKind) -> (Chain, WorkerTokens, Strategy, Address) {
        let mut chain = Chain::default();
        let base = chain.create_token("BTOKEN", 18).unwrap();
        let farming = chain.create_token("FTOKEN", 18).unwrap();
        let lp = chain.create_pair(base, farming).unwrap();
        let provider = chain.new_account();
        chain
            .seed_liquidity(provider, base, farming, ether(10), ether(10))
            .unwrap();
        let worker = chain.deploy_contract();
        let mut strategy = Strategy::new(chain.deploy_contract(), kind);
        strategy.set_workers_ok(&[worker], true);
        chain.transfer(lp, provider, strategy.address, ether(1)).unwrap();
        (chain, WorkerTokens { base, farming, lp }, strategy, worker)
    }

    /// 1 LP of a 10:10 pool = 1 base + 1 farming; selling 1 farming into 9:9.
    fn expected_base() -> U256 {
        ether(1) + U256::from(897_974_493_623_405_851u64)
    }

    #[test]
    fn test_liquidate_slippage_floor() {
        let (chain, tokens, strategy, worker) = setup(StrategyKind::Liquidate);
        let user = Address::ZERO;

        let mut over = chain.clone();
        let payload = StrategyCall::Liquidate {
            min_base: expected_base() + U256::from(1u8),
        }
        .encode();
        let err = strategy
            .execute(&mut over, worker, tokens, user, U256::ZERO, &payload)
            .unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientBaseReceived);

        let mut exact = chain;
        let payload = StrategyCall::Liquidate {
            min_base: expected_base(),
        }
        .encode();
        strategy
            .execute(&mut exact, worker, tokens, user, U256::ZERO, &payload)
            .unwrap();
        assert_eq!(exact.balance_of(tokens.base, worker), expected_base());
    }

    #[test]
    fn test_partial_close_lp_over_request_reverts() {
        let (mut chain, tokens, strategy, worker) = setup(StrategyKind::PartialCloseLiquidate);
        let payload = StrategyCall::PartialCloseLiquidate {
            max_lp: ether(2),
            max_debt_repayment: U256::ZERO,
            min_base: U256::ZERO,
        }
        .encode();
        let err = strategy
            .execute(&mut chain, worker, tokens, Address::ZERO, U256::ZERO, &payload)
            .unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientLpAmount);
    }

    #[test]
    fn test_partial_close_clamps_debt_repayment() {
        let (mut chain, tokens, strategy, worker) = setup(StrategyKind::PartialCloseLiquidate);
        let half = ether(1) / U256::from(2u8);
        // Asks to repay far more than the 0.1 debt; clamped, so min_base still holds
        let payload = StrategyCall::PartialCloseLiquidate {
            max_lp: half,
            max_debt_repayment: ether(100),
            min_base: ether(8) / U256::from(10u8),
        }
        .encode();
        strategy
            .execute(&mut chain, worker, tokens, Address::ZERO, ether(1) / U256::from(10u8), &payload)
            .unwrap();

        assert_eq!(chain.balance_of(tokens.lp, worker), half);
        assert_eq!(chain.balance_of(tokens.lp, strategy.address), U256::ZERO);
        assert!(chain.balance_of(tokens.base, worker) > ether(9) / U256::from(10u8));
    }

    #[test]
    fn test_partial_close_slippage_floor() {
        let (chain, tokens, strategy, worker) = setup(StrategyKind::PartialCloseLiquidate);
        let half = ether(1) / U256::from(2u8);
        let debt = ether(1) / U256::from(10u8);
        // 0.5 LP -> 0.5 base + 0.5 farming, the farming sold into 9.5:9.5
        let reserve = ether(19) / U256::from(2u8);
        let sold = get_amount_out(half, reserve, reserve, SwapFee::PANCAKE_V2).unwrap();
        // The floor applies to what is left after repaying the debt
        let floor = half + sold - debt;
        let call = |min_base: U256| {
            StrategyCall::PartialCloseLiquidate {
                max_lp: half,
                max_debt_repayment: debt,
                min_base,
            }
            .encode()
        };

        let mut over = chain.clone();
        let err = strategy
            .execute(&mut over, worker, tokens, Address::ZERO, debt, &call(floor + U256::from(1u8)))
            .unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientBaseReceived);

        let mut exact = chain;
        strategy
            .execute(&mut exact, worker, tokens, Address::ZERO, debt, &call(floor))
            .unwrap();
        assert_eq!(exact.balance_of(tokens.base, worker), half + sold);
        assert_eq!(exact.balance_of(tokens.lp, worker), half);
    }
}
