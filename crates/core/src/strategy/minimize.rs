//! Strategies that unwind LP while trading as little farming token as possible.
//!
//! Only the base-token shortfall against the debt to repay is bought, sized
//! with the AMM's exact-output formula; the rest of the farming leg goes to
//! the user untouched.

use alloy::primitives::U256;
use farmvault_chain::u256_math;
use tracing::debug;

use super::Exec;
use crate::error::{ProtocolError, Result};

/// Remove all LP and buy just enough base token to cover the full debt.
pub(super) fn withdraw_minimize_trading(exec: &mut Exec<'_>, min_farming: U256) -> Result<()> {
    let lp = exec.balance(exec.tokens.lp);
    exec.remove_liquidity(lp)?;
    let debt = exec.debt;
    cover_shortfall(exec, debt)?;
    settle(exec, min_farming)
}

/// Remove `max_lp` LP (more than escrowed is an error) and buy just enough
/// base token to cover `min(max_debt_repayment, debt)`.
pub(super) fn partial_close(
    exec: &mut Exec<'_>,
    max_lp: U256,
    max_debt_repayment: U256,
    min_farming: U256,
) -> Result<()> {
    let held = exec.balance(exec.tokens.lp);
    if max_lp > held {
        return Err(ProtocolError::InsufficientLpAmount);
    }
    exec.remove_liquidity(max_lp)?;
    let less_debt = u256_math::min(max_debt_repayment, exec.debt);
    cover_shortfall(exec, less_debt)?;
    settle(exec, min_farming)
}

fn cover_shortfall(exec: &mut Exec<'_>, target: U256) -> Result<()> {
    let base = exec.balance(exec.tokens.base);
    if target > base {
        let shortfall = target - base;
        debug!(shortfall = %shortfall, "Buying base token shortfall");
        exec.buy_base_with_farming(shortfall)?;
    }
    Ok(())
}

fn settle(exec: &mut Exec<'_>, min_farming: U256) -> Result<()> {
    let farming = exec.balance(exec.tokens.farming);
    if farming < min_farming {
        return Err(ProtocolError::InsufficientFarmingReceived);
    }
    exec.return_to_worker()?;
    exec.return_farming_to_user()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{Strategy, StrategyCall, StrategyKind, WorkerTokens};
    use crate::error::ProtocolError;
    use alloy::primitives::{Address, U256};
    use farmvault_chain::amm::get_amount_in;
    use farmvault_chain::u256_math::ether;
    use farmvault_chain::{Chain, ChainError, SwapFee};

    fn setup(kind: StrategyKind) -> (Chain, WorkerTokens, Strategy, Address, Address) {
        let mut chain = Chain::default();
        let base = chain.create_token("BTOKEN", 18).unwrap();
        let farming = chain.create_token("FTOKEN", 18).unwrap();
        let lp = chain.create_pair(base, farming).unwrap();
        let provider = chain.new_account();
        chain
            .seed_liquidity(provider, base, farming, ether(10), ether(10))
            .unwrap();
        let worker = chain.deploy_contract();
        let user = chain.new_account();
        let mut strategy = Strategy::new(chain.deploy_contract(), kind);
        strategy.set_workers_ok(&[worker], true);
        chain.transfer(lp, provider, strategy.address, ether(1)).unwrap();
        (chain, WorkerTokens { base, farming, lp }, strategy, worker, user)
    }

    #[test]
    fn test_buys_exactly_the_shortfall() {
        let (mut chain, tokens, strategy, worker, user) = setup(StrategyKind::WithdrawMinimizeTrading);
        // 1 LP -> 1 base + 1 farming out of a 9:9 pool; debt 1.5 needs 0.5 more base
        let debt = ether(3) / U256::from(2u8);
        let spent = get_amount_in(ether(1) / U256::from(2u8), ether(9), ether(9), SwapFee::PANCAKE_V2).unwrap();

        let payload = StrategyCall::WithdrawMinimizeTrading { min_farming: U256::ZERO }.encode();
        strategy
            .execute(&mut chain, worker, tokens, user, debt, &payload)
            .unwrap();

        assert_eq!(chain.balance_of(tokens.base, worker), debt);
        assert_eq!(chain.balance_of(tokens.farming, user), ether(1) - spent);
    }

    #[test]
    fn test_min_farming_floor() {
        let (mut chain, tokens, strategy, worker, user) = setup(StrategyKind::WithdrawMinimizeTrading);
        // No debt: the whole farming leg goes to the user
        let payload = StrategyCall::WithdrawMinimizeTrading {
            min_farming: ether(1) + U256::from(1u8),
        }
        .encode();
        let err = strategy
            .execute(&mut chain, worker, tokens, user, U256::ZERO, &payload)
            .unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientFarmingReceived);
    }

    #[test]
    fn test_debt_beyond_position_is_excessive_input() {
        let (mut chain, tokens, strategy, worker, user) = setup(StrategyKind::WithdrawMinimizeTrading);
        let payload = StrategyCall::WithdrawMinimizeTrading { min_farming: U256::ZERO }.encode();
        let err = strategy
            .execute(&mut chain, worker, tokens, user, ether(5), &payload)
            .unwrap_err();
        assert_eq!(err, ProtocolError::Chain(ChainError::ExcessiveInputAmount));
    }

    #[test]
    fn test_partial_close_keeps_remaining_lp() {
        let (mut chain, tokens, strategy, worker, user) =
            setup(StrategyKind::PartialCloseMinimizeTrading);
        let quarter = ether(1) / U256::from(4u8);
        let payload = StrategyCall::PartialCloseMinimizeTrading {
            max_lp: quarter,
            max_debt_repayment: quarter,
            min_farming: U256::ZERO,
        }
        .encode();
        strategy
            .execute(&mut chain, worker, tokens, user, ether(1), &payload)
            .unwrap();

        // 0.25 LP already yields 0.25 base, so nothing is traded
        assert_eq!(chain.balance_of(tokens.base, worker), quarter);
        assert_eq!(chain.balance_of(tokens.farming, user), quarter);
        assert_eq!(chain.balance_of(tokens.lp, worker), ether(1) - quarter);
    }

    #[test]
    fn test_partial_close_min_farming_floor() {
        let (chain, tokens, strategy, worker, user) =
            setup(StrategyKind::PartialCloseMinimizeTrading);
        let half = ether(1) / U256::from(2u8);
        // 0.5 LP -> 0.5 base + 0.5 farming out of a 9.5:9.5 pool; repaying
        // 0.75 buys the 0.25 shortfall with farming token
        let repay = ether(3) / U256::from(4u8);
        let reserve = ether(19) / U256::from(2u8);
        let spent = get_amount_in(ether(1) / U256::from(4u8), reserve, reserve, SwapFee::PANCAKE_V2).unwrap();
        let kept = half - spent;
        let call = |min_farming: U256| {
            StrategyCall::PartialCloseMinimizeTrading {
                max_lp: half,
                max_debt_repayment: repay,
                min_farming,
            }
            .encode()
        };

        let mut over = chain.clone();
        let err = strategy
            .execute(&mut over, worker, tokens, user, ether(1), &call(kept + U256::from(1u8)))
            .unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientFarmingReceived);

        let mut exact = chain;
        strategy
            .execute(&mut exact, worker, tokens, user, ether(1), &call(kept))
            .unwrap();
        assert_eq!(exact.balance_of(tokens.farming, user), kept);
        assert_eq!(exact.balance_of(tokens.base, worker), repay);
        assert_eq!(exact.balance_of(tokens.lp, worker), half);
    }
}
