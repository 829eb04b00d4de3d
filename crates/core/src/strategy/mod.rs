//! Stateless strategy executors.
//!
//! A worker escrows LP and base token at the strategy address, then calls
//! [`Strategy::execute`]. Every strategy sends LP and base token back to the
//! worker and farming token to the user, so nothing is left behind at the
//! strategy address when it returns.

mod add;
mod liquidate;
mod minimize;
pub mod optimal;
mod payload;

pub use payload::{decode_work, encode_work, encode_work_raw, StrategyCall, StrategyKind};

use alloy::primitives::{Address, U256};
use farmvault_chain::Chain;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Token addresses of the worker a strategy runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTokens {
    pub base: Address,
    pub farming: Address,
    pub lp: Address,
}

/// A deployed strategy.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub address: Address,
    pub kind: StrategyKind,
    /// Workers allowed to call this strategy
    ok_workers: HashSet<Address>,
}

impl Strategy {
    pub fn new(address: Address, kind: StrategyKind) -> Self {
        Self {
            address,
            kind,
            ok_workers: HashSet::new(),
        }
    }

    pub fn set_workers_ok(&mut self, workers: &[Address], ok: bool) {
        for worker in workers {
            if ok {
                self.ok_workers.insert(*worker);
            } else {
                self.ok_workers.remove(worker);
            }
        }
    }

    pub fn is_worker_ok(&self, worker: &Address) -> bool {
        self.ok_workers.contains(worker)
    }

    /// Run this strategy for `worker` against funds already escrowed here.
    pub fn execute(
        &self,
        chain: &mut Chain,
        worker: Address,
        tokens: WorkerTokens,
        user: Address,
        debt: U256,
        payload: &[u8],
    ) -> Result<()> {
        if !self.is_worker_ok(&worker) {
            return Err(ProtocolError::NotWhitelistedWorker);
        }
        let call = self.kind.decode(payload)?;
        debug!(strategy = %self.address, kind = self.kind.name(), worker = %worker, user = %user, debt = %debt, "Executing strategy");

        let mut exec = Exec {
            chain,
            me: self.address,
            worker,
            tokens,
            user,
            debt,
        };
        match call {
            StrategyCall::AddBaseTokenOnly { min_lp } => add::add_base_token_only(&mut exec, min_lp),
            StrategyCall::AddTwoSidesOptimal {
                farming_amount,
                min_lp,
            } => add::add_two_sides_optimal(&mut exec, farming_amount, min_lp),
            StrategyCall::AddBaseWithFarm {
                farming_amount,
                min_lp,
            } => add::add_base_with_farm(&mut exec, farming_amount, min_lp),
            StrategyCall::Liquidate { min_base } => liquidate::liquidate(&mut exec, min_base),
            StrategyCall::PartialCloseLiquidate {
                max_lp,
                max_debt_repayment,
                min_base,
            } => liquidate::partial_close(&mut exec, max_lp, max_debt_repayment, min_base),
            StrategyCall::WithdrawMinimizeTrading { min_farming } => {
                minimize::withdraw_minimize_trading(&mut exec, min_farming)
            }
            StrategyCall::PartialCloseMinimizeTrading {
                max_lp,
                max_debt_repayment,
                min_farming,
            } => minimize::partial_close(&mut exec, max_lp, max_debt_repayment, min_farming),
        }
    }
}

/// One strategy invocation: the host plus who is calling for whom.
pub(crate) struct Exec<'a> {
    chain: &'a mut Chain,
    /// The strategy's own address (holds the escrowed funds)
    me: Address,
    worker: Address,
    tokens: WorkerTokens,
    user: Address,
    debt: U256,
}

impl Exec<'_> {
    fn balance(&self, token: Address) -> U256 {
        self.chain.balance_of(token, self.me)
    }

    fn reserves(&self) -> Result<(U256, U256)> {
        Ok(self
            .chain
            .amm
            .get_reserves(self.tokens.base, self.tokens.farming)?)
    }

    /// Pull `amount` of farming token from the user into escrow.
    fn pull_farming(&mut self, amount: U256) -> Result<()> {
        let (farming, user, me) = (self.tokens.farming, self.user, self.me);
        self.chain.transfer(farming, user, me, amount)?;
        Ok(())
    }

    fn swap_exact_in(&mut self, amount_in: U256, token_in: Address, token_out: Address) -> Result<U256> {
        if amount_in.is_zero() {
            return Ok(U256::ZERO);
        }
        let me = self.me;
        Ok(self
            .chain
            .swap_exact_in(me, amount_in, U256::ZERO, &[token_in, token_out], me)?)
    }

    /// Buy exactly `amount_out` base token with at most the farming balance.
    fn buy_base_with_farming(&mut self, amount_out: U256) -> Result<()> {
        let me = self.me;
        let max_in = self.balance(self.tokens.farming);
        let path = [self.tokens.farming, self.tokens.base];
        let Chain { amm, tokens, .. } = &mut *self.chain;
        amm.swap_tokens_for_exact_tokens(tokens, me, amount_out, max_in, &path, me)?;
        Ok(())
    }

    /// Add every escrowed base and farming token as liquidity, LP to escrow.
    fn add_all_liquidity(&mut self) -> Result<U256> {
        let me = self.me;
        let (base, farming) = (self.tokens.base, self.tokens.farming);
        let base_amount = self.balance(base);
        let farming_amount = self.balance(farming);
        let Chain { amm, tokens, .. } = &mut *self.chain;
        let (_, _, liquidity) = amm.add_liquidity(
            tokens,
            me,
            base,
            farming,
            base_amount,
            farming_amount,
            U256::ZERO,
            U256::ZERO,
            me,
        )?;
        Ok(liquidity)
    }

    /// Burn `lp` escrowed LP into base and farming token held in escrow.
    fn remove_liquidity(&mut self, lp: U256) -> Result<()> {
        if lp.is_zero() {
            return Ok(());
        }
        let me = self.me;
        let (base, farming) = (self.tokens.base, self.tokens.farming);
        let Chain { amm, tokens, .. } = &mut *self.chain;
        amm.remove_liquidity(tokens, me, base, farming, lp, U256::ZERO, U256::ZERO, me)?;
        Ok(())
    }

    fn send_all(&mut self, token: Address, to: Address) -> Result<U256> {
        let me = self.me;
        Ok(self.chain.tokens.transfer_all(token, me, to)?)
    }

    /// LP and base token back to the worker.
    fn return_to_worker(&mut self) -> Result<()> {
        let worker = self.worker;
        self.send_all(self.tokens.lp, worker)?;
        self.send_all(self.tokens.base, worker)?;
        Ok(())
    }

    /// Leftover farming token goes to the user, or to the worker when the
    /// call has no user (reinvest).
    fn return_farming_to_user(&mut self) -> Result<U256> {
        let to = if self.user.is_zero() { self.worker } else { self.user };
        self.send_all(self.tokens.farming, to)
    }
}
