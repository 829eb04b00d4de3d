//! Position entry points: work, kill and add collateral.

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::{self, mul, MAX_BPS};
use farmvault_chain::Chain;
use tracing::{info, warn};

use super::Vault;
use crate::error::{ProtocolError, Result};
use crate::strategy::decode_work;
use crate::worker::{Strategies, Worker};

/// Arguments of a `work` call.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    /// 0 opens a new position
    pub id: u64,
    pub worker: Address,
    /// Base token the caller puts in
    pub principal: U256,
    /// Base token borrowed from the vault
    pub loan: U256,
    /// Most debt the caller wants repaid from what comes back
    pub max_return: U256,
    /// `(strategy, payload)` as encoded by `encode_work`
    pub data: Vec<u8>,
}

/// Result of a successful `kill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillOutcome {
    pub debt: U256,
    pub proceeds: U256,
    pub prize: U256,
    pub treasury_fee: U256,
    /// Paid back to the position owner
    pub left: U256,
}

/// `health * factor >= debt * 10000`
pub(crate) fn within_factor(health: U256, factor: u64, debt: U256) -> Result<bool> {
    Ok(mul(health, U256::from(factor))? >= mul(debt, U256::from(MAX_BPS))?)
}

impl Vault {
    /// Open or adjust a position through `worker`. Returns the position id.
    pub fn work(
        &mut self,
        chain: &mut Chain,
        worker: &mut Worker,
        strategies: &Strategies,
        caller: Address,
        request: &WorkRequest,
    ) -> Result<u64> {
        self.config.ensure_caller(chain, caller)?;
        self.accrue(chain)?;

        let id = if request.id == 0 {
            self.open_position(request.worker, caller)
        } else {
            let position = self.position(request.id)?;
            if position.worker != request.worker {
                return Err(ProtocolError::WrongWorker);
            }
            if position.owner != caller {
                return Err(ProtocolError::NotPositionOwner);
            }
            request.id
        };
        if worker.address != request.worker {
            return Err(ProtocolError::WrongWorker);
        }
        let worker_config = *self.config.worker(&request.worker)?;

        if !request.loan.is_zero() {
            if !worker_config.accept_debt(chain, worker)? {
                return Err(ProtocolError::NotAcceptingDebt);
            }
            if request.loan < self.config.min_debt_size {
                return Err(ProtocolError::TooSmallDebtSize);
            }
            let (strategy, _) = decode_work(&request.data)?;
            if !self.config.is_approved_add_strategy(&strategy) {
                return Err(ProtocolError::UnapprovedAddStrategy);
            }
        }

        chain.transfer(self.token, caller, self.address, request.principal)?;
        let debt = u256_math::add(self.remove_debt(id)?, request.loan)?;

        let send = u256_math::add(request.principal, request.loan)?;
        if send > self.cash(chain) {
            return Err(ProtocolError::InsufficientFunds);
        }
        chain.transfer(self.token, self.address, worker.address, send)?;

        let before = self.cash(chain);
        worker.work(chain, strategies, self.address, id, caller, debt, &request.data)?;
        let back = u256_math::sub(self.cash(chain), before)?;

        let less_debt = u256_math::min(debt, u256_math::min(back, request.max_return));
        let debt = u256_math::sub(debt, less_debt)?;
        if !debt.is_zero() {
            if debt < self.config.min_debt_size {
                return Err(ProtocolError::TooSmallDebtSize);
            }
            let health = worker.health(chain, id)?;
            let work_factor = worker_config.work_factor(chain, worker)?;
            if !within_factor(health, work_factor, debt)? {
                return Err(ProtocolError::BadWorkFactor);
            }
            self.add_debt(id, debt)?;
        }

        let refund = u256_math::sub(back, less_debt)?;
        if !refund.is_zero() {
            chain.transfer(self.token, self.address, caller, refund)?;
        }

        info!(
            vault = %self.address,
            id,
            worker = %worker.address,
            caller = %caller,
            principal = %request.principal,
            loan = %request.loan,
            debt = %debt,
            back = %back,
            "Work"
        );
        Ok(id)
    }

    /// Liquidate position `id` if its debt exceeds the worker's kill factor.
    pub fn kill(
        &mut self,
        chain: &mut Chain,
        worker: &mut Worker,
        strategies: &Strategies,
        caller: Address,
        id: u64,
    ) -> Result<KillOutcome> {
        self.accrue(chain)?;
        if !self.config.is_liquidator(&caller) {
            return Err(ProtocolError::NotLiquidator);
        }
        let position = *self.position(id)?;
        if position.worker != worker.address {
            return Err(ProtocolError::WrongWorker);
        }
        if position.debt_share.is_zero() {
            return Err(ProtocolError::NoDebt);
        }

        let debt = self.remove_debt(id)?;
        let health = worker.health(chain, id)?;
        let kill_factor = self.config.worker(&worker.address)?.kill_factor(chain, worker)?;
        if within_factor(health, kill_factor, debt)? {
            warn!(vault = %self.address, id, health = %health, debt = %debt, "Kill rejected");
            return Err(ProtocolError::CannotLiquidate);
        }

        let before = self.cash(chain);
        worker.liquidate(chain, strategies, self.address, id)?;
        let proceeds = u256_math::sub(self.cash(chain), before)?;

        let prize = u256_math::bps(proceeds, self.config.kill_bps)?;
        let treasury_fee = u256_math::bps(proceeds, self.config.kill_treasury_bps)?;
        let rest = u256_math::sub(u256_math::sub(proceeds, prize)?, treasury_fee)?;
        if !prize.is_zero() {
            chain.transfer(self.token, self.address, caller, prize)?;
        }
        if !treasury_fee.is_zero() {
            chain.transfer(self.token, self.address, self.config.treasury, treasury_fee)?;
        }
        let left = if rest > debt { rest - debt } else { U256::ZERO };
        if !left.is_zero() {
            chain.transfer(self.token, self.address, position.owner, left)?;
        }

        info!(
            vault = %self.address,
            id,
            killer = %caller,
            owner = %position.owner,
            debt = %debt,
            proceeds = %proceeds,
            prize = %prize,
            left = %left,
            "Kill"
        );
        Ok(KillOutcome {
            debt,
            proceeds,
            prize,
            treasury_fee,
            left,
        })
    }

    /// Add `amount` base token to position `id` through an approved add
    /// strategy, keeping its debt.
    ///
    /// With `go_rogue` the stability and kill-factor checks are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn add_collateral(
        &mut self,
        chain: &mut Chain,
        worker: &mut Worker,
        strategies: &Strategies,
        caller: Address,
        id: u64,
        amount: U256,
        go_rogue: bool,
        data: &[u8],
    ) -> Result<()> {
        self.config.ensure_caller(chain, caller)?;
        self.accrue(chain)?;

        let position = *self.position(id)?;
        if position.owner != caller {
            return Err(ProtocolError::NotPositionOwner);
        }
        if position.worker != worker.address {
            return Err(ProtocolError::WrongWorker);
        }
        if amount.is_zero() {
            return Err(ProtocolError::ZeroAmount);
        }

        let (strategy, _) = decode_work(data)?;
        let is_add = strategies.get(&strategy).is_some_and(|s| s.kind.is_add());
        if !is_add || !self.config.is_approved_add_strategy(&strategy) {
            return Err(ProtocolError::UnapprovedAddStrategy);
        }
        let worker_config = *self.config.worker(&worker.address)?;
        if !go_rogue {
            worker_config
                .ensure_stable(chain, worker)
                .map_err(|_| ProtocolError::Unstable)?;
        }

        chain.transfer(self.token, caller, self.address, amount)?;
        let before_share = worker.share_of(id);
        let debt = self.remove_debt(id)?;
        chain.transfer(self.token, self.address, worker.address, amount)?;

        let before = self.cash(chain);
        worker.work(chain, strategies, self.address, id, caller, debt, data)?;
        let back = u256_math::sub(self.cash(chain), before)?;

        if worker.share_of(id) <= before_share {
            return Err(ProtocolError::ShareDecreased);
        }
        if !go_rogue && !debt.is_zero() {
            let health = worker.health(chain, id)?;
            let kill_factor = worker_config.kill_factor(chain, worker)?;
            if !within_factor(health, kill_factor, debt)? {
                return Err(ProtocolError::Killable);
            }
        }
        if !debt.is_zero() {
            self.add_debt(id, debt)?;
        }
        if !back.is_zero() {
            chain.transfer(self.token, self.address, caller, back)?;
        }

        info!(
            vault = %self.address,
            id,
            caller = %caller,
            amount = %amount,
            go_rogue,
            share = %worker.share_of(id),
            "Add collateral"
        );
        Ok(())
    }

    /// Current `(health, debt)` of position `id`.
    pub fn position_info(&self, chain: &Chain, worker: &Worker, id: u64) -> Result<(U256, U256)> {
        let position = self.position(id)?;
        if position.worker != worker.address {
            return Err(ProtocolError::WrongWorker);
        }
        Ok((worker.health(chain, id)?, self.debt_share_to_val(position.debt_share)?))
    }
}
