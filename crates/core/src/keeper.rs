//! Off-ledger keeper: kills positions past their kill factor and compounds
//! worker rewards.
//!
//! Every scan refreshes a concurrent cache of position risk, then acts on
//! it through ordinary ledger calls. A failed kill is logged and retried on
//! the next tick.

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use farmvault_chain::u256_math::{self, MAX_BPS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::KeeperParams;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::vault::within_factor;

/// Cached view of one open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedPosition {
    pub id: u64,
    pub worker: Address,
    pub health: U256,
    /// Debt including interest not yet accrued
    pub debt: U256,
    /// `debt / health` in basis points, rounded down. Only orders the
    /// kill queue; `u64::MAX` when health is zero.
    pub risk_bps: u64,
    pub kill_factor: u64,
}

impl TrackedPosition {
    /// Same comparison the vault makes on kill. A product overflow is not
    /// killable, as the vault would revert on it.
    pub fn is_killable(&self) -> bool {
        !self.debt.is_zero()
            && within_factor(self.health, self.kill_factor, self.debt).is_ok_and(|within| !within)
    }
}

fn risk_bps(debt: U256, health: U256) -> u64 {
    if health.is_zero() {
        return if debt.is_zero() { 0 } else { u64::MAX };
    }
    u256_math::mul_div(debt, U256::from(MAX_BPS), health)
        .ok()
        .and_then(|r| u64::try_from(r).ok())
        .unwrap_or(u64::MAX)
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeeperReport {
    pub scanned: usize,
    pub killed: Vec<u64>,
    pub failed_kills: usize,
    /// Bounty earned per reinvested worker
    pub reinvested: Vec<(Address, U256)>,
}

pub struct Keeper {
    ledger: Arc<Ledger>,
    vault: Address,
    /// Whitelisted liquidator and reinvestor account
    account: Address,
    interval: Duration,
    reinvest_min_reward: U256,
    positions: DashMap<u64, TrackedPosition>,
}

impl Keeper {
    pub fn new(ledger: Arc<Ledger>, vault: Address, account: Address, params: &KeeperParams) -> Self {
        Self {
            ledger,
            vault,
            account,
            interval: Duration::from_millis(params.interval_ms),
            reinvest_min_reward: u256_math::f64_to_wad(params.reinvest_min_reward),
            positions: DashMap::new(),
        }
    }

    pub fn tracked(&self, id: u64) -> Option<TrackedPosition> {
        self.positions.get(&id).map(|p| *p)
    }

    pub fn tracked_count(&self) -> usize {
        self.positions.len()
    }

    /// Re-read every position with debt and return the killable ids,
    /// riskiest first.
    pub fn refresh(&self) -> Result<Vec<u64>> {
        let snapshot = self.ledger.view(|s| -> Result<Vec<TrackedPosition>> {
            let vault = s.vault(&self.vault)?;
            let mut tracked = Vec::new();
            for (id, position) in vault.positions() {
                if position.debt_share.is_zero() {
                    continue;
                }
                let worker = s.worker(&position.worker)?;
                let health = worker.health(&s.chain, id)?;
                let debt = vault.projected_debt_of(&s.chain, id)?;
                let kill_factor = vault.config.worker(&position.worker)?.kill_factor;
                tracked.push(TrackedPosition {
                    id,
                    worker: position.worker,
                    health,
                    debt,
                    risk_bps: risk_bps(debt, health),
                    kill_factor,
                });
            }
            Ok(tracked)
        })?;

        self.positions.clear();
        let mut killable: Vec<TrackedPosition> = Vec::new();
        for position in snapshot {
            if position.is_killable() {
                killable.push(position);
            }
            self.positions.insert(position.id, position);
        }
        killable.sort_by(|a, b| b.risk_bps.cmp(&a.risk_bps));
        Ok(killable.into_iter().map(|p| p.id).collect())
    }

    /// One full scan: kill what can be killed, then compound rewards.
    pub fn run_once(&self) -> Result<KeeperReport> {
        let killable = self.refresh()?;
        let mut report = KeeperReport {
            scanned: self.positions.len(),
            ..KeeperReport::default()
        };

        for id in killable {
            match self.ledger.kill(self.vault, self.account, id) {
                Ok(outcome) => {
                    info!(id, debt = %outcome.debt, prize = %outcome.prize, "Keeper killed position");
                    self.positions.remove(&id);
                    report.killed.push(id);
                }
                Err(e) => {
                    warn!(id, error = %e, "Keeper kill failed");
                    report.failed_kills += 1;
                }
            }
        }

        let workers = self.ledger.view(|s| -> Result<Vec<(Address, U256)>> {
            let vault = s.vault(&self.vault)?;
            let mut pending = Vec::new();
            for worker in vault.config.workers() {
                pending.push((*worker, s.worker(worker)?.pending_reward(&s.chain)?));
            }
            Ok(pending)
        })?;
        for (worker, pending) in workers {
            if pending < self.reinvest_min_reward {
                continue;
            }
            match self.ledger.reinvest(worker, self.account) {
                Ok(bounty) => report.reinvested.push((worker, bounty)),
                Err(e) => warn!(worker = %worker, error = %e, "Keeper reinvest failed"),
            }
        }

        debug!(
            scanned = report.scanned,
            killed = report.killed.len(),
            reinvested = report.reinvested.len(),
            "Keeper scan complete"
        );
        Ok(report)
    }

    /// Scan on every tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(vault = %self.vault, interval_ms = self.interval.as_millis() as u64, "Starting keeper loop");
        let mut ticker = interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once() {
                        warn!(error = %e, "Keeper scan failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Keeper loop stopped");
    }
}
