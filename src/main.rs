//! Farm vault simulator
//!
//! Bootstraps a market on the in-process ledger and walks one leveraged
//! position through its life:
//! - Lender deposit and leveraged open
//! - Farming time and a keeper reinvest
//! - Interest accrual
//! - Price shock and keeper liquidation

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use farmvault_chain::u256_math::{f64_to_wad, wad_to_f64};
use farmvault_core::{encode_work, Deployment, DeploymentConfig, Keeper, Ledger, StrategyCall, WorkRequest};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // LOG_FORMAT=json switches to one JSON object per event
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,farmvault_core=debug"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // DEPLOYMENT selects config/deployments/<name>.toml; unset runs the testing fixture
    let config = DeploymentConfig::load_from_env()?;
    config.protocol.log_config();

    let (ledger, d) = Deployment::bootstrap(&config).context("bootstrap failed")?;
    let ledger = Arc::new(ledger);
    info!(deployment = %config.deployment.name, "Starting simulation");

    let scenario = &config.scenario;
    let lender = d.new_account(&ledger)?;
    let farmer = d.new_account(&ledger)?;
    let deposit = f64_to_wad(scenario.deposit);
    let principal = f64_to_wad(scenario.principal);
    d.fund(&ledger, lender, deposit)?;
    d.fund(&ledger, farmer, principal)?;

    let shares = ledger.deposit(d.vault, lender, deposit)?;
    info!(lender = %lender, deposit = scenario.deposit, shares = wad_to_f64(shares), "Lender deposited");

    let request = WorkRequest {
        id: 0,
        worker: d.worker,
        principal,
        loan: f64_to_wad(scenario.loan),
        max_return: U256::ZERO,
        data: encode_work(
            d.strategies.add_base_token_only,
            &StrategyCall::AddBaseTokenOnly { min_lp: U256::ZERO },
        )
        .to_vec(),
    };
    let id = ledger.work(d.vault, farmer, &request)?;
    report(&ledger, &d, id, "Position opened")?;

    ledger.advance_time(scenario.farm_secs);
    match ledger.reinvest(d.worker, d.keeper) {
        Ok(bounty) => info!(bounty = wad_to_f64(bounty), "Rewards compounded"),
        Err(e) => warn!(error = %e, "Reinvest failed"),
    }
    report(&ledger, &d, id, "After reinvest")?;

    ledger.advance_time(scenario.accrual_secs);
    d.refresh_prices(&ledger)?;
    report(&ledger, &d, id, "After accrual")?;
    info!(total_token = wad_to_f64(ledger.total_token(d.vault)?), "Vault value");

    shock(&ledger, &d, f64_to_wad(scenario.shock_farming_sold))?;
    report(&ledger, &d, id, "After price shock")?;

    let keeper = Arc::new(Keeper::new(ledger.clone(), d.vault, d.keeper, &config.protocol.keeper));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn({
        let keeper = keeper.clone();
        async move { keeper.run(shutdown_rx).await }
    });
    let wait = Duration::from_millis(config.protocol.keeper.interval_ms.saturating_mul(3).max(100));
    tokio::time::sleep(wait).await;
    shutdown_tx.send(true).ok();
    handle.await.context("keeper task panicked")?;

    let (_, debt) = ledger.position_info(d.vault, id)?;
    if debt.is_zero() {
        info!(
            id,
            keeper_prize = wad_to_f64(ledger.balance_of(d.base, d.keeper)),
            farmer_balance = wad_to_f64(ledger.balance_of(d.base, farmer)),
            "Position liquidated by keeper"
        );
    } else {
        info!(id, "Position survived the shock");
    }
    info!(total_token = wad_to_f64(ledger.total_token(d.vault)?), "Simulation finished");
    Ok(())
}

fn report(ledger: &Ledger, d: &Deployment, id: u64, label: &str) -> Result<()> {
    let (health, debt) = ledger.view(|s| -> farmvault_core::Result<(U256, U256)> {
        let vault = s.vault(&d.vault)?;
        let worker = s.worker(&d.worker)?;
        Ok((worker.health(&s.chain, id)?, vault.projected_debt_of(&s.chain, id)?))
    })?;
    info!(id, health = wad_to_f64(health), debt = wad_to_f64(debt), "{label}");
    Ok(())
}

/// Sell freshly minted farming token into the pool, then let the oracle
/// feeder catch up.
fn shock(ledger: &Ledger, d: &Deployment, amount: U256) -> Result<()> {
    let received = ledger.transact(|s| {
        let dumper = s.chain.new_account();
        s.chain.mint(d.farming, dumper, amount)?;
        Ok(s.chain
            .swap_exact_in(dumper, amount, U256::ZERO, &[d.farming, d.base], dumper)?)
    })?;
    d.refresh_prices(ledger)?;
    info!(sold = wad_to_f64(amount), received = wad_to_f64(received), "Farming token dumped");
    Ok(())
}
