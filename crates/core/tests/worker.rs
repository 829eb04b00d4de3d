mod setup;

use alloy::primitives::U256;
use farmvault_chain::u256_math::{bps, ether};
use farmvault_chain::Emission;
use farmvault_core::{ProtocolError, State};
use setup::market;

#[test]
fn test_worker_and_vault_whitelists_both_apply() {
    let m = market();
    let (owner, add) = (m.d.owner, m.d.strategies.add_base_token_only);

    m.ledger
        .transact(|s| s.worker_mut(&m.d.worker)?.set_strategy_ok(owner, &[add], false))
        .unwrap();
    let err = m.open(m.bob, ether(1), ether(1)).unwrap_err();
    assert_eq!(err, ProtocolError::UnapprovedWorkStrategy);
    let err = m.open(m.bob, ether(1), U256::ZERO).unwrap_err();
    assert_eq!(err, ProtocolError::UnapprovedWorkStrategy);

    m.ledger
        .transact(|s| {
            s.worker_mut(&m.d.worker)?.set_strategy_ok(owner, &[add], true)?;
            s.vault_mut(&m.d.vault)?.set_approved_add_strategies(owner, &[add], false)
        })
        .unwrap();
    let err = m.open(m.bob, ether(1), ether(1)).unwrap_err();
    assert_eq!(err, ProtocolError::UnapprovedAddStrategy);
    // Unleveraged positions only need the worker's approval
    m.open(m.bob, ether(1), U256::ZERO).unwrap();
}

#[test]
fn test_strategy_rejects_unknown_worker() {
    let m = market();
    let add = m.d.strategies.add_base_token_only;
    m.ledger
        .transact(|s| {
            if let Some(strategy) = s.strategies.get_mut(&add) {
                strategy.set_workers_ok(&[m.d.worker], false);
            }
            Ok(())
        })
        .unwrap();
    let err = m.open(m.bob, ether(1), ether(1)).unwrap_err();
    assert_eq!(err, ProtocolError::NotWhitelistedWorker);
}

#[test]
fn test_contract_callers_need_whitelist() {
    let m = market();
    let contract = m.ledger.transact(|s| Ok(s.chain.deploy_contract())).unwrap();
    m.d.fund(&m.ledger, contract, ether(1)).unwrap();

    let err = m.open(contract, ether(1), ether(1)).unwrap_err();
    assert_eq!(err, ProtocolError::NotWhitelistedCaller);

    let owner = m.d.owner;
    m.ledger
        .transact(|s| s.vault_mut(&m.d.vault)?.set_whitelisted_callers(owner, &[contract], true))
        .unwrap();
    m.open(contract, ether(1), ether(1)).unwrap();
}

#[test]
fn test_reinvest_does_not_dilute() {
    let m = market();
    let first = m.open(m.bob, ether(1), ether(1)).unwrap();
    let second = m.open(m.carol, ether(2), ether(1)).unwrap();
    let shares = (m.worker_share(first), m.worker_share(second));
    let health = (m.health(first), m.health(second));

    m.ledger.advance_time(60);
    let pending = m
        .ledger
        .view(|s| s.worker(&m.d.worker).unwrap().pending_reward(&s.chain).unwrap());
    assert!(!pending.is_zero());

    let err = m.ledger.reinvest(m.d.worker, m.bob).unwrap_err();
    assert_eq!(err, ProtocolError::NotReinvestor);

    let bounty = m.ledger.reinvest(m.d.worker, m.d.keeper).unwrap();
    assert_eq!(bounty, bps(pending, 100).unwrap());
    assert_eq!(m.ledger.balance_of(m.d.reward, m.d.keeper), bounty);

    assert_eq!((m.worker_share(first), m.worker_share(second)), shares);
    assert!(m.health(first) > health.0);
    assert!(m.health(second) > health.1);
    m.assert_conserved();

    // Nothing left to harvest in the same second
    assert_eq!(m.ledger.reinvest(m.d.worker, m.d.keeper).unwrap(), U256::ZERO);
}

#[test]
fn test_migrated_worker_keeps_positions() {
    let m = market();
    let id = m.open(m.bob, ether(1), ether(1)).unwrap();
    let health = m.health(id);
    let (owner, worker, reward, lp) = (m.d.owner, m.d.worker, m.d.reward, m.d.lp);

    let (new_farm, pid) = m
        .ledger
        .transact(|s| {
            let farm = s.chain.create_farm(reward, ether(1), Emission::PerSecond)?;
            let pid = s.chain.add_farm_pool(farm, lp, 1000)?;
            let State { chain, workers, .. } = s;
            let worker = workers
                .get_mut(&worker)
                .ok_or(ProtocolError::UnknownWorker(worker))?;
            worker.migrate_farm(chain, owner, farm, pid)?;
            Ok((farm, pid))
        })
        .unwrap();

    m.ledger.view(|s| {
        let w = s.worker(&worker).unwrap();
        assert!(w.is_migrated());
        assert_eq!(w.farm, new_farm);
        assert_eq!(s.chain.farm_staked(m.d.farm, m.d.pid, worker).unwrap(), U256::ZERO);
        assert_eq!(s.chain.farm_staked(new_farm, pid, worker).unwrap(), w.total_balance(&s.chain).unwrap());
    });
    assert_eq!(m.health(id), health);

    let err = m
        .ledger
        .transact(|s| {
            let State { chain, workers, .. } = s;
            let worker = workers
                .get_mut(&worker)
                .ok_or(ProtocolError::UnknownWorker(worker))?;
            worker.migrate_farm(chain, owner, new_farm, pid)
        })
        .unwrap_err();
    assert_eq!(err, ProtocolError::AlreadyMigrated);

    m.ledger.advance_time(60);
    assert!(m.ledger.reinvest(worker, m.d.keeper).unwrap() > U256::ZERO);
    m.close(m.bob, id).unwrap();
    assert_eq!(m.debt(id), U256::ZERO);
}
