mod setup;

use alloy::primitives::U256;
use farmvault_chain::u256_math::{bps, ether};
use setup::market;

const DAY: u64 = 86_400;

#[test]
fn test_lender_borrower_reinvestor_lifecycle() {
    let m = market();
    let id = m.open(m.bob, ether(1), ether(1)).unwrap();
    let opened_health = m.health(id);

    // One day of farming, the worker is the only staker
    m.ledger.advance_time(DAY);
    let rate = m
        .ledger
        .view(|s| s.chain.farm(&m.d.farm).unwrap().reward_per_unit);
    let emitted = rate * U256::from(DAY);
    let bounty = m.ledger.reinvest(m.d.worker, m.d.keeper).unwrap();
    let expected = bps(emitted, 100).unwrap();
    // Accumulator precision loses a few wei at most
    assert!(bounty <= expected);
    assert!(expected - bounty < U256::from(1_000_000_000u64));
    assert_eq!(m.ledger.balance_of(m.d.reward, m.d.keeper), bounty);
    assert!(m.health(id) > opened_health);

    // Thirty more days of interest on the 1 base loan
    m.ledger.advance_time(30 * DAY);
    let interest = m.ledger.view(|s| {
        s.vault(&m.d.vault)
            .unwrap()
            .pending_interest(&s.chain, U256::ZERO)
            .unwrap()
    });
    assert!(!interest.is_zero());
    let before = m.ledger.total_token(m.d.vault).unwrap();

    m.close(m.bob, id).unwrap();
    assert_eq!(m.debt(id), U256::ZERO);
    m.assert_conserved();

    let reserve = m.ledger.view(|s| s.vault(&m.d.vault).unwrap().reserve_pool());
    assert_eq!(reserve, interest / U256::from(10u8));
    let total = m.ledger.total_token(m.d.vault).unwrap();
    assert_eq!(total, ether(10) + interest - reserve);
    assert!(total > before);

    // Sole lender takes everything but the reserve
    let paid = m.ledger.withdraw(m.d.vault, m.alice, ether(10)).unwrap();
    assert_eq!(paid, total);
    assert_eq!(m.ledger.total_token(m.d.vault).unwrap(), U256::ZERO);
}
