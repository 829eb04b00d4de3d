//! Shared fixture: the testing market with one lender and two borrowers.
#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use farmvault_chain::u256_math::ether;
use farmvault_core::{
    encode_work, Deployment, DeploymentConfig, Ledger, ProtocolError, StrategyCall, WorkRequest,
};

pub struct Market {
    pub ledger: Ledger,
    pub d: Deployment,
    /// Lender with 10 base deposited
    pub alice: Address,
    /// Borrowers holding 5 base each
    pub bob: Address,
    pub carol: Address,
}

pub fn market() -> Market {
    let (ledger, d) = Deployment::bootstrap(&DeploymentConfig::testing()).unwrap();
    let alice = d.new_account(&ledger).unwrap();
    let bob = d.new_account(&ledger).unwrap();
    let carol = d.new_account(&ledger).unwrap();
    d.fund(&ledger, alice, ether(10)).unwrap();
    d.fund(&ledger, bob, ether(5)).unwrap();
    d.fund(&ledger, carol, ether(5)).unwrap();
    ledger.deposit(d.vault, alice, ether(10)).unwrap();
    Market {
        ledger,
        d,
        alice,
        bob,
        carol,
    }
}

/// `n / 100` ether.
pub fn cents(n: u64) -> U256 {
    ether(n) / U256::from(100u8)
}

impl Market {
    pub fn payload(&self, call: StrategyCall) -> Vec<u8> {
        encode_work(self.d.strategies.of(call.kind()), &call).to_vec()
    }

    pub fn add_base_only(&self) -> Vec<u8> {
        self.payload(StrategyCall::AddBaseTokenOnly { min_lp: U256::ZERO })
    }

    pub fn liquidate_all(&self) -> Vec<u8> {
        self.payload(StrategyCall::Liquidate { min_base: U256::ZERO })
    }

    pub fn work(
        &self,
        who: Address,
        id: u64,
        principal: U256,
        loan: U256,
        max_return: U256,
        data: Vec<u8>,
    ) -> Result<u64, ProtocolError> {
        let request = WorkRequest {
            id,
            worker: self.d.worker,
            principal,
            loan,
            max_return,
            data,
        };
        self.ledger.work(self.d.vault, who, &request)
    }

    /// New position zapping `principal + loan` base into LP.
    pub fn open(&self, who: Address, principal: U256, loan: U256) -> Result<u64, ProtocolError> {
        self.work(who, 0, principal, loan, U256::ZERO, self.add_base_only())
    }

    /// Sell the whole position and repay all debt.
    pub fn close(&self, who: Address, id: u64) -> Result<u64, ProtocolError> {
        self.work(who, id, U256::ZERO, U256::ZERO, U256::MAX, self.liquidate_all())
    }

    /// Sell `amount` freshly minted farming token into the pool without
    /// touching the oracle.
    pub fn dump_farming(&self, amount: U256) {
        let (farming, base) = (self.d.farming, self.d.base);
        self.ledger
            .transact(|s| {
                let dumper = s.chain.new_account();
                s.chain.mint(farming, dumper, amount)?;
                s.chain.swap_exact_in(dumper, amount, U256::ZERO, &[farming, base], dumper)?;
                Ok(())
            })
            .unwrap();
    }

    pub fn refresh_prices(&self) {
        self.d.refresh_prices(&self.ledger).unwrap();
    }

    pub fn health(&self, id: u64) -> U256 {
        self.ledger.position_info(self.d.vault, id).unwrap().0
    }

    pub fn debt(&self, id: u64) -> U256 {
        self.ledger.position_info(self.d.vault, id).unwrap().1
    }

    pub fn worker_share(&self, id: u64) -> U256 {
        self.ledger.view(|s| s.worker(&self.d.worker).unwrap().share_of(id))
    }

    /// LP currently backing position `id`.
    pub fn position_lp(&self, id: u64) -> U256 {
        self.ledger.view(|s| {
            let worker = s.worker(&self.d.worker).unwrap();
            worker.share_to_balance(&s.chain, worker.share_of(id)).unwrap()
        })
    }

    pub fn base_of(&self, who: Address) -> U256 {
        self.ledger.balance_of(self.d.base, who)
    }

    /// Debt shares and worker shares both add up to their totals.
    pub fn assert_conserved(&self) {
        self.ledger.view(|s| {
            let vault = s.vault(&self.d.vault).unwrap();
            assert_eq!(vault.sum_of_debt_shares(), vault.vault_debt_share());
            let worker = s.worker(&self.d.worker).unwrap();
            assert_eq!(worker.sum_of_shares(), worker.total_share());
        });
    }
}
