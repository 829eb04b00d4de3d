//! Fungible token balances.
//!
//! Every token (base tokens, farming tokens, reward tokens, LP tokens and vault
//! share tokens) lives in one ledger keyed by `(token, account)`. Approvals
//! are not modeled: the calling contract is trusted to move what it owns.

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::trace;

use crate::error::{ChainError, Result};
use crate::u256_math;

/// Static token metadata plus the running supply.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

/// Balance book for all tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: HashMap<Address, TokenInfo>,
    balances: HashMap<(Address, Address), U256>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new token at `token`.
    pub fn register(&mut self, token: Address, symbol: impl Into<String>, decimals: u8) -> Result<()> {
        if self.tokens.contains_key(&token) {
            return Err(ChainError::TokenExists(token));
        }
        self.tokens.insert(
            token,
            TokenInfo {
                symbol: symbol.into(),
                decimals,
                total_supply: U256::ZERO,
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, token: &Address) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn info(&self, token: &Address) -> Result<&TokenInfo> {
        self.tokens.get(token).ok_or(ChainError::UnknownToken(*token))
    }

    pub fn symbol(&self, token: &Address) -> &str {
        self.tokens.get(token).map(|t| t.symbol.as_str()).unwrap_or("?")
    }

    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.tokens
            .get(&token)
            .map(|t| t.total_supply)
            .unwrap_or(U256::ZERO)
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        let info = self
            .tokens
            .get_mut(&token)
            .ok_or(ChainError::UnknownToken(token))?;
        info.total_supply = u256_math::add(info.total_supply, amount)?;
        let balance = self.balances.entry((token, to)).or_default();
        *balance = u256_math::add(*balance, amount)?;
        trace!(token = %token, to = %to, amount = %amount, "mint");
        Ok(())
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<()> {
        self.debit(token, from, amount)?;
        let info = self
            .tokens
            .get_mut(&token)
            .ok_or(ChainError::UnknownToken(token))?;
        info.total_supply = u256_math::sub(info.total_supply, amount)?;
        trace!(token = %token, from = %from, amount = %amount, "burn");
        Ok(())
    }

    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        if !self.tokens.contains_key(&token) {
            return Err(ChainError::UnknownToken(token));
        }
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.debit(token, from, amount)?;
        let balance = self.balances.entry((token, to)).or_default();
        *balance = u256_math::add(*balance, amount)?;
        trace!(token = %token, from = %from, to = %to, amount = %amount, "transfer");
        Ok(())
    }

    /// Move the whole balance of `from` and return the amount moved.
    pub fn transfer_all(&mut self, token: Address, from: Address, to: Address) -> Result<U256> {
        let amount = self.balance_of(token, from);
        self.transfer(token, from, to, amount)?;
        Ok(amount)
    }

    fn debit(&mut self, token: Address, account: Address, amount: U256) -> Result<()> {
        let available = self.balance_of(token, account);
        if available < amount {
            return Err(ChainError::InsufficientBalance {
                token,
                account,
                needed: amount,
                available,
            });
        }
        self.balances.insert((token, account), available - amount);
        Ok(())
    }
}
