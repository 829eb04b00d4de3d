//! Host-ledger layer for the farm vault protocol.
//!
//! This crate provides:
//! - Token balances for base, farming, reward, LP and share tokens
//! - Constant-product pairs with a factory-wide swap fee and router helpers
//! - MasterChef-style staking farms (per-second or per-block emission)
//! - A feeder-driven price oracle
//! - A block clock and deterministic address allocation
//!
//! The whole host is a plain value ([`Chain`]) so callers can clone it,
//! mutate the copy and commit only when a call succeeds.

pub mod amm;
mod clock;
mod error;
pub mod farm;
mod host;
pub mod oracle;
mod token;
pub mod u256_math;

pub use amm::{Amm, Amounts, Pair, SwapFee};
pub use clock::{Clock, DEFAULT_BLOCK_TIME_SECS, GENESIS_TIMESTAMP};
pub use error::{ChainError, ErrorKind, Result};
pub use farm::{Emission, Farm, PoolInfo, UserInfo};
pub use host::Chain;
pub use oracle::{PriceData, PriceOracle, PriceSource, SimplePriceOracle};
pub use token::{TokenInfo, TokenLedger};
