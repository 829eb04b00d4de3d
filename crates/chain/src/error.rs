//! Errors raised by the host-ledger collaborators.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Coarse error category shared by every crate in the workspace.
///
/// Display strings may change; the kind of a failure must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller is not allowed to perform the action.
    Authorization,
    /// A protocol rule (factor, whitelist, minimum size) was violated.
    Policy,
    /// Not enough tokens, liquidity or output.
    Liquidity,
    /// Overflow, underflow or division by zero.
    Arithmetic,
    /// Price data older than the accepted age or out of range.
    Staleness,
    /// Terminal state errors (double migration, wrong pool).
    State,
    /// Malformed input payloads or unknown identifiers.
    Data,
}

/// Failure of a token, pair, farm or oracle operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("math: overflow")]
    Overflow,
    #[error("math: underflow")]
    Underflow,
    #[error("math: division by zero")]
    DivisionByZero,

    #[error("token: unknown token {0}")]
    UnknownToken(Address),
    #[error("token: token {0} already registered")]
    TokenExists(Address),
    #[error("token: insufficient balance of {token} for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: U256,
        available: U256,
    },

    #[error("pair: identical addresses")]
    IdenticalAddresses,
    #[error("pair: pair already exists")]
    PairExists,
    #[error("pair: no pair for {0} / {1}")]
    UnknownPair(Address, Address),
    #[error("pair: insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    #[error("pair: insufficient liquidity burned")]
    InsufficientLiquidityBurned,
    #[error("pair: insufficient liquidity")]
    InsufficientLiquidity,
    #[error("pair: insufficient input amount")]
    InsufficientInputAmount,
    #[error("router: insufficient output amount")]
    InsufficientOutputAmount,
    #[error("router: excessive input amount")]
    ExcessiveInputAmount,
    #[error("router: insufficient {0} amount")]
    InsufficientAmount(&'static str),
    #[error("router: invalid path")]
    InvalidPath,
    #[error("pair: bad reserve values")]
    BadReserves,

    #[error("farm: unknown farm {0}")]
    UnknownFarm(Address),
    #[error("farm: unknown pool {0}")]
    UnknownFarmPool(usize),
    #[error("farm: withdraw not good")]
    WithdrawExceedsStake,

    #[error("oracle: not feeder")]
    NotFeeder,
    #[error("oracle: bad price data")]
    NoPrice,
}

impl ChainError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overflow | Self::Underflow | Self::DivisionByZero | Self::BadReserves => {
                ErrorKind::Arithmetic
            }
            Self::InsufficientBalance { .. }
            | Self::InsufficientLiquidityMinted
            | Self::InsufficientLiquidityBurned
            | Self::InsufficientLiquidity
            | Self::InsufficientInputAmount
            | Self::InsufficientOutputAmount
            | Self::ExcessiveInputAmount
            | Self::InsufficientAmount(_)
            | Self::WithdrawExceedsStake => ErrorKind::Liquidity,
            Self::NotFeeder => ErrorKind::Authorization,
            Self::NoPrice => ErrorKind::Staleness,
            Self::UnknownToken(_)
            | Self::TokenExists(_)
            | Self::IdenticalAddresses
            | Self::PairExists
            | Self::UnknownPair(..)
            | Self::InvalidPath
            | Self::UnknownFarm(_)
            | Self::UnknownFarmPool(_) => ErrorKind::Data,
        }
    }
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;
