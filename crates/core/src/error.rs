//! Errors raised by the vault, worker and strategies.

use alloy::primitives::Address;
use farmvault_chain::{ChainError, ErrorKind};
use thiserror::Error;

/// Failure of a protocol entry point. Any error aborts the whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    // Authorization
    #[error("{0}: not owner")]
    NotOwner(&'static str),
    #[error("vault: not position owner")]
    NotPositionOwner,
    #[error("vault: not eoa or whitelisted caller")]
    NotWhitelistedCaller,
    #[error("vault: not whitelisted liquidator")]
    NotLiquidator,
    #[error("worker: not operator")]
    NotOperator,
    #[error("worker: not reinvestor")]
    NotReinvestor,
    #[error("strategy: not whitelisted worker")]
    NotWhitelistedWorker,

    // Policy
    #[error("vault: too small debt size")]
    TooSmallDebtSize,
    #[error("vault: bad work factor")]
    BadWorkFactor,
    #[error("vault: can't liquidate")]
    CannotLiquidate,
    #[error("vault: no debt")]
    NoDebt,
    #[error("vault: not a worker")]
    NotWorker,
    #[error("vault: bad position worker")]
    WrongWorker,
    #[error("vault: worker not accepting more debt")]
    NotAcceptingDebt,
    #[error("vault: unapproved add strategy")]
    UnapprovedAddStrategy,
    #[error("vault: position would be killable")]
    Killable,
    #[error("vault: position share not increased")]
    ShareDecreased,
    #[error("vault: no tiny shares")]
    TinyShares,
    #[error("worker: unapproved work strategy")]
    UnapprovedWorkStrategy,
    #[error("worker: strategy left a residual balance")]
    StrategyResidual,
    #[error("worker: reinvest bounty exceeds max")]
    BountyTooHigh,
    #[error("worker: max reinvest bounty {0} out of range")]
    BadMaxBounty(u64),
    #[error("config: {0}")]
    BadParam(&'static str),

    // Liquidity
    #[error("vault: insufficient funds in the vault")]
    InsufficientFunds,
    #[error("vault: not enough reserve")]
    InsufficientReserve,
    #[error("strategy: insufficient LP tokens received")]
    InsufficientLpReceived,
    #[error("strategy: insufficient LP amount received")]
    InsufficientLpAmount,
    #[error("strategy: insufficient baseToken received")]
    InsufficientBaseReceived,
    #[error("strategy: insufficient farming tokens received")]
    InsufficientFarmingReceived,

    // Staleness
    #[error("worker config: price too stale")]
    PriceTooStale,
    #[error("worker config: price too high")]
    PriceTooHigh,
    #[error("worker config: price too low")]
    PriceTooLow,
    #[error("worker config: bad {0} balance")]
    ReserveImbalance(&'static str),
    #[error("worker config: worker not stable")]
    Unstable,

    // State
    #[error("worker: already migrated")]
    AlreadyMigrated,
    #[error("worker: bad pool id")]
    BadPoolId,

    // Data
    #[error("vault: bad position id {0}")]
    UnknownPosition(u64),
    #[error("unknown vault {0}")]
    UnknownVault(Address),
    #[error("unknown worker {0}")]
    UnknownWorker(Address),
    #[error("unknown strategy {0}")]
    UnknownStrategy(Address),
    #[error("vault: zero amount")]
    ZeroAmount,
    #[error("strategy: malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl ProtocolError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotOwner(_)
            | Self::NotPositionOwner
            | Self::NotWhitelistedCaller
            | Self::NotLiquidator
            | Self::NotOperator
            | Self::NotReinvestor
            | Self::NotWhitelistedWorker => ErrorKind::Authorization,

            Self::TooSmallDebtSize
            | Self::BadWorkFactor
            | Self::CannotLiquidate
            | Self::NoDebt
            | Self::NotWorker
            | Self::WrongWorker
            | Self::NotAcceptingDebt
            | Self::UnapprovedAddStrategy
            | Self::Killable
            | Self::ShareDecreased
            | Self::TinyShares
            | Self::UnapprovedWorkStrategy
            | Self::StrategyResidual
            | Self::BountyTooHigh
            | Self::BadMaxBounty(_)
            | Self::BadParam(_) => ErrorKind::Policy,

            Self::InsufficientFunds
            | Self::InsufficientReserve
            | Self::InsufficientLpReceived
            | Self::InsufficientLpAmount
            | Self::InsufficientBaseReceived
            | Self::InsufficientFarmingReceived => ErrorKind::Liquidity,

            Self::PriceTooStale
            | Self::PriceTooHigh
            | Self::PriceTooLow
            | Self::ReserveImbalance(_)
            | Self::Unstable => ErrorKind::Staleness,

            Self::AlreadyMigrated | Self::BadPoolId => ErrorKind::State,

            Self::UnknownPosition(_)
            | Self::UnknownVault(_)
            | Self::UnknownWorker(_)
            | Self::UnknownStrategy(_)
            | Self::ZeroAmount
            | Self::MalformedPayload(_) => ErrorKind::Data,

            Self::Chain(inner) => inner.kind(),
        }
    }
}

impl From<alloy::sol_types::Error> for ProtocolError {
    fn from(err: alloy::sol_types::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_errors_keep_their_kind() {
        let err: ProtocolError = ChainError::ExcessiveInputAmount.into();
        assert_eq!(err.kind(), ErrorKind::Liquidity);
        assert_eq!(err.to_string(), "router: excessive input amount");

        let err: ProtocolError = ChainError::Underflow.into();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(ProtocolError::CannotLiquidate.to_string(), "vault: can't liquidate");
        assert_eq!(ProtocolError::NotOperator.to_string(), "worker: not operator");
        assert_eq!(ProtocolError::NotOwner("worker").to_string(), "worker: not owner");
        assert_eq!(ProtocolError::AlreadyMigrated.kind(), ErrorKind::State);
        assert_eq!(ProtocolError::PriceTooStale.kind(), ErrorKind::Staleness);
    }
}
