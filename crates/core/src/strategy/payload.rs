//! ABI payloads carried by `work` calls.
//!
//! A work call is `abi.encode((address strategy, bytes payload))`; the inner
//! payload layout depends on the strategy variant and is validated against
//! that variant when decoded.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolType;
use serde::{Deserialize, Serialize};

use crate::error::Result;

sol! {
    /// Outer work payload: target strategy plus its own parameters.
    #[derive(Debug, PartialEq, Eq)]
    struct WorkData {
        address strategy;
        bytes payload;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct AddBaseTokenOnlyParams {
        uint256 minLpAmount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct AddTwoSidesParams {
        uint256 farmingTokenAmount;
        uint256 minLpAmount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct LiquidateParams {
        uint256 minBaseToken;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct WithdrawMinimizeParams {
        uint256 minFarmingToken;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PartialCloseParams {
        uint256 maxLpTokenToLiquidate;
        uint256 maxDebtRepayment;
        uint256 minOut;
    }
}

/// Strategy variant. Each deployed strategy address runs exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    AddBaseTokenOnly,
    AddTwoSidesOptimal,
    AddBaseWithFarm,
    Liquidate,
    WithdrawMinimizeTrading,
    PartialCloseLiquidate,
    PartialCloseMinimizeTrading,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        Self::AddBaseTokenOnly,
        Self::AddTwoSidesOptimal,
        Self::AddBaseWithFarm,
        Self::Liquidate,
        Self::WithdrawMinimizeTrading,
        Self::PartialCloseLiquidate,
        Self::PartialCloseMinimizeTrading,
    ];

    /// Strategies that only ever increase LP exposure.
    pub fn is_add(&self) -> bool {
        matches!(
            self,
            Self::AddBaseTokenOnly | Self::AddTwoSidesOptimal | Self::AddBaseWithFarm
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddBaseTokenOnly => "add-base-token-only",
            Self::AddTwoSidesOptimal => "add-two-sides-optimal",
            Self::AddBaseWithFarm => "add-base-with-farm",
            Self::Liquidate => "liquidate",
            Self::WithdrawMinimizeTrading => "withdraw-minimize-trading",
            Self::PartialCloseLiquidate => "partial-close-liquidate",
            Self::PartialCloseMinimizeTrading => "partial-close-minimize-trading",
        }
    }

    /// Decode `payload` with this variant's schema.
    pub fn decode(&self, payload: &[u8]) -> Result<StrategyCall> {
        let call = match self {
            Self::AddBaseTokenOnly => {
                let p = AddBaseTokenOnlyParams::abi_decode(payload, true)?;
                StrategyCall::AddBaseTokenOnly { min_lp: p.minLpAmount }
            }
            Self::AddTwoSidesOptimal => {
                let p = AddTwoSidesParams::abi_decode(payload, true)?;
                StrategyCall::AddTwoSidesOptimal {
                    farming_amount: p.farmingTokenAmount,
                    min_lp: p.minLpAmount,
                }
            }
            Self::AddBaseWithFarm => {
                let p = AddTwoSidesParams::abi_decode(payload, true)?;
                StrategyCall::AddBaseWithFarm {
                    farming_amount: p.farmingTokenAmount,
                    min_lp: p.minLpAmount,
                }
            }
            Self::Liquidate => {
                let p = LiquidateParams::abi_decode(payload, true)?;
                StrategyCall::Liquidate { min_base: p.minBaseToken }
            }
            Self::WithdrawMinimizeTrading => {
                let p = WithdrawMinimizeParams::abi_decode(payload, true)?;
                StrategyCall::WithdrawMinimizeTrading {
                    min_farming: p.minFarmingToken,
                }
            }
            Self::PartialCloseLiquidate => {
                let p = PartialCloseParams::abi_decode(payload, true)?;
                StrategyCall::PartialCloseLiquidate {
                    max_lp: p.maxLpTokenToLiquidate,
                    max_debt_repayment: p.maxDebtRepayment,
                    min_base: p.minOut,
                }
            }
            Self::PartialCloseMinimizeTrading => {
                let p = PartialCloseParams::abi_decode(payload, true)?;
                StrategyCall::PartialCloseMinimizeTrading {
                    max_lp: p.maxLpTokenToLiquidate,
                    max_debt_repayment: p.maxDebtRepayment,
                    min_farming: p.minOut,
                }
            }
        };
        Ok(call)
    }
}

/// Typed strategy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyCall {
    AddBaseTokenOnly {
        min_lp: U256,
    },
    AddTwoSidesOptimal {
        farming_amount: U256,
        min_lp: U256,
    },
    AddBaseWithFarm {
        farming_amount: U256,
        min_lp: U256,
    },
    Liquidate {
        min_base: U256,
    },
    WithdrawMinimizeTrading {
        min_farming: U256,
    },
    PartialCloseLiquidate {
        max_lp: U256,
        max_debt_repayment: U256,
        min_base: U256,
    },
    PartialCloseMinimizeTrading {
        max_lp: U256,
        max_debt_repayment: U256,
        min_farming: U256,
    },
}

impl StrategyCall {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::AddBaseTokenOnly { .. } => StrategyKind::AddBaseTokenOnly,
            Self::AddTwoSidesOptimal { .. } => StrategyKind::AddTwoSidesOptimal,
            Self::AddBaseWithFarm { .. } => StrategyKind::AddBaseWithFarm,
            Self::Liquidate { .. } => StrategyKind::Liquidate,
            Self::WithdrawMinimizeTrading { .. } => StrategyKind::WithdrawMinimizeTrading,
            Self::PartialCloseLiquidate { .. } => StrategyKind::PartialCloseLiquidate,
            Self::PartialCloseMinimizeTrading { .. } => StrategyKind::PartialCloseMinimizeTrading,
        }
    }

    /// Inner payload bytes for this call.
    pub fn encode(&self) -> Bytes {
        let raw = match *self {
            Self::AddBaseTokenOnly { min_lp } => {
                AddBaseTokenOnlyParams::abi_encode(&AddBaseTokenOnlyParams { minLpAmount: min_lp })
            }
            Self::AddTwoSidesOptimal {
                farming_amount,
                min_lp,
            }
            | Self::AddBaseWithFarm {
                farming_amount,
                min_lp,
            } => AddTwoSidesParams::abi_encode(&AddTwoSidesParams {
                farmingTokenAmount: farming_amount,
                minLpAmount: min_lp,
            }),
            Self::Liquidate { min_base } => {
                LiquidateParams::abi_encode(&LiquidateParams { minBaseToken: min_base })
            }
            Self::WithdrawMinimizeTrading { min_farming } => {
                WithdrawMinimizeParams::abi_encode(&WithdrawMinimizeParams {
                    minFarmingToken: min_farming,
                })
            }
            Self::PartialCloseLiquidate {
                max_lp,
                max_debt_repayment,
                min_base: min_out,
            }
            | Self::PartialCloseMinimizeTrading {
                max_lp,
                max_debt_repayment,
                min_farming: min_out,
            } => PartialCloseParams::abi_encode(&PartialCloseParams {
                maxLpTokenToLiquidate: max_lp,
                maxDebtRepayment: max_debt_repayment,
                minOut: min_out,
            }),
        };
        Bytes::from(raw)
    }
}

/// Build the outer work payload for `strategy`.
pub fn encode_work(strategy: Address, call: &StrategyCall) -> Bytes {
    encode_work_raw(strategy, call.encode())
}

/// Build the outer work payload from already-encoded strategy bytes.
pub fn encode_work_raw(strategy: Address, payload: Bytes) -> Bytes {
    Bytes::from(WorkData::abi_encode(&WorkData { strategy, payload }))
}

/// Split a work payload into target strategy and inner bytes.
pub fn decode_work(data: &[u8]) -> Result<(Address, Bytes)> {
    let work = WorkData::abi_decode(data, true)?;
    Ok((work.strategy, work.payload))
}
