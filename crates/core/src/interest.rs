//! Utilization-based interest rate models.
//!
//! Rates are returned per second, scaled by 1e18, so accrual is
//! `rate * debt * elapsed / 1e18`.

use alloy::primitives::U256;
use farmvault_chain::u256_math::{self, mul_div, BPS_DENOMINATOR, SECONDS_PER_YEAR, WAD};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 1e18 * 100, the utilization scale of the triple-slope model.
const PERCENT_WAD: U256 = U256::from_limbs([7_766_279_631_452_241_920u64, 5, 0, 0]);

fn percent(n: u64) -> U256 {
    U256::from(n) * WAD
}

/// Interest model selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InterestModel {
    /// Fixed annual rate regardless of utilization.
    Flat { annual_rate_bps: u64 },
    /// 0-60% utilization ramps to 20%, flat 20% up to 90%, then ramps to 150%.
    TripleSlope,
}

impl Default for InterestModel {
    fn default() -> Self {
        Self::TripleSlope
    }
}

impl InterestModel {
    /// Per-second rate (1e18 scale) for `debt` outstanding and `floating` idle cash.
    pub fn rate_per_second(&self, debt: U256, floating: U256) -> Result<U256> {
        let year = U256::from(SECONDS_PER_YEAR);
        match *self {
            Self::Flat { annual_rate_bps } => {
                Ok(mul_div(U256::from(annual_rate_bps), WAD, BPS_DENOMINATOR)? / year)
            }
            Self::TripleSlope => {
                let total = u256_math::add(debt, floating)?;
                if total.is_zero() {
                    return Ok(U256::ZERO);
                }
                let utilization = mul_div(debt, PERCENT_WAD, total)?;
                let (ceil1, ceil2, ceil3) = (percent(60), percent(90), percent(100));
                let max1 = percent(20) / U256::from(100u8);
                let max2 = max1;
                let max3 = percent(150) / U256::from(100u8);

                let annual = if utilization < ceil1 {
                    mul_div(utilization, max1, ceil1)?
                } else if utilization < ceil2 {
                    max2
                } else if utilization < ceil3 {
                    max2 + mul_div(utilization - ceil2, max3 - max2, ceil3 - ceil2)?
                } else {
                    max3
                };
                Ok(annual / year)
            }
        }
    }
}
