//! Protocol parameters with profile support.
//!
//! Amounts are written in whole tokens (`f64`) and converted to 18-decimal
//! `U256` when a vault or worker is deployed. Ratios are basis points.

use alloy::primitives::U256;
use farmvault_chain::u256_math::{self, MAX_BPS};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProtocolError, Result};
use crate::interest::InterestModel;

/// Main configuration structure for one vault + worker deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Lending pool parameters
    #[serde(default)]
    pub vault: VaultParams,

    /// Per-worker risk parameters
    #[serde(default)]
    pub worker: WorkerParams,

    /// Reward compounding parameters
    #[serde(default)]
    pub reinvest: ReinvestParams,

    /// Off-ledger keeper timing
    #[serde(default)]
    pub keeper: KeeperParams,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Lending pool parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultParams {
    /// Minimum debt a position may carry, in base tokens
    #[serde(default = "default_min_debt_size")]
    pub min_debt_size: f64,

    /// Share of accrued interest kept as protocol reserve
    #[serde(default = "default_reserve_pool_bps")]
    pub reserve_pool_bps: u64,

    /// Kill prize paid to the liquidator
    #[serde(default = "default_kill_bps")]
    pub kill_bps: u64,

    /// Kill fee paid to the treasury
    #[serde(default = "default_kill_treasury_bps")]
    pub kill_treasury_bps: u64,

    /// Borrow rate model
    #[serde(default)]
    pub interest: InterestModel,
}

fn default_min_debt_size() -> f64 {
    1.0
}
fn default_reserve_pool_bps() -> u64 {
    1000
}
fn default_kill_bps() -> u64 {
    500
}
fn default_kill_treasury_bps() -> u64 {
    100
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            min_debt_size: default_min_debt_size(),
            reserve_pool_bps: default_reserve_pool_bps(),
            kill_bps: default_kill_bps(),
            kill_treasury_bps: default_kill_treasury_bps(),
            interest: InterestModel::default(),
        }
    }
}

impl VaultParams {
    pub fn min_debt_size_wad(&self) -> U256 {
        u256_math::f64_to_wad(self.min_debt_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reserve_pool_bps > MAX_BPS {
            return Err(ProtocolError::BadParam("reserve pool bps above 100%"));
        }
        if self.kill_bps + self.kill_treasury_bps > MAX_BPS {
            return Err(ProtocolError::BadParam("kill bps above 100%"));
        }
        Ok(())
    }
}

/// Per-worker risk parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerParams {
    /// Whether the worker may take new loans
    #[serde(default = "default_accept_debt")]
    pub accept_debt: bool,

    /// Max debt/health ratio when opening or adding to a position
    #[serde(default = "default_work_factor")]
    pub work_factor_bps: u64,

    /// Debt/health ratio above which a position can be killed
    #[serde(default = "default_kill_factor")]
    pub kill_factor_bps: u64,

    /// Allowed AMM/oracle price divergence (11000 = 10%)
    #[serde(default = "default_max_price_diff")]
    pub max_price_diff_bps: u64,

    /// Oldest acceptable oracle update
    #[serde(default = "default_max_price_age")]
    pub max_price_age_secs: u64,
}

fn default_accept_debt() -> bool {
    true
}
fn default_work_factor() -> u64 {
    7000
}
fn default_kill_factor() -> u64 {
    8000
}
fn default_max_price_diff() -> u64 {
    11000
}
fn default_max_price_age() -> u64 {
    86_400
}

impl Default for WorkerParams {
    fn default() -> Self {
        Self {
            accept_debt: default_accept_debt(),
            work_factor_bps: default_work_factor(),
            kill_factor_bps: default_kill_factor(),
            max_price_diff_bps: default_max_price_diff(),
            max_price_age_secs: default_max_price_age(),
        }
    }
}

impl WorkerParams {
    pub fn validate(&self) -> Result<()> {
        if self.work_factor_bps > self.kill_factor_bps {
            return Err(ProtocolError::BadParam("work factor above kill factor"));
        }
        if self.kill_factor_bps > MAX_BPS {
            return Err(ProtocolError::BadParam("kill factor above 100%"));
        }
        if self.max_price_diff_bps < MAX_BPS {
            return Err(ProtocolError::BadParam("max price diff below 100%"));
        }
        Ok(())
    }
}

/// Reward compounding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinvestParams {
    /// Cut of harvested reward paid to a whitelisted reinvestor
    #[serde(default = "default_reinvest_bounty")]
    pub reinvest_bounty_bps: u64,

    /// Ceiling for every bounty setting (at most 3000)
    #[serde(default = "default_max_reinvest_bounty")]
    pub max_reinvest_bounty_bps: u64,

    /// Cut of harvested reward paid to the treasury on auto-reinvest
    #[serde(default = "default_treasury_bounty")]
    pub treasury_bounty_bps: u64,

    /// Pending reward (in reward tokens) that triggers auto-reinvest during work
    #[serde(default = "default_reinvest_threshold")]
    pub reinvest_threshold: f64,

    /// Share of each bounty forwarded to the beneficial vault
    #[serde(default)]
    pub beneficial_vault_bounty_bps: u64,
}

fn default_reinvest_bounty() -> u64 {
    100
}
fn default_max_reinvest_bounty() -> u64 {
    900
}
fn default_treasury_bounty() -> u64 {
    100
}
fn default_reinvest_threshold() -> f64 {
    1.0
}

impl Default for ReinvestParams {
    fn default() -> Self {
        Self {
            reinvest_bounty_bps: default_reinvest_bounty(),
            max_reinvest_bounty_bps: default_max_reinvest_bounty(),
            treasury_bounty_bps: default_treasury_bounty(),
            reinvest_threshold: default_reinvest_threshold(),
            beneficial_vault_bounty_bps: 0,
        }
    }
}

impl ReinvestParams {
    pub fn reinvest_threshold_wad(&self) -> U256 {
        u256_math::f64_to_wad(self.reinvest_threshold)
    }
}

/// Off-ledger keeper timing and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperParams {
    /// Scan interval
    #[serde(default = "default_keeper_interval_ms")]
    pub interval_ms: u64,

    /// Pending reward (in reward tokens) above which the keeper calls reinvest
    #[serde(default = "default_keeper_reinvest_min")]
    pub reinvest_min_reward: f64,
}

fn default_keeper_interval_ms() -> u64 {
    3000
}
fn default_keeper_reinvest_min() -> f64 {
    1.0
}

impl Default for KeeperParams {
    fn default() -> Self {
        Self {
            interval_ms: default_keeper_interval_ms(),
            reinvest_min_reward: default_keeper_reinvest_min(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            vault: VaultParams::default(),
            worker: WorkerParams::default(),
            reinvest: ReinvestParams::default(),
            keeper: KeeperParams::default(),
        }
    }
}

impl ProtocolConfig {
    /// Profile used by the integration fixtures: flat 30% a year, no
    /// auto-reinvest during work, fast keeper.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            vault: VaultParams {
                min_debt_size: 0.1,
                reserve_pool_bps: 1000,
                kill_bps: 500,
                kill_treasury_bps: 100,
                interest: InterestModel::Flat { annual_rate_bps: 3000 },
            },
            worker: WorkerParams {
                accept_debt: true,
                work_factor_bps: 7000,
                kill_factor_bps: 8000,
                max_price_diff_bps: 11000,
                max_price_age_secs: 86_400,
            },
            reinvest: ReinvestParams {
                reinvest_bounty_bps: 100,
                max_reinvest_bounty_bps: 500,
                treasury_bounty_bps: 100,
                reinvest_threshold: 1_000_000.0,
                beneficial_vault_bounty_bps: 0,
            },
            keeper: KeeperParams {
                interval_ms: 10,
                reinvest_min_reward: 0.01,
            },
        }
    }

    /// Lower leverage, tighter price band.
    pub fn conservative() -> Self {
        Self {
            profile: "conservative".to_string(),
            vault: VaultParams {
                min_debt_size: 10.0,
                reserve_pool_bps: 1500,
                ..Default::default()
            },
            worker: WorkerParams {
                work_factor_bps: 5000,
                kill_factor_bps: 7000,
                max_price_diff_bps: 10500,
                max_price_age_secs: 3600,
                ..Default::default()
            },
            reinvest: ReinvestParams {
                reinvest_bounty_bps: 50,
                max_reinvest_bounty_bps: 300,
                treasury_bounty_bps: 50,
                ..Default::default()
            },
            keeper: KeeperParams::default(),
        }
    }

    /// Get profile from environment variable FARMVAULT_PROFILE, or default.
    /// Supported values: testing, conservative
    pub fn from_env() -> Self {
        let profile = std::env::var("FARMVAULT_PROFILE").unwrap_or_else(|_| "default".to_string());
        match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "conservative" | "safe" => Self::conservative(),
            _ => Self::default(),
        }
    }

    /// Load from a standalone TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ProtocolConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.vault.validate()?;
        self.worker.validate()?;
        if self.reinvest.max_reinvest_bounty_bps > 3000 {
            return Err(ProtocolError::BadMaxBounty(self.reinvest.max_reinvest_bounty_bps));
        }
        if self.reinvest.reinvest_bounty_bps > self.reinvest.max_reinvest_bounty_bps
            || self.reinvest.treasury_bounty_bps > self.reinvest.max_reinvest_bounty_bps
        {
            return Err(ProtocolError::BountyTooHigh);
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Protocol configuration loaded");
        tracing::info!(
            min_debt_size = self.vault.min_debt_size,
            reserve_pool_bps = self.vault.reserve_pool_bps,
            kill_bps = self.vault.kill_bps,
            kill_treasury_bps = self.vault.kill_treasury_bps,
            interest = ?self.vault.interest,
            "Vault parameters"
        );
        tracing::info!(
            work_factor = self.worker.work_factor_bps,
            kill_factor = self.worker.kill_factor_bps,
            max_price_diff = self.worker.max_price_diff_bps,
            "Worker risk parameters"
        );
        tracing::info!(
            bounty = self.reinvest.reinvest_bounty_bps,
            max_bounty = self.reinvest.max_reinvest_bounty_bps,
            threshold = self.reinvest.reinvest_threshold,
            "Reinvest parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProtocolConfig::default();
        assert_eq!(config.worker.work_factor_bps, 7000);
        assert_eq!(config.vault.interest, InterestModel::TripleSlope);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profiles_are_valid() {
        assert!(ProtocolConfig::testing().validate().is_ok());
        assert!(ProtocolConfig::conservative().validate().is_ok());
        assert!(ProtocolConfig::conservative().worker.kill_factor_bps < 8000);
    }

    #[test]
    fn test_bad_factors_rejected() {
        let mut config = ProtocolConfig::default();
        config.worker.work_factor_bps = 9000;
        assert_eq!(
            config.validate(),
            Err(ProtocolError::BadParam("work factor above kill factor"))
        );

        let mut config = ProtocolConfig::default();
        config.reinvest.treasury_bounty_bps = 1000;
        assert_eq!(config.validate(), Err(ProtocolError::BountyTooHigh));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ProtocolConfig = toml::from_str(
            r#"
            profile = "custom"
            [worker]
            kill_factor_bps = 8500
            [vault.interest]
            kind = "flat"
            annual_rate_bps = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.profile, "custom");
        assert_eq!(config.worker.kill_factor_bps, 8500);
        assert_eq!(config.worker.work_factor_bps, 7000);
        assert_eq!(config.vault.interest, InterestModel::Flat { annual_rate_bps: 2000 });
        assert_eq!(config.reinvest.max_reinvest_bounty_bps, 900);
    }

    #[test]
    fn test_serialization() {
        let config = ProtocolConfig::testing();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: ProtocolConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profile, "testing");
        assert_eq!(parsed.vault.min_debt_size_wad(), u256_math::f64_to_wad(0.1));
    }
}
