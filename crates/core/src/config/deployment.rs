//! Deployment configuration: market seeding plus protocol parameters.

use farmvault_chain::{Emission, SwapFee};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::protocol::ProtocolConfig;

/// Full deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment metadata
    pub deployment: DeploymentDetails,
    /// Protocol parameters
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Tokens, pool and farm to deploy
    #[serde(default)]
    pub market: MarketConfig,
    /// Simulator script amounts
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Deployment details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDetails {
    /// Deployment name (e.g., "btoken-ftoken-local")
    pub name: String,
}

/// Tokens, AMM pool and farm seeded at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_base_symbol")]
    pub base_symbol: String,
    #[serde(default = "default_farming_symbol")]
    pub farming_symbol: String,
    #[serde(default = "default_reward_symbol")]
    pub reward_symbol: String,

    /// Initial base-token reserve of the pair
    #[serde(default = "default_base_liquidity")]
    pub base_liquidity: f64,
    /// Initial farming-token reserve of the pair
    #[serde(default = "default_farming_liquidity")]
    pub farming_liquidity: f64,

    /// Factory-wide swap fee
    #[serde(default)]
    pub swap_fee: SwapFee,

    /// Reward emitted per second or per block
    #[serde(default = "default_reward_per_unit")]
    pub reward_per_unit: f64,
    #[serde(default)]
    pub emission: Emission,
    #[serde(default = "default_alloc_point")]
    pub alloc_point: u64,

    /// Liquidity of the reward/base pair used for reinvest swaps
    #[serde(default = "default_reward_liquidity")]
    pub reward_base_liquidity: f64,
    #[serde(default = "default_reward_liquidity")]
    pub reward_liquidity: f64,
}

fn default_base_symbol() -> String {
    "BTOKEN".to_string()
}
fn default_farming_symbol() -> String {
    "FTOKEN".to_string()
}
fn default_reward_symbol() -> String {
    "CAKE".to_string()
}
fn default_base_liquidity() -> f64 {
    1.0
}
fn default_farming_liquidity() -> f64 {
    0.1
}
fn default_reward_per_unit() -> f64 {
    0.076
}
fn default_alloc_point() -> u64 {
    1000
}
fn default_reward_liquidity() -> f64 {
    100.0
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_symbol: default_base_symbol(),
            farming_symbol: default_farming_symbol(),
            reward_symbol: default_reward_symbol(),
            base_liquidity: default_base_liquidity(),
            farming_liquidity: default_farming_liquidity(),
            swap_fee: SwapFee::default(),
            reward_per_unit: default_reward_per_unit(),
            emission: Emission::default(),
            alloc_point: default_alloc_point(),
            reward_base_liquidity: default_reward_liquidity(),
            reward_liquidity: default_reward_liquidity(),
        }
    }
}

/// Amounts used by the simulator binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_deposit")]
    pub deposit: f64,
    #[serde(default = "default_principal")]
    pub principal: f64,
    #[serde(default = "default_loan")]
    pub loan: f64,
    /// Farming time before the reinvest call
    #[serde(default = "default_farm_secs")]
    pub farm_secs: u64,
    /// Additional time for interest accrual
    #[serde(default = "default_accrual_secs")]
    pub accrual_secs: u64,
    /// Farming tokens dumped into the pool to push the position under water
    #[serde(default = "default_shock_farming_sold")]
    pub shock_farming_sold: f64,
}

fn default_deposit() -> f64 {
    3.0
}
fn default_principal() -> f64 {
    1.0
}
fn default_loan() -> f64 {
    1.0
}
fn default_farm_secs() -> u64 {
    86_400
}
fn default_accrual_secs() -> u64 {
    30 * 86_400
}
fn default_shock_farming_sold() -> f64 {
    1.0
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            deposit: default_deposit(),
            principal: default_principal(),
            loan: default_loan(),
            farm_secs: default_farm_secs(),
            accrual_secs: default_accrual_secs(),
            shock_farming_sold: default_shock_farming_sold(),
        }
    }
}

impl DeploymentConfig {
    /// Load deployment config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: DeploymentConfig = toml::from_str(&content)?;
        config.protocol.validate()?;
        Ok(config)
    }

    /// Load the deployment named by the DEPLOYMENT env var from
    /// `$CONFIG_DIR/deployments/<name>.toml` (CONFIG_DIR defaults to
    /// `./config`). `testing` or an unset DEPLOYMENT gives [`Self::testing`].
    pub fn load_from_env() -> anyhow::Result<Self> {
        let name = std::env::var("DEPLOYMENT").unwrap_or_else(|_| "testing".to_string());
        if name == "testing" {
            return Ok(Self::testing());
        }
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".to_string());
        let path = Path::new(&config_dir).join("deployments").join(format!("{name}.toml"));
        Self::from_file(&path).map_err(|e| anyhow::anyhow!("deployment {}: {e}", path.display()))
    }

    /// Local fixture: 100:100 pool, testing protocol profile.
    pub fn testing() -> Self {
        Self {
            deployment: DeploymentDetails {
                name: "testing".to_string(),
            },
            protocol: ProtocolConfig::testing(),
            market: MarketConfig {
                base_liquidity: 100.0,
                farming_liquidity: 100.0,
                ..Default::default()
            },
            scenario: ScenarioConfig::default(),
        }
    }
}
