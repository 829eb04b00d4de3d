//! Configuration for vault deployments.
//!
//! This module provides:
//! - Protocol parameters (profiles, vault, worker, reinvest, keeper)
//! - Deployment configuration (tokens, pool, farm, simulator amounts)

mod deployment;
mod protocol;

pub use protocol::{KeeperParams, ProtocolConfig, ReinvestParams, VaultParams, WorkerParams};

pub use deployment::{DeploymentConfig, DeploymentDetails, MarketConfig, ScenarioConfig};
