//! Leveraged yield-farming protocol core.
//!
//! This crate provides:
//! - A lending vault with interest-bearing shares and debt-share accounting
//! - A worker that stakes LP per position and compounds farm rewards
//! - Add and withdraw strategies that turn base tokens into LP and back
//! - Position health, work-factor and kill-factor checks against an oracle
//! - A transactional ledger and a keeper that kills unhealthy positions

pub mod config;
mod deploy;
mod error;
pub mod interest;
mod keeper;
mod ledger;
pub mod strategy;
pub mod vault;
pub mod worker;

pub use config::{DeploymentConfig, KeeperParams, ProtocolConfig, ReinvestParams, VaultParams, WorkerParams};
pub use deploy::{Deployment, StrategyAddresses};
pub use error::{ProtocolError, Result};
pub use interest::InterestModel;
pub use keeper::{Keeper, KeeperReport, TrackedPosition};
pub use ledger::{Ledger, Parts, State};
pub use strategy::{encode_work, Strategy, StrategyCall, StrategyKind, WorkerTokens};
pub use vault::{KillOutcome, Position, Vault, VaultConfig, WorkRequest};
pub use worker::{Strategies, Worker, WorkerConfig, WorkerSetup};
