//! Block clock of the simulated host ledger.

use serde::{Deserialize, Serialize};

/// Default genesis timestamp (2021-01-01T00:00:00Z).
pub const GENESIS_TIMESTAMP: u64 = 1_609_459_200;

/// Default block time in seconds.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 3;

/// Current block height and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub timestamp: u64,
    pub block_number: u64,
    pub block_time_secs: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            block_number: 1,
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
        }
    }
}

impl Clock {
    /// Advance by a number of seconds, mining as many blocks as fit.
    pub fn advance_secs(&mut self, secs: u64) {
        self.timestamp += secs;
        self.block_number += (secs / self.block_time_secs.max(1)).max(1);
    }

    /// Advance by a number of blocks at the configured block time.
    pub fn advance_blocks(&mut self, blocks: u64) {
        self.block_number += blocks;
        self.timestamp += blocks * self.block_time_secs;
    }
}
