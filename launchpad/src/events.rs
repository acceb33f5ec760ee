//! Notifications broadcast by stake ledgers, sale pools and the registry.

use crate::{
    pool::Outcome,
    tier::{LockClass, Tier},
    Address, Balance, PoolId, Salt,
};

/// Broadcast notifications for indexers and presentation layers.
#[derive(Clone, Debug)]
pub enum LaunchpadEvent {
    Staked { who: Address, amount: Balance, lock_class: LockClass, lock_end: u64, tier: Tier },
    Withdrawn { who: Address, amount: Balance },
    EmergencyWithdrawn { who: Address, returned: Balance, penalty: Balance },
    StakeParamsUpdated { penalty_bps: u32, treasury: Address },
    StakePaused { paused: bool },
    PenaltiesSwept { treasury: Address, amount: Balance },

    Contributed { pool: PoolId, buyer: Address, amount: Balance, allocation: Balance, tier: Tier },
    Finalized { pool: PoolId, outcome: Outcome, total_raised: Balance },
    Claimed { pool: PoolId, beneficiary: Address, amount: Balance },
    Refunded { pool: PoolId, buyer: Address, amount: Balance },
    TokensDeposited { pool: PoolId, amount: Balance },
    FundsWithdrawn { pool: PoolId, to: Address, amount: Balance },
    UnsoldTokensWithdrawn { pool: PoolId, to: Address, amount: Balance },
    WhitelistRootSet { pool: PoolId },

    PoolCreated { pool: PoolId, salt: Salt, index: usize },
    StakeLedgerChanged { account: Address },
    RegistryPaused { paused: bool },
}
