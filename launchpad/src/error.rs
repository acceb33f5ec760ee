//! Error taxonomy shared by the stake ledger, sale pools and the registry.

use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum LaunchpadError {
    // admission
    #[error("amount must be > 0")]
    InvalidAmount,
    #[error("unrecognized lock class")]
    InvalidLockClass,
    #[error("native value attached to a token-denominated sale")]
    InvalidPayment,
    #[error("invalid pool config: {0}")]
    InvalidPoolConfig(String),
    #[error("penalty rate above ceiling")]
    InvalidPenalty,
    #[error("zero address")]
    InvalidAddress,

    // temporal
    #[error("stake cooldown active")]
    CooldownActive,
    #[error("stake is locked")]
    StakeLocked,
    #[error("sale not started")]
    SaleNotStarted,
    #[error("sale ended")]
    SaleEnded,
    #[error("sale not ended")]
    SaleNotEnded,

    // capacity
    #[error("insufficient staked balance")]
    InsufficientBalance,
    #[error("no stake found")]
    NoStakeFound,
    #[error("below minimum purchase")]
    BelowMinPurchase,
    #[error("hard cap reached")]
    HardCapReached,
    #[error("exceeds allocation ceiling")]
    ExceedsMaxPurchase,

    // authorization
    #[error("invalid whitelist proof")]
    InvalidMerkleProof,
    #[error("tier too low to participate")]
    InsufficientTier,
    #[error("not authorized")]
    NotAuthorized,
    #[error("paused")]
    Paused,
    #[error("registry is paused")]
    RegistryPaused,

    // state
    #[error("already finalized")]
    AlreadyFinalized,
    #[error("not finalized")]
    NotFinalized,
    #[error("sale failed")]
    SaleFailed,
    #[error("refund not available")]
    RefundUnavailable,
    #[error("already refunded")]
    AlreadyRefunded,
    #[error("sale tokens not deposited")]
    TokensNotDeposited,
    #[error("nothing to claim")]
    NothingToClaim,
    #[error("nothing to withdraw")]
    NothingToWithdraw,
    #[error("no contribution")]
    NoContribution,
    #[error("pool already exists for salt")]
    PoolAlreadyExists,

    #[error("re-entrant call")]
    ReentrantCall,
    #[error("arithmetic overflow")]
    MathOverflow,
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// Coarse classification used by callers to decide whether to resubmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Admission,
    Temporal,
    Capacity,
    Authorization,
    State,
    Reentrancy,
    Internal,
}

impl LaunchpadError {
    pub fn kind(&self) -> ErrorKind {
        use LaunchpadError::*;
        match self {
            InvalidAmount | InvalidLockClass | InvalidPayment | InvalidPoolConfig(_) | InvalidPenalty
            | InvalidAddress => ErrorKind::Admission,
            CooldownActive | StakeLocked | SaleNotStarted | SaleEnded | SaleNotEnded => ErrorKind::Temporal,
            InsufficientBalance | NoStakeFound | BelowMinPurchase | HardCapReached | ExceedsMaxPurchase => {
                ErrorKind::Capacity
            }
            InvalidMerkleProof | InsufficientTier | NotAuthorized | Paused | RegistryPaused => {
                ErrorKind::Authorization
            }
            AlreadyFinalized | NotFinalized | SaleFailed | RefundUnavailable | AlreadyRefunded
            | TokensNotDeposited | NothingToClaim | NothingToWithdraw | NoContribution
            | PoolAlreadyExists => ErrorKind::State,
            ReentrantCall => ErrorKind::Reentrancy,
            MathOverflow | Ledger(_) => ErrorKind::Internal,
        }
    }

    /// Only timing errors may succeed later with identical arguments.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Temporal
    }
}
