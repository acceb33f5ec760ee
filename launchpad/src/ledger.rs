//! Asset ledger collaborator.

use thiserror::Error;

use crate::{Address, AssetId, Balance};

/// Backend for value transfer and time.
/// All monetary side-effects go through this trait; every call is all-or-nothing.
pub trait LaunchpadBackend: Send + Sync + 'static {
    /// Current UNIX time (seconds).
    fn now_unix(&self) -> u64;

    /// Pull `amount` of `asset` from `payer` into `recipient` (payer pre-approved).
    fn transfer_from(
        &self,
        asset: AssetId,
        payer: Address,
        recipient: Address,
        amount: Balance,
    ) -> Result<(), LedgerError>;

    /// Move `amount` of `asset` out of `holder`, the calling instance's own account.
    fn transfer(
        &self,
        asset: AssetId,
        holder: Address,
        recipient: Address,
        amount: Balance,
    ) -> Result<(), LedgerError>;

    fn balance_of(&self, asset: AssetId, account: Address) -> Result<Balance, LedgerError>;
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("insufficient balance")]
    Insufficient,
    #[error("asset not supported")]
    UnsupportedAsset,
    #[error("ledger failure: {0}")]
    Other(String),
}
