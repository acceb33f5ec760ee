//! Post-sale release schedule.
//!
//! TGE unlock at finalize time, nothing more until the cliff passes, then the
//! remainder unlocks in whole slices. Between slice boundaries the vested amount
//! does not move.
//!
//! Timeline (t = tge timestamp):
//! - no TGE yet: 0
//! - [t, t+cliff): tge share
//! - [t+cliff, t+cliff+vesting): tge share + remainder × slices_passed / total_slices
//! - >= t+cliff+vesting: everything

use serde::{Deserialize, Serialize};

use crate::{
    error::LaunchpadError,
    math::{mul_bps, mul_div},
    Balance,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingConfig {
    /// Unlocked at TGE, 0..=10_000.
    pub tge_bps: u16,
    pub cliff_secs: u64,
    pub vesting_secs: u64,
    /// Release granularity; `vesting_secs` should be a multiple of it.
    pub slice_secs: u64,
}

impl VestingConfig {
    pub fn validate(&self) -> Result<(), LaunchpadError> {
        if self.tge_bps > 10_000 {
            return Err(LaunchpadError::InvalidPoolConfig("tge_bps > 10000".into()));
        }
        if self.vesting_secs > 0 && self.slice_secs == 0 {
            return Err(LaunchpadError::InvalidPoolConfig("slice_secs must be > 0".into()));
        }
        if self.slice_secs > self.vesting_secs && self.vesting_secs > 0 {
            return Err(LaunchpadError::InvalidPoolConfig("slice_secs > vesting_secs".into()));
        }
        Ok(())
    }

    /// Whether the final slice absorbs a remainder.
    pub fn is_exact(&self) -> bool {
        self.slice_secs == 0 || self.vesting_secs % self.slice_secs == 0
    }

    pub fn tge_amount(&self, total: Balance) -> Result<Balance, LaunchpadError> {
        mul_bps(total, self.tge_bps as u32)
    }

    /// Amount of `total` released by `now` for a pool finalized at `tge_ts`.
    pub fn vested_amount(&self, total: Balance, tge_ts: Option<u64>, now: u64) -> Result<Balance, LaunchpadError> {
        let Some(tge_ts) = tge_ts else {
            return Ok(0);
        };
        if now < tge_ts {
            return Ok(0);
        }
        let tge = self.tge_amount(total)?;
        let cliff_end = tge_ts.saturating_add(self.cliff_secs);
        if now < cliff_end {
            return Ok(tge);
        }
        if now >= cliff_end.saturating_add(self.vesting_secs) {
            return Ok(total);
        }

        let total_slices = self.vesting_secs.checked_div(self.slice_secs).unwrap_or(0);
        if total_slices == 0 {
            return Ok(tge);
        }
        let slices_passed = ((now - cliff_end) / self.slice_secs).min(total_slices);
        let linear = mul_div(total - tge, slices_passed as u128, total_slices as u128)?;
        tge.checked_add(linear).ok_or(LaunchpadError::MathOverflow)
    }
}
