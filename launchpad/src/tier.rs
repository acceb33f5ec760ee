//! Tier classification and multiplier tables.
//!
//! Pure functions over sorted staircase tables; no state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{error::LaunchpadError, math::mul_bps, Balance, UNIT};

const DAY: u64 = 86_400;

/// Participant tier, totally ordered by weighted-stake threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    None,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// (minimum weighted stake in whole tokens, tier), ascending.
const TIER_THRESHOLDS: [(u128, Tier); 4] = [
    (500, Tier::Bronze),
    (2_000, Tier::Silver),
    (10_000, Tier::Gold),
    (50_000, Tier::Platinum),
];

impl Tier {
    /// Lowest tier admitted to a non-whitelisted sale.
    pub const MIN_PARTICIPATING: Tier = Tier::Bronze;

    /// Classify a weighted stake (smallest units). Thresholds are inclusive.
    pub fn classify(weighted: Balance) -> Tier {
        TIER_THRESHOLDS
            .iter()
            .rev()
            .find(|(min, _)| weighted >= min.saturating_mul(UNIT))
            .map(|(_, t)| *t)
            .unwrap_or(Tier::None)
    }

    /// Allocation ceiling multiplier in bps. Bronze is 0: it keeps the base ceiling unscaled.
    pub fn allocation_multiplier_bps(self) -> u32 {
        match self {
            Tier::None | Tier::Bronze => 0,
            Tier::Silver => 10_000,
            Tier::Gold => 30_000,
            Tier::Platinum => 100_000,
        }
    }

    pub fn is_guaranteed(self) -> bool {
        self >= Tier::Silver
    }

    pub fn is_private_eligible(self) -> bool {
        self == Tier::Platinum
    }

    /// Per-participant purchase ceiling derived from the pool's base ceiling.
    pub fn max_allocation(self, base: Balance) -> Result<Balance, LaunchpadError> {
        match self {
            Tier::None | Tier::Bronze => Ok(base),
            t => mul_bps(base, t.allocation_multiplier_bps()),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::None => "none",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        };
        f.write_str(s)
    }
}

/// Recognized lock durations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum LockClass {
    #[default]
    None,
    Days30,
    Days60,
    Days90,
}

impl LockClass {
    const ALL: [LockClass; 4] = [LockClass::None, LockClass::Days30, LockClass::Days60, LockClass::Days90];

    pub fn days(self) -> u64 {
        match self {
            LockClass::None => 0,
            LockClass::Days30 => 30,
            LockClass::Days60 => 60,
            LockClass::Days90 => 90,
        }
    }

    pub fn duration_secs(self) -> u64 {
        self.days() * DAY
    }

    /// Exact day count; anything outside {0, 30, 60, 90} is rejected.
    pub fn from_days(days: u64) -> Result<LockClass, LaunchpadError> {
        Self::ALL
            .into_iter()
            .find(|c| c.days() == days)
            .ok_or(LaunchpadError::InvalidLockClass)
    }

    /// Greatest class whose duration does not exceed `secs`.
    pub fn for_duration(secs: u64) -> LockClass {
        Self::ALL
            .into_iter()
            .rev()
            .find(|c| c.duration_secs() <= secs)
            .unwrap_or(LockClass::None)
    }

    pub fn multiplier_bps(self) -> u32 {
        match self {
            LockClass::None => 10_000,
            LockClass::Days30 => 12_000,
            LockClass::Days60 => 15_000,
            LockClass::Days90 => 20_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(Tier::classify(0), Tier::None);
        assert_eq!(Tier::classify(500 * UNIT - 1), Tier::None);
        assert_eq!(Tier::classify(500 * UNIT), Tier::Bronze);
        assert_eq!(Tier::classify(2_000 * UNIT - 1), Tier::Bronze);
        assert_eq!(Tier::classify(2_000 * UNIT), Tier::Silver);
        assert_eq!(Tier::classify(10_000 * UNIT), Tier::Gold);
        assert_eq!(Tier::classify(50_000 * UNIT - 1), Tier::Gold);
        assert_eq!(Tier::classify(50_000 * UNIT), Tier::Platinum);
        assert_eq!(Tier::classify(u128::MAX), Tier::Platinum);
    }

    #[test]
    fn ceilings() {
        let base = 1_000;
        assert_eq!(Tier::Bronze.max_allocation(base).unwrap(), base);
        assert_eq!(Tier::Silver.max_allocation(base).unwrap(), base);
        assert_eq!(Tier::Gold.max_allocation(base).unwrap(), 3 * base);
        assert_eq!(Tier::Platinum.max_allocation(base).unwrap(), 10 * base);
        assert!(Tier::Silver.is_guaranteed());
        assert!(!Tier::Bronze.is_guaranteed());
        assert!(Tier::Platinum.is_private_eligible());
        assert!(!Tier::Gold.is_private_eligible());
    }

    #[test]
    fn lock_classes() {
        assert_eq!(LockClass::from_days(60).unwrap(), LockClass::Days60);
        assert!(matches!(LockClass::from_days(45), Err(LaunchpadError::InvalidLockClass)));
        assert_eq!(LockClass::for_duration(0), LockClass::None);
        assert_eq!(LockClass::for_duration(30 * DAY - 1), LockClass::None);
        assert_eq!(LockClass::for_duration(45 * DAY), LockClass::Days30);
        assert_eq!(LockClass::for_duration(365 * DAY), LockClass::Days90);
        assert_eq!(LockClass::Days90.multiplier_bps(), 20_000);
    }
}
