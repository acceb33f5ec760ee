//! Tierpad: tiered-allocation token sale engine
//! Features:
//! - Stake ledger: lock classes, effective (weighted) stake, tiers, cooldown, penalized exit
//! - Sale pools: time window, soft/hard caps, tier-scaled ceilings, whitelist proofs
//! - Vesting: TGE (bps) + cliff + slice-stepped linear release, anchored at finalize time
//! - Registry: content-addressed pool identities, one pool per salt, paginated listing
//! - Safety: checked arithmetic, per-instance re-entrancy guard, effects before transfers
//! - Events: tokio::broadcast
//!
//! Notes:
//! - Asset movement and time are abstracted behind [`LaunchpadBackend`].
//! - Every instance (stake ledger, pool) escrows under its own ledger [`Address`].

#![forbid(unsafe_code)]
#![allow(clippy::too_many_arguments)]

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod math;
pub mod merkle;
pub mod pool;
pub mod registry;
pub mod staking;
pub mod telemetry;
pub mod tier;
pub mod vesting;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, LaunchpadError};
pub use events::LaunchpadEvent;
pub use guard::AtomicGuard;
pub use ledger::{LaunchpadBackend, LedgerError};
pub use merkle::{Hash32, ProofVerifier, Sha256Verifier, WhitelistTree};
pub use pool::{Outcome, Participant, PoolConfig, PoolPhase, PoolStatus, SalePool};
pub use registry::PoolRegistry;
pub use staking::{StakeLedger, StakeParams, StakePosition, StakeSummary};
pub use tier::{LockClass, Tier};
pub use vesting::VestingConfig;

// ---------- Primitives ----------

/// Smallest unit balance.
pub type Balance = u128;

/// Smallest units per whole token (18 decimals).
pub const UNIT: Balance = 1_000_000_000_000_000_000;

/// Basis points denominator (100% == 10_000 bps).
pub const BPS_DENOM: u128 = 10_000;

/// 20-byte ledger account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    /// Parse from 0x-prefixed or raw 40-hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 20];
        hex::decode_to_slice(raw, &mut out)?;
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Asset identifier (stake asset, sale token or payment asset).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u32);

impl AssetId {
    /// Sentinel for the chain's native asset.
    pub const NATIVE: AssetId = AssetId(0);

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

/// Content-addressed pool identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub [u8; 32]);

impl PoolId {
    /// Ledger account the pool escrows under.
    pub fn account(&self) -> Address {
        let mut a = [0u8; 20];
        a.copy_from_slice(&self.0[..20]);
        Address(a)
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serialize for PoolId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Caller-supplied uniqueness token for pool creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Salt(pub [u8; 32]);

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Salt {
    type Err = hex::FromHexError;

    /// Parse 0x-prefixed or raw 64-hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(raw, &mut out)?;
        Ok(Salt(out))
    }
}

impl From<u64> for Salt {
    fn from(n: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&n.to_be_bytes());
        Salt(out)
    }
}
