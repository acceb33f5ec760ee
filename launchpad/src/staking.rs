//! Stake ledger: lock classes, effective stake, tiers and exits.
//!
//! - Locks only extend: a deposit never shortens a running lock.
//! - Cooldown between deposits on a live position.
//! - Emergency exit is always available and charges a penalty only while locked.
//!   Once the participant is paid the exit is final; a penalty the treasury
//!   could not receive stays in the ledger account until the owner sweeps it.
//! - Pause halts deposit/withdraw; views and emergency exit stay available.

use parking_lot::RwLock;
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::LaunchpadError,
    events::LaunchpadEvent,
    guard::AtomicGuard,
    ledger::{LaunchpadBackend, LedgerError},
    math::mul_bps,
    tier::{LockClass, Tier},
    Address, AssetId, Balance,
};

pub const MAX_PENALTY_BPS: u32 = 5_000;
pub const DEFAULT_PENALTY_BPS: u32 = 1_000;
pub const DEFAULT_COOLDOWN_SECS: u64 = 3_600;

/// Mutable ledger parameters.
#[derive(Clone, Debug)]
pub struct StakeParams {
    pub penalty_bps: u32,
    pub treasury: Address,
    pub cooldown_secs: u64,
    pub paused: bool,
}

impl StakeParams {
    pub fn new(treasury: Address) -> Self {
        Self {
            penalty_bps: DEFAULT_PENALTY_BPS,
            treasury,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            paused: false,
        }
    }

    pub fn validate(&self) -> Result<(), LaunchpadError> {
        if self.penalty_bps > MAX_PENALTY_BPS {
            return Err(LaunchpadError::InvalidPenalty);
        }
        if self.treasury.is_zero() {
            return Err(LaunchpadError::InvalidAddress);
        }
        Ok(())
    }
}

/// One participant's stake record. Zeroed, never removed, on full exit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StakePosition {
    pub principal: Balance,
    /// Unix seconds; 0 = never locked.
    pub lock_end: u64,
    pub lock_class: LockClass,
    pub last_stake_time: u64,
}

impl StakePosition {
    pub fn is_locked(&self, now: u64) -> bool {
        self.lock_end > now
    }

    /// principal × lock multiplier / 10_000, saturating.
    pub fn effective(&self) -> Balance {
        mul_bps(self.principal, self.lock_class.multiplier_bps()).unwrap_or(Balance::MAX)
    }

    /// Apply a requested lock class at `now`. A request ending before the running
    /// lock keeps the running end and class.
    fn extend_lock(&mut self, class: LockClass, now: u64) {
        match class.duration_secs() {
            0 => {
                if !self.is_locked(now) {
                    self.lock_class = LockClass::None;
                }
            }
            d => {
                let requested_end = now.saturating_add(d);
                if requested_end >= self.lock_end {
                    self.lock_end = requested_end;
                    self.lock_class = class;
                }
            }
        }
    }
}

/// Read model for presentation/indexing consumers.
#[derive(Clone, Debug, Serialize)]
pub struct StakeSummary {
    pub principal: Balance,
    pub effective: Balance,
    pub tier: Tier,
    pub lock_end: u64,
    pub lock_class: LockClass,
    pub unlocked: bool,
}

pub struct StakeLedger<B: LaunchpadBackend> {
    backend: Arc<B>,
    account: Address,
    owner: Address,
    stake_asset: AssetId,
    params: RwLock<StakeParams>,
    positions: RwLock<HashMap<Address, StakePosition>>,
    /// Penalties held in `account`, owed to the treasury.
    pending_penalty: RwLock<Balance>,
    guard: AtomicGuard,
    events_tx: broadcast::Sender<LaunchpadEvent>,
}

impl<B: LaunchpadBackend> fmt::Debug for StakeLedger<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StakeLedger")
            .field("account", &self.account)
            .field("stake_asset", &self.stake_asset)
            .field("positions", &self.positions.read().len())
            .finish()
    }
}

impl<B: LaunchpadBackend> StakeLedger<B> {
    pub fn new(
        backend: Arc<B>,
        account: Address,
        owner: Address,
        stake_asset: AssetId,
        params: StakeParams,
        event_capacity: usize,
    ) -> Result<Arc<Self>, LaunchpadError> {
        params.validate()?;
        let (tx, _) = broadcast::channel(event_capacity.max(1));
        Ok(Arc::new(Self {
            backend,
            account,
            owner,
            stake_asset,
            params: RwLock::new(params),
            positions: RwLock::new(HashMap::new()),
            pending_penalty: RwLock::new(0),
            guard: AtomicGuard::new(),
            events_tx: tx,
        }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LaunchpadEvent> {
        self.events_tx.subscribe()
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn stake_asset(&self) -> AssetId {
        self.stake_asset
    }

    pub fn params(&self) -> StakeParams {
        self.params.read().clone()
    }

    fn now(&self) -> u64 {
        self.backend.now_unix()
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), LaunchpadError> {
        if caller != self.owner {
            return Err(LaunchpadError::NotAuthorized);
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), LaunchpadError> {
        if self.params.read().paused {
            return Err(LaunchpadError::Paused);
        }
        Ok(())
    }

    fn commit(&self, who: Address, pos: StakePosition) {
        self.positions.write().insert(who, pos);
    }

    fn rollback(&self, who: Address, prev: Option<StakePosition>) {
        let mut m = self.positions.write();
        match prev {
            Some(p) => m.insert(who, p),
            None => m.remove(&who),
        };
    }

    /// Lock `amount` with the requested lock class.
    pub fn deposit(&self, who: Address, amount: Balance, class: LockClass) -> Result<StakePosition, LaunchpadError> {
        let _scope = self.guard.enter()?;
        if amount == 0 {
            return Err(LaunchpadError::InvalidAmount);
        }
        self.ensure_running()?;

        let now = self.now();
        let cooldown = self.params.read().cooldown_secs;
        let prev = self.positions.read().get(&who).copied();
        let cur = prev.unwrap_or_default();
        if cur.principal > 0 && now < cur.last_stake_time.saturating_add(cooldown) {
            debug!(who = %who, last = cur.last_stake_time, now, "deposit rejected: cooldown");
            return Err(LaunchpadError::CooldownActive);
        }

        let mut next = cur;
        next.principal = cur.principal.checked_add(amount).ok_or(LaunchpadError::MathOverflow)?;
        next.extend_lock(class, now);
        next.last_stake_time = now;

        self.commit(who, next);
        if let Err(e) = self.backend.transfer_from(self.stake_asset, who, self.account, amount) {
            self.rollback(who, prev);
            warn!(who = %who, amount, error = %e, "stake pull failed");
            return Err(e.into());
        }

        let tier = Tier::classify(next.effective());
        info!(who = %who, amount, lock_class = ?next.lock_class, lock_end = next.lock_end, %tier, "staked");
        let _ = self.events_tx.send(LaunchpadEvent::Staked {
            who,
            amount,
            lock_class: next.lock_class,
            lock_end: next.lock_end,
            tier,
        });
        Ok(next)
    }

    /// Unlocked partial or full withdrawal.
    pub fn withdraw(&self, who: Address, amount: Balance) -> Result<StakePosition, LaunchpadError> {
        let _scope = self.guard.enter()?;
        if amount == 0 {
            return Err(LaunchpadError::InvalidAmount);
        }
        self.ensure_running()?;

        let now = self.now();
        let prev = self.positions.read().get(&who).copied();
        let cur = prev.unwrap_or_default();
        if amount > cur.principal {
            return Err(LaunchpadError::InsufficientBalance);
        }
        if cur.is_locked(now) {
            return Err(LaunchpadError::StakeLocked);
        }

        let mut next = cur;
        next.principal -= amount;
        if next.principal == 0 {
            next.lock_end = 0;
            next.lock_class = LockClass::None;
        }

        self.commit(who, next);
        if let Err(e) = self.backend.transfer(self.stake_asset, self.account, who, amount) {
            self.rollback(who, prev);
            warn!(who = %who, amount, error = %e, "stake payout failed");
            return Err(e.into());
        }

        info!(who = %who, amount, remaining = next.principal, "withdrawn");
        let _ = self.events_tx.send(LaunchpadEvent::Withdrawn { who, amount });
        Ok(next)
    }

    /// Full exit regardless of lock or pause. Returns (returned, penalty).
    pub fn emergency_withdraw(&self, who: Address) -> Result<(Balance, Balance), LaunchpadError> {
        let _scope = self.guard.enter()?;
        let now = self.now();
        let prev = self.positions.read().get(&who).copied();
        let cur = prev.unwrap_or_default();
        if cur.principal == 0 {
            return Err(LaunchpadError::NoStakeFound);
        }

        let (penalty_bps, treasury) = {
            let p = self.params.read();
            (p.penalty_bps, p.treasury)
        };
        let penalty = if cur.is_locked(now) { mul_bps(cur.principal, penalty_bps)? } else { 0 };
        let returned = cur.principal - penalty;

        // both payouts leave our own account
        if self.backend.balance_of(self.stake_asset, self.account)? < cur.principal {
            return Err(LedgerError::Insufficient.into());
        }
        let zeroed = StakePosition { last_stake_time: cur.last_stake_time, ..StakePosition::default() };
        self.commit(who, zeroed);
        if let Err(e) = self.pay_out(who, returned) {
            self.rollback(who, prev);
            warn!(who = %who, returned, error = %e, "emergency payout failed");
            return Err(e.into());
        }

        // participant is paid: from here on the position stays zeroed
        if let Err(e) = self.pay_out(treasury, penalty) {
            let mut pending = self.pending_penalty.write();
            *pending = pending.saturating_add(penalty);
            warn!(who = %who, penalty, pending = *pending, error = %e, "penalty payout deferred");
        }

        info!(who = %who, returned, penalty, "emergency withdrawal");
        let _ = self.events_tx.send(LaunchpadEvent::EmergencyWithdrawn { who, returned, penalty });
        Ok((returned, penalty))
    }

    /// Owner retries deferred exit penalties to the current treasury.
    pub fn sweep_penalties(&self, caller: Address) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        self.ensure_owner(caller)?;
        let amount = *self.pending_penalty.read();
        if amount == 0 {
            return Err(LaunchpadError::NothingToWithdraw);
        }
        let treasury = self.params.read().treasury;

        *self.pending_penalty.write() = 0;
        if let Err(e) = self.pay_out(treasury, amount) {
            *self.pending_penalty.write() = amount;
            warn!(treasury = %treasury, amount, error = %e, "penalty sweep failed");
            return Err(e.into());
        }

        info!(treasury = %treasury, amount, "penalties swept");
        let _ = self.events_tx.send(LaunchpadEvent::PenaltiesSwept { treasury, amount });
        Ok(amount)
    }

    fn pay_out(&self, to: Address, amount: Balance) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        self.backend.transfer(self.stake_asset, self.account, to, amount)
    }

    // ---------- Views ----------

    pub fn position(&self, who: Address) -> StakePosition {
        self.positions.read().get(&who).copied().unwrap_or_default()
    }

    pub fn effective_stake(&self, who: Address) -> Balance {
        self.position(who).effective()
    }

    pub fn tier_of(&self, who: Address) -> Tier {
        Tier::classify(self.effective_stake(who))
    }

    pub fn stake_summary(&self, who: Address) -> StakeSummary {
        let p = self.position(who);
        let effective = p.effective();
        StakeSummary {
            principal: p.principal,
            effective,
            tier: Tier::classify(effective),
            lock_end: p.lock_end,
            lock_class: p.lock_class,
            unlocked: !p.is_locked(self.now()),
        }
    }

    /// Exit penalties the treasury has not received yet.
    pub fn pending_penalty(&self) -> Balance {
        *self.pending_penalty.read()
    }

    pub fn total_staked(&self) -> Balance {
        self.positions
            .read()
            .values()
            .fold(0u128, |acc, p| acc.saturating_add(p.principal))
    }

    // ---------- Admin ----------

    pub fn set_penalty_bps(&self, caller: Address, bps: u32) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        if bps > MAX_PENALTY_BPS {
            return Err(LaunchpadError::InvalidPenalty);
        }
        let treasury = {
            let mut p = self.params.write();
            p.penalty_bps = bps;
            p.treasury
        };
        info!(penalty_bps = bps, "stake penalty updated");
        let _ = self.events_tx.send(LaunchpadEvent::StakeParamsUpdated { penalty_bps: bps, treasury });
        Ok(())
    }

    pub fn set_treasury(&self, caller: Address, treasury: Address) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        if treasury.is_zero() {
            return Err(LaunchpadError::InvalidAddress);
        }
        let penalty_bps = {
            let mut p = self.params.write();
            p.treasury = treasury;
            p.penalty_bps
        };
        info!(treasury = %treasury, "stake treasury updated");
        let _ = self.events_tx.send(LaunchpadEvent::StakeParamsUpdated { penalty_bps, treasury });
        Ok(())
    }

    pub fn set_paused(&self, caller: Address, paused: bool) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        self.params.write().paused = paused;
        info!(paused, "stake ledger pause toggled");
        let _ = self.events_tx.send(LaunchpadEvent::StakePaused { paused });
        Ok(())
    }
}
