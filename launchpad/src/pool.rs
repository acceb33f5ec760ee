//! Sale pool: one instance per sale.
//!
//! Lifecycle: Pending -> Active -> Ended -> Finalized(Success | Failed), then
//! per-participant claim (success) or refund (failure).
//!
//! Every mutating operation runs under the pool's [`AtomicGuard`], commits its
//! bookkeeping first and only then calls the ledger; a failed ledger call
//! restores the previous bookkeeping before the error is returned.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::LaunchpadError,
    events::LaunchpadEvent,
    guard::AtomicGuard,
    ledger::LaunchpadBackend,
    math::mul_div,
    merkle::{leaf_hash, Hash32, ProofVerifier},
    staking::StakeLedger,
    tier::Tier,
    vesting::VestingConfig,
    Address, AssetId, Balance, PoolId, BPS_DENOM, UNIT,
};

/// Immutable sale parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub sale_asset: AssetId,
    /// `AssetId::NATIVE` for sales paid with attached native value.
    pub payment_asset: AssetId,
    /// Payment smallest-units per whole sale token (scaled by `UNIT`).
    pub unit_price: Balance,
    pub soft_cap: Balance,
    pub hard_cap: Balance,
    /// Per-contribution minimum.
    pub min_purchase: Balance,
    /// Base per-participant ceiling before tier scaling.
    pub max_purchase: Balance,
    pub start_time: u64,
    pub end_time: u64,
    pub require_whitelist: bool,
}

impl PoolConfig {
    pub fn validate(&self, now: u64) -> Result<(), LaunchpadError> {
        let bad = |msg: &str| -> Result<(), LaunchpadError> { Err(LaunchpadError::InvalidPoolConfig(msg.into())) };
        if self.start_time >= self.end_time {
            return bad("start_time >= end_time");
        }
        if self.start_time < now {
            return bad("start_time in the past");
        }
        if self.hard_cap == 0 {
            return bad("hard_cap must be > 0");
        }
        if self.soft_cap > self.hard_cap {
            return bad("soft_cap > hard_cap");
        }
        if self.unit_price == 0 {
            return bad("unit_price must be > 0");
        }
        if self.max_purchase == 0 || self.min_purchase > self.max_purchase {
            return bad("purchase bounds");
        }
        if self.sale_asset == self.payment_asset {
            return bad("sale and payment asset coincide");
        }
        Ok(())
    }

    pub fn is_native(&self) -> bool {
        self.payment_asset.is_native()
    }

    /// Sale tokens bought by `payment` at the fixed unit price (floored).
    pub fn tokens_for(&self, payment: Balance) -> Result<Balance, LaunchpadError> {
        mul_div(payment, UNIT, self.unit_price)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PoolPhase {
    Pending,
    Active,
    Ended,
    Finalized(Outcome),
}

/// Per-(pool, user) record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub contributed: Balance,
    pub token_allocation: Balance,
    pub claimed: Balance,
    pub refunded: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PoolStatus {
    pub is_active: bool,
    pub is_filled: bool,
    pub progress_bps: u128,
    pub total_raised: Balance,
    pub soft_cap: Balance,
    pub hard_cap: Balance,
    pub participants: usize,
    pub outcome: Option<Outcome>,
    pub tge_timestamp: Option<u64>,
    pub tokens_deposited: Balance,
}

#[derive(Clone, Debug, Default)]
struct PoolState {
    total_raised: Balance,
    total_allocated: Balance,
    outcome: Option<Outcome>,
    tge_ts: Option<u64>,
    whitelist_root: Option<Hash32>,
    tokens_deposited: Balance,
    tokens_withdrawn: Balance,
    funds_withdrawn: bool,
    participants: HashMap<Address, Participant>,
}

impl PoolState {
    fn participant(&self, who: &Address) -> Participant {
        self.participants.get(who).copied().unwrap_or_default()
    }

    fn put(&mut self, who: Address, prev: Option<Participant>) {
        match prev {
            Some(p) => self.participants.insert(who, p),
            None => self.participants.remove(&who),
        };
    }
}

pub struct SalePool<B: LaunchpadBackend> {
    id: PoolId,
    owner: Address,
    config: PoolConfig,
    vesting: VestingConfig,
    created_at: u64,
    backend: Arc<B>,
    stake_ledger: Arc<StakeLedger<B>>,
    verifier: Arc<dyn ProofVerifier>,
    state: RwLock<PoolState>,
    guard: AtomicGuard,
    events_tx: broadcast::Sender<LaunchpadEvent>,
}

impl<B: LaunchpadBackend> fmt::Debug for SalePool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.read();
        f.debug_struct("SalePool")
            .field("id", &self.id)
            .field("total_raised", &st.total_raised)
            .field("outcome", &st.outcome)
            .field("participants", &st.participants.len())
            .finish()
    }
}

impl<B: LaunchpadBackend> SalePool<B> {
    pub fn new(
        id: PoolId,
        owner: Address,
        config: PoolConfig,
        vesting: VestingConfig,
        backend: Arc<B>,
        stake_ledger: Arc<StakeLedger<B>>,
        verifier: Arc<dyn ProofVerifier>,
        events_tx: broadcast::Sender<LaunchpadEvent>,
    ) -> Result<Arc<Self>, LaunchpadError> {
        let now = backend.now_unix();
        config.validate(now)?;
        vesting.validate()?;
        Ok(Arc::new(Self {
            id,
            owner,
            config,
            vesting,
            created_at: now,
            backend,
            stake_ledger,
            verifier,
            state: RwLock::new(PoolState::default()),
            guard: AtomicGuard::new(),
            events_tx,
        }))
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Escrow account for payments and sale tokens.
    pub fn account(&self) -> Address {
        self.id.account()
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn vesting(&self) -> &VestingConfig {
        &self.vesting
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn stake_ledger(&self) -> &Arc<StakeLedger<B>> {
        &self.stake_ledger
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LaunchpadEvent> {
        self.events_tx.subscribe()
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

    fn resolve_payment(&self, native_value: Balance, amount: Balance) -> Result<Balance, LaunchpadError> {
        let paid = if self.config.is_native() {
            native_value
        } else {
            if native_value > 0 {
                return Err(LaunchpadError::InvalidPayment);
            }
            amount
        };
        if paid == 0 {
            return Err(LaunchpadError::InvalidAmount);
        }
        Ok(paid)
    }

    /// Buy into the sale. Native pools take `native_value`, token pools take `amount`.
    pub fn participate(
        &self,
        payer: Address,
        native_value: Balance,
        amount: Balance,
        proof: &[Hash32],
    ) -> Result<Participant, LaunchpadError> {
        let _scope = self.guard.enter()?;
        let now = self.now();
        if now < self.config.start_time {
            return Err(LaunchpadError::SaleNotStarted);
        }
        if now > self.config.end_time {
            return Err(LaunchpadError::SaleEnded);
        }

        let paid = self.resolve_payment(native_value, amount)?;
        if paid < self.config.min_purchase {
            return Err(LaunchpadError::BelowMinPurchase);
        }

        let (prev, raised, allocated, root) = {
            let st = self.state.read();
            (st.participants.get(&payer).copied(), st.total_raised, st.total_allocated, st.whitelist_root)
        };
        let new_raised = raised.checked_add(paid).ok_or(LaunchpadError::MathOverflow)?;
        if new_raised > self.config.hard_cap {
            return Err(LaunchpadError::HardCapReached);
        }

        let tier = self.stake_ledger.tier_of(payer);
        if self.config.require_whitelist {
            let root = root.ok_or(LaunchpadError::InvalidMerkleProof)?;
            if !self.verifier.verify(proof, &root, &leaf_hash(&payer)) {
                debug!(pool = %self.id, payer = %payer, "whitelist proof rejected");
                return Err(LaunchpadError::InvalidMerkleProof);
            }
        } else if tier < Tier::MIN_PARTICIPATING {
            return Err(LaunchpadError::InsufficientTier);
        }

        let ceiling = tier.max_allocation(self.config.max_purchase)?;
        let cur = prev.unwrap_or_default();
        let contributed = cur.contributed.checked_add(paid).ok_or(LaunchpadError::MathOverflow)?;
        if contributed > ceiling {
            return Err(LaunchpadError::ExceedsMaxPurchase);
        }
        let token_allocation = self.config.tokens_for(contributed)?;
        let bought = token_allocation - cur.token_allocation;
        let next = Participant { contributed, token_allocation, ..cur };
        let new_allocated = allocated.checked_add(bought).ok_or(LaunchpadError::MathOverflow)?;

        {
            let mut st = self.state.write();
            st.participants.insert(payer, next);
            st.total_raised = new_raised;
            st.total_allocated = new_allocated;
        }
        if let Err(e) = self
            .backend
            .transfer_from(self.config.payment_asset, payer, self.account(), paid)
        {
            let mut st = self.state.write();
            st.put(payer, prev);
            st.total_raised = raised;
            st.total_allocated = allocated;
            warn!(pool = %self.id, payer = %payer, paid, error = %e, "payment pull failed");
            return Err(e.into());
        }

        info!(pool = %self.id, payer = %payer, paid, bought, %tier, total_raised = new_raised, "contributed");
        let _ = self.events_tx.send(LaunchpadEvent::Contributed {
            pool: self.id,
            buyer: payer,
            amount: paid,
            allocation: bought,
            tier,
        });
        Ok(next)
    }

    /// Close the sale. Success anchors vesting at the current time.
    pub fn finalize(&self, caller: Address) -> Result<Outcome, LaunchpadError> {
        let _scope = self.guard.enter()?;
        self.ensure_owner(caller)?;
        let now = self.now();
        let mut st = self.state.write();
        if st.outcome.is_some() {
            return Err(LaunchpadError::AlreadyFinalized);
        }
        if now <= self.config.end_time {
            return Err(LaunchpadError::SaleNotEnded);
        }

        let outcome = if st.total_raised >= self.config.soft_cap { Outcome::Success } else { Outcome::Failed };
        st.outcome = Some(outcome);
        if outcome == Outcome::Success {
            st.tge_ts = Some(now);
        }
        let total_raised = st.total_raised;
        drop(st);

        info!(pool = %self.id, ?outcome, total_raised, "finalized");
        let _ = self.events_tx.send(LaunchpadEvent::Finalized { pool: self.id, outcome, total_raised });
        Ok(outcome)
    }

    /// Release whatever vested since the last claim.
    pub fn claim(&self, caller: Address) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        let now = self.now();
        let (prev, tge_ts) = {
            let st = self.state.read();
            match st.outcome {
                None => return Err(LaunchpadError::NotFinalized),
                Some(Outcome::Failed) => return Err(LaunchpadError::SaleFailed),
                Some(Outcome::Success) => {}
            }
            if st.tokens_deposited == 0 {
                return Err(LaunchpadError::TokensNotDeposited);
            }
            (st.participant(&caller), st.tge_ts)
        };
        if prev.contributed == 0 {
            return Err(LaunchpadError::NoContribution);
        }

        let vested = self.vesting.vested_amount(prev.token_allocation, tge_ts, now)?;
        if vested <= prev.claimed {
            return Err(LaunchpadError::NothingToClaim);
        }
        let delta = vested - prev.claimed;

        self.state.write().participants.insert(caller, Participant { claimed: vested, ..prev });
        if let Err(e) = self
            .backend
            .transfer(self.config.sale_asset, self.account(), caller, delta)
        {
            self.state.write().participants.insert(caller, prev);
            warn!(pool = %self.id, who = %caller, delta, error = %e, "claim payout failed");
            return Err(e.into());
        }

        info!(pool = %self.id, who = %caller, amount = delta, claimed = vested, "claimed");
        let _ = self.events_tx.send(LaunchpadEvent::Claimed { pool: self.id, beneficiary: caller, amount: delta });
        Ok(delta)
    }

    /// Return the full contribution of a failed sale, once.
    pub fn refund(&self, caller: Address) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        let prev = {
            let st = self.state.read();
            match st.outcome {
                None => return Err(LaunchpadError::NotFinalized),
                Some(Outcome::Success) => return Err(LaunchpadError::RefundUnavailable),
                Some(Outcome::Failed) => {}
            }
            st.participant(&caller)
        };
        if prev.contributed == 0 {
            return Err(LaunchpadError::NoContribution);
        }
        if prev.refunded {
            return Err(LaunchpadError::AlreadyRefunded);
        }

        let amount = prev.contributed;
        self.state.write().participants.insert(caller, Participant { refunded: true, ..prev });
        if let Err(e) = self
            .backend
            .transfer(self.config.payment_asset, self.account(), caller, amount)
        {
            self.state.write().participants.insert(caller, prev);
            warn!(pool = %self.id, who = %caller, amount, error = %e, "refund payout failed");
            return Err(e.into());
        }

        info!(pool = %self.id, who = %caller, amount, "refunded");
        let _ = self.events_tx.send(LaunchpadEvent::Refunded { pool: self.id, buyer: caller, amount });
        Ok(amount)
    }

    /// Owner escrows sale tokens for claims.
    pub fn deposit_tokens(&self, caller: Address, amount: Balance) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        self.ensure_owner(caller)?;
        if amount == 0 {
            return Err(LaunchpadError::InvalidAmount);
        }
        let before = self.state.read().tokens_deposited;
        let after = before.checked_add(amount).ok_or(LaunchpadError::MathOverflow)?;

        self.state.write().tokens_deposited = after;
        if let Err(e) = self
            .backend
            .transfer_from(self.config.sale_asset, caller, self.account(), amount)
        {
            self.state.write().tokens_deposited = before;
            warn!(pool = %self.id, amount, error = %e, "token deposit failed");
            return Err(e.into());
        }

        info!(pool = %self.id, amount, deposited = after, "sale tokens deposited");
        let _ = self.events_tx.send(LaunchpadEvent::TokensDeposited { pool: self.id, amount });
        Ok(after)
    }

    /// Owner collects the raise of a successful sale.
    pub fn withdraw_funds(&self, caller: Address, destination: Address) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        self.ensure_owner(caller)?;
        if destination.is_zero() {
            return Err(LaunchpadError::InvalidAddress);
        }
        let amount = {
            let st = self.state.read();
            match st.outcome {
                None => return Err(LaunchpadError::NotFinalized),
                Some(Outcome::Failed) => return Err(LaunchpadError::SaleFailed),
                Some(Outcome::Success) => {}
            }
            if st.funds_withdrawn || st.total_raised == 0 {
                return Err(LaunchpadError::NothingToWithdraw);
            }
            st.total_raised
        };

        self.state.write().funds_withdrawn = true;
        if let Err(e) = self
            .backend
            .transfer(self.config.payment_asset, self.account(), destination, amount)
        {
            self.state.write().funds_withdrawn = false;
            warn!(pool = %self.id, amount, error = %e, "raise withdrawal failed");
            return Err(e.into());
        }

        info!(pool = %self.id, to = %destination, amount, "raise withdrawn");
        let _ = self.events_tx.send(LaunchpadEvent::FundsWithdrawn { pool: self.id, to: destination, amount });
        Ok(amount)
    }

    /// Owner recovers sale tokens not owed to any participant.
    pub fn withdraw_unsold_tokens(&self, caller: Address, destination: Address) -> Result<Balance, LaunchpadError> {
        let _scope = self.guard.enter()?;
        self.ensure_owner(caller)?;
        if destination.is_zero() {
            return Err(LaunchpadError::InvalidAddress);
        }
        let (withdrawn, amount) = {
            let st = self.state.read();
            let owed = match st.outcome {
                None => return Err(LaunchpadError::NotFinalized),
                Some(Outcome::Success) => st.total_allocated,
                Some(Outcome::Failed) => 0,
            };
            let committed = st.tokens_withdrawn.saturating_add(owed);
            (st.tokens_withdrawn, st.tokens_deposited.saturating_sub(committed))
        };
        if amount == 0 {
            return Err(LaunchpadError::NothingToWithdraw);
        }

        self.state.write().tokens_withdrawn = withdrawn + amount;
        if let Err(e) = self
            .backend
            .transfer(self.config.sale_asset, self.account(), destination, amount)
        {
            self.state.write().tokens_withdrawn = withdrawn;
            warn!(pool = %self.id, amount, error = %e, "unsold token withdrawal failed");
            return Err(e.into());
        }

        info!(pool = %self.id, to = %destination, amount, "unsold tokens withdrawn");
        let _ = self.events_tx.send(LaunchpadEvent::UnsoldTokensWithdrawn { pool: self.id, to: destination, amount });
        Ok(amount)
    }

    pub fn set_whitelist_root(&self, caller: Address, root: Hash32) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        self.state.write().whitelist_root = Some(root);
        info!(pool = %self.id, root = %hex::encode(root), "whitelist root set");
        let _ = self.events_tx.send(LaunchpadEvent::WhitelistRootSet { pool: self.id });
        Ok(())
    }

    // ---------- Views ----------

    pub fn phase(&self) -> PoolPhase {
        let now = self.now();
        let st = self.state.read();
        if let Some(o) = st.outcome {
            return PoolPhase::Finalized(o);
        }
        if now < self.config.start_time {
            PoolPhase::Pending
        } else if now > self.config.end_time || st.total_raised >= self.config.hard_cap {
            PoolPhase::Ended
        } else {
            PoolPhase::Active
        }
    }

    pub fn pool_status(&self) -> PoolStatus {
        let now = self.now();
        let st = self.state.read();
        let raised = st.total_raised;
        let in_window = now >= self.config.start_time && now <= self.config.end_time;
        PoolStatus {
            is_active: in_window && raised < self.config.hard_cap,
            is_filled: raised >= self.config.hard_cap,
            progress_bps: mul_div(raised, BPS_DENOM, self.config.hard_cap).unwrap_or(BPS_DENOM),
            total_raised: raised,
            soft_cap: self.config.soft_cap,
            hard_cap: self.config.hard_cap,
            participants: st.participants.len(),
            outcome: st.outcome,
            tge_timestamp: st.tge_ts,
            tokens_deposited: st.tokens_deposited,
        }
    }

    pub fn participant(&self, who: Address) -> Participant {
        self.state.read().participant(&who)
    }

    pub fn total_raised(&self) -> Balance {
        self.state.read().total_raised
    }

    pub fn tge_timestamp(&self) -> Option<u64> {
        self.state.read().tge_ts
    }

    pub fn whitelist_root(&self) -> Option<Hash32> {
        self.state.read().whitelist_root
    }

    /// Vested portion of `total` at `now` under this pool's schedule.
    pub fn vested_amount(&self, total: Balance, now: u64) -> Result<Balance, LaunchpadError> {
        self.vesting.vested_amount(total, self.tge_timestamp(), now)
    }

    pub fn claimable(&self, who: Address) -> Result<Balance, LaunchpadError> {
        let p = self.participant(who);
        let vested = self.vested_amount(p.token_allocation, self.now())?;
        Ok(vested.saturating_sub(p.claimed))
    }

    /// Purchase ceiling for `who` given their current tier.
    pub fn allocation_ceiling(&self, who: Address) -> Result<Balance, LaunchpadError> {
        self.stake_ledger.tier_of(who).max_allocation(self.config.max_purchase)
    }
}
