//! Pool registry: deterministic identities, one pool per salt.
//!
//! identity = SHA-256(domain || factory || salt || SHA-256(config || vesting || stake ledger || owner))
//!
//! The pool list only grows; pools keep the stake ledger they were created with.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    error::LaunchpadError,
    events::LaunchpadEvent,
    ledger::LaunchpadBackend,
    merkle::{Hash32, ProofVerifier},
    pool::{PoolConfig, SalePool},
    staking::StakeLedger,
    vesting::VestingConfig,
    Address, PoolId, Salt,
};

const IDENTITY_DOMAIN: &[u8] = b"tierpad/pool-identity/v1";
const INIT_DOMAIN: &[u8] = b"tierpad/pool-init/v1";

/// Hash of everything a pool is constructed from, in fixed big-endian layout.
pub fn init_digest(config: &PoolConfig, vesting: &VestingConfig, stake_ledger: Address, owner: Address) -> Hash32 {
    let mut h = Sha256::new();
    h.update(INIT_DOMAIN);
    h.update(config.sale_asset.0.to_be_bytes());
    h.update(config.payment_asset.0.to_be_bytes());
    h.update(config.unit_price.to_be_bytes());
    h.update(config.soft_cap.to_be_bytes());
    h.update(config.hard_cap.to_be_bytes());
    h.update(config.min_purchase.to_be_bytes());
    h.update(config.max_purchase.to_be_bytes());
    h.update(config.start_time.to_be_bytes());
    h.update(config.end_time.to_be_bytes());
    h.update([config.require_whitelist as u8]);
    h.update(vesting.tge_bps.to_be_bytes());
    h.update(vesting.cliff_secs.to_be_bytes());
    h.update(vesting.vesting_secs.to_be_bytes());
    h.update(vesting.slice_secs.to_be_bytes());
    h.update(stake_ledger.0);
    h.update(owner.0);
    h.finalize().into()
}

pub fn derive_identity(factory: Address, salt: &Salt, init: &Hash32) -> PoolId {
    let mut h = Sha256::new();
    h.update(IDENTITY_DOMAIN);
    h.update(factory.0);
    h.update(salt.0);
    h.update(init);
    PoolId(h.finalize().into())
}

struct PoolStore<B: LaunchpadBackend> {
    order: Vec<PoolId>,
    by_salt: HashMap<Salt, PoolId>,
    pools: HashMap<PoolId, Arc<SalePool<B>>>,
}

pub struct PoolRegistry<B: LaunchpadBackend> {
    factory: Address,
    owner: Address,
    backend: Arc<B>,
    verifier: Arc<dyn ProofVerifier>,
    stake_ledger: RwLock<Arc<StakeLedger<B>>>,
    paused: RwLock<bool>,
    store: RwLock<PoolStore<B>>,
    events_tx: broadcast::Sender<LaunchpadEvent>,
}

impl<B: LaunchpadBackend> fmt::Debug for PoolRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("factory", &self.factory)
            .field("pools", &self.store.read().order.len())
            .finish()
    }
}

impl<B: LaunchpadBackend> PoolRegistry<B> {
    pub fn new(
        backend: Arc<B>,
        factory: Address,
        owner: Address,
        stake_ledger: Arc<StakeLedger<B>>,
        verifier: Arc<dyn ProofVerifier>,
        event_capacity: usize,
    ) -> Arc<Self> {
        let (tx, _) = broadcast::channel(event_capacity.max(1));
        Arc::new(Self {
            factory,
            owner,
            backend,
            verifier,
            stake_ledger: RwLock::new(stake_ledger),
            paused: RwLock::new(false),
            store: RwLock::new(PoolStore { order: Vec::new(), by_salt: HashMap::new(), pools: HashMap::new() }),
            events_tx: tx,
        })
    }

    /// Registry and pool events share this channel.
    pub fn subscribe(&self) -> broadcast::Receiver<LaunchpadEvent> {
        self.events_tx.subscribe()
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn stake_ledger(&self) -> Arc<StakeLedger<B>> {
        self.stake_ledger.read().clone()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.read()
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), LaunchpadError> {
        if caller != self.owner {
            return Err(LaunchpadError::NotAuthorized);
        }
        Ok(())
    }

    /// Identity `create_pool` would assign for these inputs under the current binding.
    pub fn compute_identity(&self, config: &PoolConfig, vesting: &VestingConfig, salt: &Salt) -> PoolId {
        let ledger = self.stake_ledger.read().account();
        derive_identity(self.factory, salt, &init_digest(config, vesting, ledger, self.owner))
    }

    pub fn create_pool(
        &self,
        caller: Address,
        config: PoolConfig,
        vesting: VestingConfig,
        salt: Salt,
    ) -> Result<PoolId, LaunchpadError> {
        self.ensure_owner(caller)?;
        if self.is_paused() {
            return Err(LaunchpadError::RegistryPaused);
        }
        config.validate(self.backend.now_unix())?;
        vesting.validate()?;

        let mut store = self.store.write();
        if store.by_salt.contains_key(&salt) {
            debug!(salt = ?salt, "salt already consumed");
            return Err(LaunchpadError::PoolAlreadyExists);
        }
        let ledger = self.stake_ledger();
        let id = derive_identity(self.factory, &salt, &init_digest(&config, &vesting, ledger.account(), self.owner));
        if store.pools.contains_key(&id) {
            return Err(LaunchpadError::PoolAlreadyExists);
        }

        let pool = SalePool::new(
            id,
            self.owner,
            config,
            vesting,
            self.backend.clone(),
            ledger,
            self.verifier.clone(),
            self.events_tx.clone(),
        )?;
        let index = store.order.len();
        store.order.push(id);
        store.by_salt.insert(salt, id);
        store.pools.insert(id, pool);
        drop(store);

        info!(pool = %id, index, "pool created");
        let _ = self.events_tx.send(LaunchpadEvent::PoolCreated { pool: id, salt, index });
        Ok(id)
    }

    /// Creation-ordered page; empty once `offset` passes the end.
    pub fn list_pools(&self, offset: usize, limit: usize) -> Vec<PoolId> {
        let store = self.store.read();
        store.order.iter().skip(offset).take(limit).copied().collect()
    }

    pub fn pool_count(&self) -> usize {
        self.store.read().order.len()
    }

    pub fn pool(&self, id: &PoolId) -> Option<Arc<SalePool<B>>> {
        self.store.read().pools.get(id).cloned()
    }

    pub fn is_pool(&self, id: &PoolId) -> bool {
        self.store.read().pools.contains_key(id)
    }

    pub fn pool_by_salt(&self, salt: &Salt) -> Option<PoolId> {
        self.store.read().by_salt.get(salt).copied()
    }

    // ---------- Admin ----------

    /// Rebind future pools; existing pools keep their ledger.
    pub fn set_stake_ledger(&self, caller: Address, ledger: Arc<StakeLedger<B>>) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        let account = ledger.account();
        *self.stake_ledger.write() = ledger;
        info!(account = %account, "stake ledger rebound");
        let _ = self.events_tx.send(LaunchpadEvent::StakeLedgerChanged { account });
        Ok(())
    }

    pub fn set_paused(&self, caller: Address, paused: bool) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        *self.paused.write() = paused;
        info!(paused, "registry pause toggled");
        let _ = self.events_tx.send(LaunchpadEvent::RegistryPaused { paused });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        merkle::Sha256Verifier,
        pool::Outcome,
        staking::StakeParams,
        testing::{addr, MockBackend, T0},
        tier::{LockClass, Tier},
        AssetId, UNIT,
    };

    const STAKE: AssetId = AssetId(7);
    const SALE: AssetId = AssetId(100);

    struct Fx {
        be: Arc<MockBackend>,
        reg: Arc<PoolRegistry<MockBackend>>,
        owner: Address,
    }

    fn ledger(be: &Arc<MockBackend>, account: u8) -> Arc<StakeLedger<MockBackend>> {
        StakeLedger::new(be.clone(), addr(account), addr(0x01), STAKE, StakeParams::new(addr(0xFE)), 16).unwrap()
    }

    fn fx() -> Fx {
        let be = Arc::new(MockBackend::new());
        let owner = addr(0x02);
        let reg = PoolRegistry::new(be.clone(), addr(0xF0), owner, ledger(&be, 0xA0), Arc::new(Sha256Verifier), 64);
        Fx { be, reg, owner }
    }

    fn cfg() -> PoolConfig {
        PoolConfig {
            sale_asset: SALE,
            payment_asset: AssetId::NATIVE,
            unit_price: UNIT / 10,
            soft_cap: UNIT,
            hard_cap: 100 * UNIT,
            min_purchase: UNIT / 100,
            max_purchase: 5 * UNIT,
            start_time: T0 + 60,
            end_time: T0 + 3_600,
            require_whitelist: false,
        }
    }

    fn vesting() -> VestingConfig {
        VestingConfig { tge_bps: 2_000, cliff_secs: 30, vesting_secs: 240, slice_secs: 30 }
    }

    #[test]
    fn predicted_identity_matches_created() {
        let f = fx();
        let salt = Salt::from(1);
        let predicted = f.reg.compute_identity(&cfg(), &vesting(), &salt);
        assert_eq!(predicted, f.reg.compute_identity(&cfg(), &vesting(), &salt));

        let id = f.reg.create_pool(f.owner, cfg(), vesting(), salt).unwrap();
        assert_eq!(id, predicted);
        assert_eq!(f.reg.compute_identity(&cfg(), &vesting(), &salt), id);
        assert!(f.reg.is_pool(&id));
        assert_eq!(f.reg.pool_by_salt(&salt), Some(id));

        let pool = f.reg.pool(&id).unwrap();
        assert_eq!(pool.owner(), f.owner);
        assert_eq!(pool.account(), id.account());
        assert!(Arc::ptr_eq(pool.stake_ledger(), &f.reg.stake_ledger()));
    }

    #[test]
    fn identity_depends_on_every_input() {
        let f = fx();
        let base = f.reg.compute_identity(&cfg(), &vesting(), &Salt::from(1));
        assert_ne!(base, f.reg.compute_identity(&cfg(), &vesting(), &Salt::from(2)));

        let mut c = cfg();
        c.require_whitelist = true;
        assert_ne!(base, f.reg.compute_identity(&c, &vesting(), &Salt::from(1)));

        let mut v = vesting();
        v.slice_secs = 60;
        assert_ne!(base, f.reg.compute_identity(&cfg(), &v, &Salt::from(1)));

        let init = init_digest(&cfg(), &vesting(), addr(0xA0), f.owner);
        assert_ne!(derive_identity(addr(0xF0), &Salt::from(1), &init), derive_identity(addr(0xF1), &Salt::from(1), &init));
        assert_eq!(derive_identity(addr(0xF0), &Salt::from(1), &init), base);
    }

    #[test]
    fn salt_is_consumed_once() {
        let f = fx();
        let salt = Salt::from(9);
        f.reg.create_pool(f.owner, cfg(), vesting(), salt).unwrap();
        assert!(matches!(f.reg.create_pool(f.owner, cfg(), vesting(), salt), Err(LaunchpadError::PoolAlreadyExists)));

        let mut other = cfg();
        other.hard_cap = 50 * UNIT;
        assert!(matches!(f.reg.create_pool(f.owner, other, vesting(), salt), Err(LaunchpadError::PoolAlreadyExists)));
        assert_eq!(f.reg.pool_count(), 1);
    }

    #[test]
    fn creation_guards() {
        let f = fx();
        let mut bad = cfg();
        bad.soft_cap = bad.hard_cap + 1;
        assert!(matches!(f.reg.create_pool(f.owner, bad, vesting(), Salt::from(1)), Err(LaunchpadError::InvalidPoolConfig(_))));
        let mut late = cfg();
        late.start_time = T0 - 1;
        assert!(matches!(f.reg.create_pool(f.owner, late, vesting(), Salt::from(1)), Err(LaunchpadError::InvalidPoolConfig(_))));
        let mut v = vesting();
        v.tge_bps = 20_000;
        assert!(matches!(f.reg.create_pool(f.owner, cfg(), v, Salt::from(1)), Err(LaunchpadError::InvalidPoolConfig(_))));
        assert!(f.reg.pool_by_salt(&Salt::from(1)).is_none());

        assert!(matches!(f.reg.create_pool(addr(0x99), cfg(), vesting(), Salt::from(1)), Err(LaunchpadError::NotAuthorized)));
        f.reg.set_paused(f.owner, true).unwrap();
        assert!(matches!(f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(1)), Err(LaunchpadError::RegistryPaused)));
        f.reg.set_paused(f.owner, false).unwrap();
        f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(1)).unwrap();
    }

    #[test]
    fn pagination() {
        let f = fx();
        let ids: Vec<PoolId> = (0..5u64)
            .map(|i| f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(i)).unwrap())
            .collect();

        assert_eq!(f.reg.list_pools(0, 2), ids[..2].to_vec());
        assert_eq!(f.reg.list_pools(2, 2), ids[2..4].to_vec());
        assert_eq!(f.reg.list_pools(4, 10), ids[4..].to_vec());
        assert!(f.reg.list_pools(5, 1).is_empty());
        assert!(f.reg.list_pools(100, 1).is_empty());
        assert!(f.reg.list_pools(0, 0).is_empty());
        assert_eq!(f.reg.list_pools(0, usize::MAX), ids);
    }

    #[test]
    fn ledger_swap_affects_future_pools_only() {
        let f = fx();
        let old_ledger = f.reg.stake_ledger();
        let first = f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(1)).unwrap();

        let new_ledger = ledger(&f.be, 0xA1);
        let before = f.reg.compute_identity(&cfg(), &vesting(), &Salt::from(2));
        assert!(matches!(f.reg.set_stake_ledger(addr(0x99), new_ledger.clone()), Err(LaunchpadError::NotAuthorized)));
        f.reg.set_stake_ledger(f.owner, new_ledger.clone()).unwrap();
        assert_ne!(before, f.reg.compute_identity(&cfg(), &vesting(), &Salt::from(2)));

        let second = f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(2)).unwrap();
        assert!(Arc::ptr_eq(f.reg.pool(&first).unwrap().stake_ledger(), &old_ledger));
        assert!(Arc::ptr_eq(f.reg.pool(&second).unwrap().stake_ledger(), &new_ledger));
    }

    #[test]
    fn end_to_end_through_registry() {
        let f = fx();
        let u = addr(0x10);
        let sl = f.reg.stake_ledger();
        f.be.mint(STAKE, u, 5_000 * UNIT);
        sl.deposit(u, 5_000 * UNIT, LockClass::Days90).unwrap();
        assert_eq!(sl.tier_of(u), Tier::Gold);

        let mut rx = f.reg.subscribe();
        let id = f.reg.create_pool(f.owner, cfg(), vesting(), Salt::from(7)).unwrap();
        assert!(matches!(rx.try_recv(), Ok(LaunchpadEvent::PoolCreated { index: 0, .. })));
        let pool = f.reg.pool(&id).unwrap();

        f.be.mint(AssetId::NATIVE, u, 20 * UNIT);
        f.be.mint(SALE, f.owner, 200 * UNIT);
        f.be.set_now(T0 + 60);
        // gold: 3 × 5 = 15 native ceiling
        pool.participate(u, 15 * UNIT, 0, &[]).unwrap();
        assert!(matches!(pool.participate(u, UNIT, 0, &[]), Err(LaunchpadError::ExceedsMaxPurchase)));
        assert!(matches!(rx.try_recv(), Ok(LaunchpadEvent::Contributed { tier: Tier::Gold, .. })));
        assert_eq!(pool.participant(u).token_allocation, 150 * UNIT);
        pool.deposit_tokens(f.owner, 150 * UNIT).unwrap();

        let tge = T0 + 3_601;
        f.be.set_now(tge);
        assert_eq!(pool.finalize(f.owner).unwrap(), Outcome::Success);

        f.be.set_now(tge + 30);
        assert_eq!(pool.claim(u).unwrap(), 30 * UNIT);
        f.be.set_now(tge + 30 + 240 + 1);
        assert_eq!(pool.claim(u).unwrap(), 120 * UNIT);
        assert_eq!(f.be.bal(SALE, u), 150 * UNIT);
    }
}
