//! In-memory backend shared by unit tests.

use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crate::{Address, AssetId, Balance, LaunchpadBackend, LedgerError};

pub const T0: u64 = 1_700_000_000;

pub fn addr(x: u8) -> Address {
    let mut a = [0u8; 20];
    a[0] = x;
    Address(a)
}

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct MockBackend {
    now: AtomicU64,
    // balances[(asset, address)]
    balances: RwLock<HashMap<(AssetId, Address), Balance>>,
    // n > 0: the n-th upcoming transfer fails
    fail_in: AtomicUsize,
    on_transfer: Mutex<Option<Hook>>,
}

impl MockBackend {
    pub fn new() -> Self {
        let b = Self::default();
        b.set_now(T0);
        b
    }

    pub fn set_now(&self, t: u64) {
        self.now.store(t, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn mint(&self, asset: AssetId, to: Address, amount: Balance) {
        let mut m = self.balances.write();
        *m.entry((asset, to)).or_default() += amount;
    }

    pub fn bal(&self, asset: AssetId, who: Address) -> Balance {
        *self.balances.read().get(&(asset, who)).unwrap_or(&0)
    }

    /// Next transfer fails with `LedgerError::Other` after running no side effects.
    pub fn fail_next_transfer(&self) {
        self.fail_nth_transfer(1);
    }

    /// Transfer number `n` from now (1 = next) fails; earlier ones go through.
    pub fn fail_nth_transfer(&self, n: usize) {
        self.fail_in.store(n, Ordering::SeqCst);
    }

    /// Runs once, from inside the next transfer, before balances move.
    pub fn on_next_transfer(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_transfer.lock() = Some(Box::new(hook));
    }

    fn before_transfer(&self) -> Result<(), LedgerError> {
        let hook = self.on_transfer.lock().take();
        if let Some(h) = hook {
            h();
        }
        let n = self.fail_in.load(Ordering::SeqCst);
        if n > 0 {
            self.fail_in.store(n - 1, Ordering::SeqCst);
            if n == 1 {
                return Err(LedgerError::Other("injected".into()));
            }
        }
        Ok(())
    }

    fn move_balance(&self, asset: AssetId, from: Address, to: Address, amount: Balance) -> Result<(), LedgerError> {
        let mut m = self.balances.write();
        let fb = m.entry((asset, from)).or_default();
        if *fb < amount {
            return Err(LedgerError::Insufficient);
        }
        *fb -= amount;
        *m.entry((asset, to)).or_default() += amount;
        Ok(())
    }
}

impl LaunchpadBackend for MockBackend {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn transfer_from(&self, asset: AssetId, payer: Address, recipient: Address, amount: Balance) -> Result<(), LedgerError> {
        self.before_transfer()?;
        self.move_balance(asset, payer, recipient, amount)
    }

    fn transfer(&self, asset: AssetId, holder: Address, recipient: Address, amount: Balance) -> Result<(), LedgerError> {
        self.before_transfer()?;
        self.move_balance(asset, holder, recipient, amount)
    }

    fn balance_of(&self, asset: AssetId, account: Address) -> Result<Balance, LedgerError> {
        Ok(self.bal(asset, account))
    }
}
