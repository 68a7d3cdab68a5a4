//! Outbound fund movement.
//!
//! The ledger pays owners, refunds contributors and hands commission to the
//! operator through a [`CreditSink`]. A credit is a completed accounting
//! effect: the sink must record it before returning and cannot refuse it.
//! Credits are issued while ledger locks are held, so a sink must never call
//! back into the ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Amount, CreditReason, Identity};

pub trait CreditSink: Send + Sync {
    fn credit(&self, to: &Identity, amount: Amount, reason: CreditReason);
}

impl<T: CreditSink + ?Sized> CreditSink for Arc<T> {
    fn credit(&self, to: &Identity, amount: Amount, reason: CreditReason) {
        (**self).credit(to, amount, reason)
    }
}

/// Internal balance table: identity -> total amount credited.
#[derive(Debug, Default)]
pub struct BalanceBook {
    balances: Mutex<BTreeMap<Identity, Amount>>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, who: &Identity) -> Amount {
        self.balances.lock().get(who).copied().unwrap_or(0)
    }

    /// Sum of every balance.
    pub fn total(&self) -> Amount {
        self.balances.lock().values().sum()
    }

    pub fn snapshot(&self) -> BTreeMap<Identity, Amount> {
        self.balances.lock().clone()
    }
}

impl CreditSink for BalanceBook {
    fn credit(&self, to: &Identity, amount: Amount, _reason: CreditReason) {
        let mut balances = self.balances.lock();
        let balance = balances.entry(to.clone()).or_insert(0);
        // Everything credited came out of ledger custody, which is overflow-checked.
        *balance = balance.saturating_add(amount);
    }
}
