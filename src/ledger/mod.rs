// src/ledger/mod.rs

//! Per-session credit accounting.
//!
//! [`Ledger`] is the one piece of state shared by concurrently running task
//! attempts. Every operation takes the same lock, so "check balance, then
//! deduct" is a single indivisible step and two attempts can never jointly
//! overspend an account.
//!
//! - [`account`] holds the account and transaction records.
//! - [`store`] is the bounded session cache with optional on-disk spill.
//! - [`cost`] is the cost model (estimates and compounding retry costs).

pub mod account;
pub mod cost;
pub mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use account::{Account, Memo, Transaction, TransactionKind};
pub use store::SessionStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown ledger session '{0}'")]
    UnknownSession(String),

    #[error("amount must be positive (got {0})")]
    InvalidAmount(u64),

    #[error("initial budget must be positive")]
    InvalidBudget,

    #[error("insufficient funds in session '{session}': required {required}, available {available}")]
    InsufficientFunds {
        session: String,
        required: u64,
        available: u64,
    },

    #[error("nothing to refund in session '{0}'")]
    NothingToRefund(String),

    #[error("ledger session '{0}' already exists")]
    AccountExists(String),

    #[error("ledger persistence failed: {0}")]
    Persist(String),
}

/// Aggregated view of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub session_id: String,
    pub initial_budget: u64,
    pub current_balance: u64,
    pub total_spent: u64,
    /// `total_spent / initial_budget`.
    pub budget_utilization: f64,
    pub total_transactions: usize,
    pub total_charges: u64,
    pub total_refunds: u64,
    pub spending_by_agent: BTreeMap<String, u64>,
    pub spending_by_task: BTreeMap<String, u64>,
    pub spending_by_type: BTreeMap<String, u64>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl LedgerSummary {
    pub fn from_account(account: &Account) -> Self {
        let total_charges = account
            .transactions
            .iter()
            .filter(|t| t.amount > 0)
            .map(|t| t.amount as u64)
            .sum();
        let total_refunds = account
            .transactions
            .iter()
            .filter(|t| t.amount < 0)
            .map(|t| t.amount.unsigned_abs())
            .sum();

        Self {
            session_id: account.session_id.clone(),
            initial_budget: account.initial_budget,
            current_balance: account.current_balance,
            total_spent: account.total_spent,
            budget_utilization: account.budget_utilization(),
            total_transactions: account.transactions.len(),
            total_charges,
            total_refunds,
            spending_by_agent: account.spending_by_agent(),
            spending_by_task: account.spending_by_task(),
            spending_by_type: account.spending_by_type(),
            created_at: account.created_at,
            last_activity: account.last_activity,
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    store: SessionStore,
    tx_counter: u64,
}

impl LedgerState {
    fn next_tx_id(&mut self) -> String {
        self.tx_counter += 1;
        format!("tx-{:06}", self.tx_counter)
    }
}

/// Thread-safe credit ledger, shared as `Arc<Ledger>`.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Ledger {
    /// In-memory ledger keeping at most `capacity` accounts.
    pub fn new(capacity: usize) -> Self {
        Self::with_store(SessionStore::new(capacity, None))
    }

    /// Ledger that writes evicted accounts to `dir`.
    pub fn with_persist_dir(capacity: usize, dir: impl Into<PathBuf>) -> Self {
        Self::with_store(SessionStore::new(capacity, Some(dir.into())))
    }

    fn with_store(store: SessionStore) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                store,
                tx_counter: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // A panic while holding the lock cannot leave an account half-updated:
        // balance and spent are adjusted together before any fallible step.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create_account(
        &self,
        session: &str,
        initial_budget: u64,
    ) -> Result<Account, LedgerError> {
        if initial_budget == 0 {
            return Err(LedgerError::InvalidBudget);
        }
        let mut state = self.lock();
        if state.store.contains(session) {
            return Err(LedgerError::AccountExists(session.to_string()));
        }
        let account = Account::new(session, initial_budget);
        state.store.insert(account.clone())?;
        debug!(session = %session, initial_budget, "created ledger account");
        Ok(account)
    }

    pub fn get_or_create_account(
        &self,
        session: &str,
        initial_budget: u64,
    ) -> Result<Account, LedgerError> {
        if let Some(account) = self.account(session) {
            return Ok(account);
        }
        self.create_account(session, initial_budget)
    }

    /// Snapshot of an account.
    pub fn account(&self, session: &str) -> Option<Account> {
        self.lock().store.get(session).cloned()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.lock().store.session_ids()
    }

    /// Deduct `amount` atomically. Fails without side effects when the
    /// balance is insufficient; the caller must not proceed with the costed
    /// operation in that case.
    pub fn charge(
        &self,
        session: &str,
        amount: u64,
        memo: Memo,
    ) -> Result<Transaction, LedgerError> {
        let mut state = self.lock();
        let tx_id = state.next_tx_id();
        let account = state
            .store
            .get_mut(session)
            .ok_or_else(|| LedgerError::UnknownSession(session.to_string()))?;

        match account.charge(tx_id, amount, memo) {
            Ok(tx) => {
                debug!(
                    session = %session,
                    tx = %tx.id,
                    kind = %tx.kind,
                    amount,
                    balance = account.current_balance,
                    "ledger charge"
                );
                Ok(tx)
            }
            Err(e) => {
                warn!(session = %session, amount, error = %e, "ledger charge rejected");
                Err(e)
            }
        }
    }

    /// Refund up to `amount`, capped at the account's total spent.
    /// Returns the amount actually refunded. The memo's kind is ignored; the
    /// entry is always recorded as a refund.
    pub fn refund(&self, session: &str, amount: u64, memo: Memo) -> Result<u64, LedgerError> {
        let mut state = self.lock();
        let tx_id = state.next_tx_id();
        let account = state
            .store
            .get_mut(session)
            .ok_or_else(|| LedgerError::UnknownSession(session.to_string()))?;

        let (refunded, tx) = account.refund(tx_id, amount, memo)?;
        debug!(
            session = %session,
            tx = %tx.id,
            requested = amount,
            refunded,
            balance = account.current_balance,
            "ledger refund"
        );
        Ok(refunded)
    }

    /// Non-mutating pre-flight query. Unknown sessions cannot afford anything.
    pub fn check_budget(&self, session: &str, amount: u64) -> bool {
        self.lock()
            .store
            .get(session)
            .is_some_and(|a| a.can_afford(amount))
    }

    pub fn balance(&self, session: &str) -> Option<u64> {
        self.lock().store.get(session).map(|a| a.current_balance)
    }

    pub fn spending_by_agent(&self, session: &str) -> BTreeMap<String, u64> {
        self.lock()
            .store
            .get(session)
            .map(Account::spending_by_agent)
            .unwrap_or_default()
    }

    pub fn spending_by_task(&self, session: &str) -> BTreeMap<String, u64> {
        self.lock()
            .store
            .get(session)
            .map(Account::spending_by_task)
            .unwrap_or_default()
    }

    pub fn spending_by_type(&self, session: &str) -> BTreeMap<String, u64> {
        self.lock()
            .store
            .get(session)
            .map(Account::spending_by_type)
            .unwrap_or_default()
    }

    /// Transactions newest first, optionally truncated to `limit`.
    pub fn transaction_history(&self, session: &str, limit: Option<usize>) -> Vec<Transaction> {
        let state = self.lock();
        let Some(account) = state.store.get(session) else {
            return Vec::new();
        };
        let newest_first = account.transactions.iter().rev().cloned();
        match limit {
            Some(n) => newest_first.take(n).collect(),
            None => newest_first.collect(),
        }
    }

    pub fn summary(&self, session: &str) -> Option<LedgerSummary> {
        self.lock().store.get(session).map(LedgerSummary::from_account)
    }

    /// Remove accounts with no activity within `max_age`.
    pub fn cleanup_inactive(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        self.lock().store.remove_inactive(cutoff)
    }

    /// Write an account to the persist directory.
    pub fn persist_account(&self, session: &str) -> Result<PathBuf, LedgerError> {
        let state = self.lock();
        let account = state
            .store
            .get(session)
            .ok_or_else(|| LedgerError::UnknownSession(session.to_string()))?;
        state.store.persist(account)
    }

    /// Bring a persisted account back into the cache. Returns `false` when
    /// there is nothing on disk for `session`.
    pub fn load_account(&self, session: &str) -> Result<bool, LedgerError> {
        let mut state = self.lock();
        if state.store.contains(session) {
            return Ok(true);
        }
        match state.store.load(session)? {
            Some(account) => {
                state.store.insert(account)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
