//! Credit account and transaction records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

/// Why credits moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// First attempt of a task.
    TaskExecution,
    /// A retry attempt of a task.
    TaskRetry,
    ApiCall,
    TimeoutPenalty,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::TaskExecution => "task_execution",
            TransactionKind::TaskRetry => "task_retry",
            TransactionKind::ApiCall => "api_call",
            TransactionKind::TimeoutPenalty => "timeout_penalty",
            TransactionKind::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive part of a ledger entry.
#[derive(Debug, Clone)]
pub struct Memo {
    pub kind: TransactionKind,
    pub description: String,
    pub task_id: Option<String>,
    pub agent: Option<String>,
}

impl Memo {
    pub fn new(kind: TransactionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            task_id: None,
            agent: None,
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>, agent: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.agent = Some(agent.into());
        self
    }
}

/// One immutable ledger entry. `amount` is positive for charges and negative
/// for refunds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub session_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub task_id: Option<String>,
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Credit account of one session.
///
/// `current_balance == initial_budget - total_spent` holds after every
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub session_id: String,
    pub initial_budget: u64,
    pub current_balance: u64,
    pub total_spent: u64,
    pub transactions: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Logical clock value of the last touch; orders eviction.
    #[serde(default)]
    pub(crate) activity: u64,
}

impl Account {
    pub fn new(session_id: impl Into<String>, initial_budget: u64) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            initial_budget,
            current_balance: initial_budget,
            total_spent: 0,
            transactions: Vec::new(),
            created_at: now,
            last_activity: now,
            activity: 0,
        }
    }

    pub fn can_afford(&self, amount: u64) -> bool {
        self.current_balance >= amount
    }

    /// Deduct `amount`. Rejected (not clamped) when the balance is short.
    pub(crate) fn charge(
        &mut self,
        tx_id: String,
        amount: u64,
        memo: Memo,
    ) -> Result<Transaction, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if !self.can_afford(amount) {
            return Err(LedgerError::InsufficientFunds {
                session: self.session_id.clone(),
                required: amount,
                available: self.current_balance,
            });
        }

        self.current_balance -= amount;
        self.total_spent += amount;
        Ok(self.record(tx_id, memo.kind, amount as i64, memo))
    }

    /// Return up to `amount` credits, capped at what has been spent.
    /// Returns the amount actually refunded.
    pub(crate) fn refund(
        &mut self,
        tx_id: String,
        amount: u64,
        memo: Memo,
    ) -> Result<(u64, Transaction), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let refunded = amount.min(self.total_spent);
        if refunded == 0 {
            return Err(LedgerError::NothingToRefund(self.session_id.clone()));
        }

        self.current_balance += refunded;
        self.total_spent -= refunded;
        let tx = self.record(tx_id, TransactionKind::Refund, -(refunded as i64), memo);
        Ok((refunded, tx))
    }

    fn record(&mut self, id: String, kind: TransactionKind, amount: i64, memo: Memo) -> Transaction {
        let tx = Transaction {
            id,
            session_id: self.session_id.clone(),
            kind,
            amount,
            description: memo.description,
            task_id: memo.task_id,
            agent: memo.agent,
            timestamp: Utc::now(),
        };
        self.transactions.push(tx.clone());
        self.last_activity = tx.timestamp;
        tx
    }

    fn charges(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.amount > 0)
    }

    /// Charged credits per agent; refunds are not netted out.
    pub fn spending_by_agent(&self) -> BTreeMap<String, u64> {
        let mut spending = BTreeMap::new();
        for tx in self.charges() {
            if let Some(agent) = &tx.agent {
                *spending.entry(agent.clone()).or_insert(0) += tx.amount as u64;
            }
        }
        spending
    }

    /// Charged credits per task; refunds are not netted out.
    pub fn spending_by_task(&self) -> BTreeMap<String, u64> {
        let mut spending = BTreeMap::new();
        for tx in self.charges() {
            if let Some(task) = &tx.task_id {
                *spending.entry(task.clone()).or_insert(0) += tx.amount as u64;
            }
        }
        spending
    }

    pub fn spending_by_type(&self) -> BTreeMap<String, u64> {
        let mut spending = BTreeMap::new();
        for tx in self.charges() {
            *spending.entry(tx.kind.as_str().to_string()).or_insert(0) += tx.amount as u64;
        }
        spending
    }

    /// Fraction of the initial budget currently spent.
    pub fn budget_utilization(&self) -> f64 {
        if self.initial_budget == 0 {
            return 0.0;
        }
        self.total_spent as f64 / self.initial_budget as f64
    }
}
