//! Bounded in-memory cache of accounts with optional on-disk spill.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::ledger::LedgerError;
use crate::ledger::account::Account;

/// Holds at most `capacity` accounts. Inserting into a full store evicts the
/// account whose last activity is oldest; with a `persist_dir` the evicted
/// account is written there first.
#[derive(Debug)]
pub struct SessionStore {
    accounts: HashMap<String, Account>,
    capacity: usize,
    persist_dir: Option<PathBuf>,
    clock: u64,
}

impl SessionStore {
    pub fn new(capacity: usize, persist_dir: Option<PathBuf>) -> Self {
        Self {
            accounts: HashMap::new(),
            capacity: capacity.max(1),
            persist_dir,
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, session: &str) -> bool {
        self.accounts.contains_key(session)
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.accounts.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, session: &str) -> Option<&Account> {
        self.accounts.get(session)
    }

    /// Mutable access; counts as activity for eviction ordering.
    pub fn get_mut(&mut self, session: &str) -> Option<&mut Account> {
        self.clock += 1;
        let clock = self.clock;
        let account = self.accounts.get_mut(session)?;
        account.activity = clock;
        Some(account)
    }

    /// Insert (or replace) an account, evicting the least recently active one
    /// if the store is full.
    pub fn insert(&mut self, mut account: Account) -> Result<(), LedgerError> {
        if !self.accounts.contains_key(&account.session_id) && self.accounts.len() >= self.capacity
        {
            self.evict_oldest()?;
        }
        self.clock += 1;
        account.activity = self.clock;
        self.accounts.insert(account.session_id.clone(), account);
        Ok(())
    }

    pub fn remove(&mut self, session: &str) -> Option<Account> {
        self.accounts.remove(session)
    }

    /// Evict the account with the oldest activity. Returns its session id.
    pub fn evict_oldest(&mut self) -> Result<Option<String>, LedgerError> {
        let oldest = self
            .accounts
            .values()
            .min_by_key(|a| a.activity)
            .map(|a| a.session_id.clone());

        let Some(session) = oldest else {
            return Ok(None);
        };

        if let Some(account) = self.accounts.get(&session) {
            if self.persist_dir.is_some() {
                self.persist(account)?;
            }
        }
        self.accounts.remove(&session);
        info!(session = %session, "evicted ledger account from session cache");
        Ok(Some(session))
    }

    /// Drop accounts idle since before `cutoff`. Returns how many were removed.
    pub fn remove_inactive(&mut self, cutoff: DateTime<Utc>) -> usize {
        let stale: Vec<String> = self
            .accounts
            .values()
            .filter(|a| a.last_activity < cutoff)
            .map(|a| a.session_id.clone())
            .collect();

        for session in &stale {
            self.accounts.remove(session);
            debug!(session = %session, "removed inactive ledger account");
        }
        stale.len()
    }

    /// Write an account as pretty JSON into the persist directory.
    pub fn persist(&self, account: &Account) -> Result<PathBuf, LedgerError> {
        let dir = self
            .persist_dir
            .as_deref()
            .ok_or_else(|| LedgerError::Persist("no ledger directory configured".to_string()))?;

        fs::create_dir_all(dir).map_err(|e| persist_error(dir, e))?;
        let path = account_path(dir, &account.session_id);
        let body = serde_json::to_string_pretty(account)
            .map_err(|e| LedgerError::Persist(format!("serializing account: {e}")))?;
        fs::write(&path, body).map_err(|e| persist_error(&path, e))?;

        debug!(session = %account.session_id, path = %path.display(), "persisted ledger account");
        Ok(path)
    }

    /// Read a previously persisted account back from disk, if present.
    pub fn load(&self, session: &str) -> Result<Option<Account>, LedgerError> {
        let Some(dir) = self.persist_dir.as_deref() else {
            return Ok(None);
        };

        let path = account_path(dir, session);
        if !path.exists() {
            return Ok(None);
        }

        let body = fs::read_to_string(&path).map_err(|e| persist_error(&path, e))?;
        match serde_json::from_str::<Account>(&body) {
            Ok(account) => Ok(Some(account)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable ledger account file");
                Err(LedgerError::Persist(format!("{}: {e}", path.display())))
            }
        }
    }
}

fn account_path(dir: &Path, session: &str) -> PathBuf {
    let safe: String = session
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{safe}.json"))
}

fn persist_error(path: &Path, err: std::io::Error) -> LedgerError {
    LedgerError::Persist(format!("{}: {err}", path.display()))
}
