// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ledger store contract and the in-memory reference implementation.
//!
//! [`LedgerStore`] is the persistence seam of the processor. Implementations
//! must make each save atomic, and must commit a withdrawal's paired writes
//! (terminal transaction status + account balance) inside one transactional
//! boundary: a crash must leave the transaction visibly `Pending`, never
//! `Completed` without its balance change or vice versa.
//!
//! [`MemoryStore`] keeps records in concurrent maps and realizes the
//! exclusive-access mode with one `tokio` mutex per account, acquired with a
//! bounded wait so contention surfaces as [`LedgerError::LockConflict`]
//! instead of blocking forever.

use crate::account::Account;
use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use crate::transaction::Transaction;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AccountLock, OwnedMutexGuard};
use tokio::time::timeout;

/// An account snapshot read under its exclusive lock.
///
/// The lock is released when this guard is dropped; hold it across the whole
/// check-then-act-then-save sequence.
#[derive(Debug)]
pub struct LockedAccount {
    pub account: Account,
    _guard: OwnedMutexGuard<()>,
}

impl LockedAccount {
    pub fn new(account: Account, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            account,
            _guard: guard,
        }
    }
}

/// Persistence contract for account and transaction records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Atomic create-on-first-reference. Returns the existing account when
    /// one is already present.
    async fn get_or_create_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Reads the account under its exclusive lock.
    ///
    /// Acquisition waits a bounded time; expiry surfaces as
    /// [`LedgerError::LockConflict`] so the retry controller can act.
    async fn get_account_locked(&self, id: AccountId)
    -> Result<Option<LockedAccount>, LedgerError>;

    /// Store-native atomic balance increment. Returns the new balance.
    ///
    /// The credit serializes with the exclusive account lock, the way a row
    /// `UPDATE` waits on a row lock: a credit must not land between a lock
    /// holder's read and its save.
    async fn apply_credit(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Persists the account. The store rejects negative balances and bumps
    /// the version counter.
    async fn save_account(&self, account: &Account) -> Result<(), LedgerError>;

    async fn transaction_exists(&self, id: TransactionId) -> Result<bool, LedgerError>;

    async fn get_transaction(&self, id: TransactionId)
    -> Result<Option<Transaction>, LedgerError>;

    /// Inserts a new transaction record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateTransaction`] if a record with the
    /// same id already exists. The check-and-insert is atomic: under
    /// concurrent duplicate submissions exactly one caller wins.
    async fn create_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Updates an existing transaction record (status transitions).
    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// All transaction records in first-seen order.
    async fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError>;
}

/// In-memory [`LedgerStore`] backed by concurrent maps.
#[derive(Debug)]
pub struct MemoryStore {
    /// Account records indexed by account id.
    accounts: DashMap<AccountId, Account>,
    /// Transaction records indexed by transaction id.
    transactions: DashMap<TransactionId, Transaction>,
    /// Transaction ids in first-seen order, for the audit trail.
    journal: Mutex<Vec<TransactionId>>,
    /// Exclusive per-account locks for check-then-act sequences.
    locks: DashMap<AccountId, Arc<AccountLock<()>>>,
    lock_wait: Duration,
}

impl MemoryStore {
    pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self::with_lock_wait(Self::DEFAULT_LOCK_WAIT)
    }

    /// Creates a store with a custom bound on exclusive-lock acquisition.
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            locks: DashMap::new(),
            lock_wait,
        }
    }

    fn lock_for(&self, id: AccountId) -> Arc<AccountLock<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(AccountLock::new(())))
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(self.accounts.get(&id).map(|a| a.value().clone()))
    }

    async fn get_or_create_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        // Entry API makes the create atomic: two racing first deposits see
        // the same record instead of clobbering each other.
        Ok(self
            .accounts
            .entry(id)
            .or_insert_with(|| Account::new(id))
            .value()
            .clone())
    }

    async fn get_account_locked(
        &self,
        id: AccountId,
    ) -> Result<Option<LockedAccount>, LedgerError> {
        let lock = self.lock_for(id);
        let guard = timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| LedgerError::LockConflict(id))?;

        // Read the record only after the lock is held, so the snapshot
        // cannot be stale with respect to other lock holders.
        match self.accounts.get(&id) {
            Some(account) => Ok(Some(LockedAccount::new(account.value().clone(), guard))),
            None => Ok(None),
        }
    }

    async fn apply_credit(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        // Take the account lock so the credit cannot be overwritten by a
        // withdrawal saving its locked snapshot.
        let lock = self.lock_for(id);
        let _guard = timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| LedgerError::LockConflict(id))?;
        match self.accounts.entry(id) {
            Entry::Occupied(mut entry) => {
                let account = entry.get_mut();
                account.balance += amount;
                account.version += 1;
                Ok(account.balance)
            }
            Entry::Vacant(_) => Err(LedgerError::AccountNotFound(id)),
        }
    }

    async fn save_account(&self, account: &Account) -> Result<(), LedgerError> {
        if account.balance < Decimal::ZERO {
            return Err(LedgerError::Store(format!(
                "refusing to save negative balance {} for account {}",
                account.balance, account.id
            )));
        }
        let mut saved = account.clone();
        match self.accounts.entry(account.id) {
            Entry::Occupied(mut entry) => {
                saved.version = entry.get().version + 1;
                entry.insert(saved);
            }
            Entry::Vacant(entry) => {
                entry.insert(saved);
            }
        }
        Ok(())
    }

    async fn transaction_exists(&self, id: TransactionId) -> Result<bool, LedgerError> {
        Ok(self.transactions.contains_key(&id))
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.transactions.get(&id).map(|t| t.value().clone()))
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        // Entry API for atomic check-and-insert: first writer wins.
        match self.transactions.entry(transaction.id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateTransaction(transaction.id)),
            Entry::Vacant(entry) => {
                entry.insert(transaction.clone());
                self.journal.lock().push(transaction.id);
                Ok(())
            }
        }
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        match self.transactions.get_mut(&transaction.id) {
            Some(mut slot) => {
                *slot = transaction.clone();
                Ok(())
            }
            None => Err(LedgerError::Store(format!(
                "transaction {} not found for update",
                transaction.id
            ))),
        }
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.accounts.iter().map(|a| a.value().clone()).collect())
    }

    async fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let ids = self.journal.lock().clone();
        Ok(ids
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|t| t.value().clone()))
            .collect())
    }
}
