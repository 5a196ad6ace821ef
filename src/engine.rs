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

//! Transaction processing engine.
//!
//! The [`Engine`] is the central component that processes deposit and
//! withdrawal requests against a [`LedgerStore`]. Every request carries a
//! caller-supplied transaction id, and the engine guarantees at most one
//! balance effect per id: duplicates are answered from the recorded outcome.
//!
//! # Request Processing
//!
//! 1. Parse the text request into strict types (no state touched on failure).
//! 2. Idempotency guard: an already-recorded id short-circuits to a replay.
//! 3. Record a `Pending` transaction, mutate the balance, flip the record to
//!    its terminal status.
//!
//! Deposits credit through the store's atomic increment; addition commutes,
//! so no upfront lock is needed. Withdrawals read the account under its
//! exclusive lock because the sufficiency check and the debit must be
//! observed together, and the lock acquisition is retried with backoff when
//! contention surfaces as a conflict.
//!
//! # Thread Safety
//!
//! The engine owns no mutable state of its own; any number of tasks may call
//! it concurrently. Withdrawals on one account serialize on the store's
//! per-account lock, everything else runs in parallel.

use crate::base::AccountId;
use crate::error::LedgerError;
use crate::metrics::LedgerMetrics;
use crate::request::{
    DepositReceipt, Outcome, ReportedBalance, TransactionRequest, ValidatedRequest,
    WithdrawalReceipt,
};
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Transaction processing engine.
///
/// # Errors
///
/// | Error | Raised when |
/// |-------|-------------|
/// | [`LedgerError::InvalidFormat`] | a request field is not numeric text |
/// | [`LedgerError::InvalidTransaction`] | the amount is zero or negative |
/// | [`LedgerError::AccountNotFound`] | a withdrawal names an unknown account |
/// | [`LedgerError::LockConflict`] | the account lock stayed contended through every retry |
///
/// Insufficient funds is not on this list: it is a business outcome and comes
/// back as a `failed` receipt, never as an error.
pub struct Engine<S> {
    store: Arc<S>,
    retry: RetryPolicy,
    metrics: Arc<LedgerMetrics>,
}

impl<S: LedgerStore> Engine<S> {
    /// Creates an engine with the default retry policy.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            metrics: Arc::new(LedgerMetrics::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<LedgerMetrics> {
        &self.metrics
    }

    /// Processes a deposit request.
    ///
    /// Unknown accounts are created with a zero balance. A replayed
    /// transaction id returns the recorded outcome without touching the
    /// balance again.
    pub async fn deposit(
        &self,
        request: &TransactionRequest,
    ) -> Result<DepositReceipt, LedgerError> {
        let started = Instant::now();
        let req = request.validate()?;

        if let Some(stored) = self.store.get_transaction(req.transaction_id).await? {
            return self.replay_deposit(&stored).await;
        }

        let account = self.store.get_or_create_account(req.account_id).await?;

        let mut tx = Transaction::pending(
            req.transaction_id,
            account.id,
            req.amount,
            TransactionKind::Deposit,
        );
        match self.store.create_transaction(&tx).await {
            Ok(()) => {}
            Err(LedgerError::DuplicateTransaction(_)) => {
                // Lost the insert race to a concurrent duplicate; answer from
                // the record that won.
                let stored = self.require_transaction(&req).await?;
                return self.replay_deposit(&stored).await;
            }
            Err(err) => return Err(err),
        }

        match self.store.apply_credit(req.account_id, req.amount).await {
            Ok(new_balance) => {
                tx.complete(new_balance);
                self.store.update_transaction(&tx).await?;
                self.metrics.record_deposit();
                info!(
                    operation = "deposit",
                    status = "completed",
                    transaction_id = %req.transaction_id,
                    account_id = %req.account_id,
                    amount = %req.amount,
                    new_balance = %new_balance,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "deposit applied"
                );
                Ok(DepositReceipt {
                    transaction_id: req.transaction_id,
                    account_id: req.account_id,
                    new_balance: ReportedBalance::Known(new_balance),
                    status: Outcome::Completed,
                })
            }
            Err(err) => {
                self.record_failure(&mut tx, &err).await;
                self.metrics.record_deposit_failure();
                error!(
                    operation = "deposit",
                    status = "failed",
                    transaction_id = %req.transaction_id,
                    account_id = %req.account_id,
                    amount = %req.amount,
                    reason = %err,
                    "deposit failed"
                );
                Err(err)
            }
        }
    }

    /// Processes a withdrawal request, retrying lock conflicts with backoff.
    ///
    /// Only the locking mechanism is retried; an insufficient-funds rejection
    /// is terminal and comes back as a `failed` receipt on the first pass.
    pub async fn withdraw(
        &self,
        request: &TransactionRequest,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        let req = request.validate()?;

        let mut attempt = 1u32;
        loop {
            match self.withdraw_once(&req).await {
                Err(err) if self.retry.retries(&err) => {
                    self.metrics.record_lock_conflict();
                    if attempt >= self.retry.max_attempts {
                        error!(
                            operation = "withdrawal",
                            status = "failed",
                            transaction_id = %req.transaction_id,
                            account_id = %req.account_id,
                            attempts = attempt,
                            reason = %err,
                            "withdrawal abandoned, lock stayed contended"
                        );
                        return Err(err);
                    }
                    warn!(
                        operation = "withdrawal",
                        status = "retry",
                        transaction_id = %req.transaction_id,
                        account_id = %req.account_id,
                        attempt,
                        "lock conflict, backing off"
                    );
                    sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn withdraw_once(
        &self,
        req: &ValidatedRequest,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        let started = Instant::now();

        if let Some(stored) = self.store.get_transaction(req.transaction_id).await? {
            return self.replay_withdrawal(&stored).await;
        }

        // Exclusive lock before the balance is read: two concurrent
        // withdrawals must not both observe a stale sufficient-funds view.
        let Some(locked) = self.store.get_account_locked(req.account_id).await? else {
            warn!(
                operation = "withdrawal",
                status = "rejected",
                transaction_id = %req.transaction_id,
                account_id = %req.account_id,
                reason = "account not found",
                "withdrawal rejected"
            );
            return Err(LedgerError::AccountNotFound(req.account_id));
        };
        let mut account = locked.account.clone();

        let mut tx = Transaction::pending(
            req.transaction_id,
            account.id,
            req.amount,
            TransactionKind::Withdrawal,
        );
        match self.store.create_transaction(&tx).await {
            Ok(()) => {}
            Err(LedgerError::DuplicateTransaction(_)) => {
                let stored = self.require_transaction(req).await?;
                return self.replay_withdrawal(&stored).await;
            }
            Err(err) => return Err(err),
        }

        if account.balance < req.amount {
            tx.fail("Insufficient funds");
            self.store.update_transaction(&tx).await?;
            self.metrics.record_insufficient_funds();
            warn!(
                operation = "withdrawal",
                status = "failed",
                transaction_id = %req.transaction_id,
                account_id = %req.account_id,
                requested = %req.amount,
                balance = %account.balance,
                reason = "Insufficient funds",
                "withdrawal rejected"
            );
            return Ok(WithdrawalReceipt {
                transaction_id: req.transaction_id,
                account_id: req.account_id,
                current_balance: ReportedBalance::Known(account.balance),
                requested_amount: req.amount,
                status: Outcome::Failed,
            });
        }

        let new_balance = match account.debit(req.amount) {
            Ok(balance) => balance,
            Err(err) => {
                self.record_failure(&mut tx, &err).await;
                self.metrics.record_withdrawal_failure();
                error!(
                    operation = "withdrawal",
                    status = "failed",
                    transaction_id = %req.transaction_id,
                    account_id = %req.account_id,
                    reason = %err,
                    "withdrawal failed"
                );
                return Err(err);
            }
        };
        if let Err(err) = self.store.save_account(&account).await {
            self.record_failure(&mut tx, &err).await;
            self.metrics.record_withdrawal_failure();
            error!(
                operation = "withdrawal",
                status = "failed",
                transaction_id = %req.transaction_id,
                account_id = %req.account_id,
                reason = %err,
                "withdrawal failed"
            );
            return Err(err);
        }

        tx.complete(new_balance);
        self.store.update_transaction(&tx).await?;
        self.metrics.record_withdrawal();
        info!(
            operation = "withdrawal",
            status = "completed",
            transaction_id = %req.transaction_id,
            account_id = %req.account_id,
            amount = %req.amount,
            new_balance = %new_balance,
            duration_ms = started.elapsed().as_millis() as u64,
            "withdrawal applied"
        );
        Ok(WithdrawalReceipt {
            transaction_id: req.transaction_id,
            account_id: req.account_id,
            current_balance: ReportedBalance::Known(new_balance),
            requested_amount: req.amount,
            status: Outcome::Completed,
        })
    }

    /// Rebuilds a deposit receipt from an already-recorded transaction.
    async fn replay_deposit(&self, stored: &Transaction) -> Result<DepositReceipt, LedgerError> {
        self.metrics.record_replay();
        info!(
            operation = "deposit",
            status = "replay",
            transaction_id = %stored.id,
            stored_status = ?stored.status,
            "duplicate transaction id, returning recorded outcome"
        );
        let receipt = match stored.status {
            // The recorded resulting balance makes the replay identical to
            // the original receipt even after later mutations
            TransactionStatus::Completed => DepositReceipt {
                transaction_id: stored.id,
                account_id: stored.account_id,
                new_balance: match stored.balance_after {
                    Some(balance) => ReportedBalance::Known(balance),
                    None => self.current_balance(stored.account_id).await?,
                },
                status: Outcome::Completed,
            },
            TransactionStatus::Failed => DepositReceipt {
                transaction_id: stored.id,
                account_id: stored.account_id,
                new_balance: self.current_balance(stored.account_id).await?,
                status: Outcome::Failed,
            },
            // Mid-flight (or crashed mid-flight): the balance is not knowable
            TransactionStatus::Pending => DepositReceipt {
                transaction_id: stored.id,
                account_id: stored.account_id,
                new_balance: ReportedBalance::Unknown,
                status: Outcome::Pending,
            },
        };
        Ok(receipt)
    }

    /// Rebuilds a withdrawal receipt from an already-recorded transaction.
    async fn replay_withdrawal(
        &self,
        stored: &Transaction,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        self.metrics.record_replay();
        info!(
            operation = "withdrawal",
            status = "replay",
            transaction_id = %stored.id,
            stored_status = ?stored.status,
            "duplicate transaction id, returning recorded outcome"
        );
        let (current_balance, status) = match stored.status {
            TransactionStatus::Completed => (
                match stored.balance_after {
                    Some(balance) => ReportedBalance::Known(balance),
                    None => self.current_balance(stored.account_id).await?,
                },
                Outcome::Completed,
            ),
            TransactionStatus::Failed => (
                self.current_balance(stored.account_id).await?,
                Outcome::Failed,
            ),
            TransactionStatus::Pending => (ReportedBalance::Unknown, Outcome::Pending),
        };
        Ok(WithdrawalReceipt {
            transaction_id: stored.id,
            account_id: stored.account_id,
            current_balance,
            requested_amount: stored.amount,
            status,
        })
    }

    async fn current_balance(&self, id: AccountId) -> Result<ReportedBalance, LedgerError> {
        Ok(self
            .store
            .get_account(id)
            .await?
            .map(|account| ReportedBalance::Known(account.balance))
            .unwrap_or(ReportedBalance::Unknown))
    }

    async fn require_transaction(
        &self,
        req: &ValidatedRequest,
    ) -> Result<Transaction, LedgerError> {
        self.store
            .get_transaction(req.transaction_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Store(format!("transaction {} vanished", req.transaction_id))
            })
    }

    /// Flips the transaction to `Failed` before the error is re-raised, so no
    /// row is left observably `Pending` by a caught failure.
    async fn record_failure(&self, tx: &mut Transaction, err: &LedgerError) {
        tx.fail(err.to_string());
        if let Err(save_err) = self.store.update_transaction(tx).await {
            error!(
                transaction_id = %tx.id,
                error = %save_err,
                "failed to record FAILED status"
            );
        }
    }
}
