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

//! Balance reconciliation against transaction history.
//!
//! The reconciler recomputes every account's balance from its completed
//! transactions and compares it with the stored value, using exact decimal
//! equality. It reads without taking account locks, so a transaction in
//! flight can show up as a transient mismatch: this is an approximate,
//! eventually-consistent auditor, not a correctness gate.
//!
//! Mismatches are reported and counted, never auto-corrected: silently
//! rewriting the stored balance could mask a live concurrency bug.

use crate::base::AccountId;
use crate::error::LedgerError;
use crate::metrics::LedgerMetrics;
use crate::store::LedgerStore;
use crate::transaction::{TransactionKind, TransactionStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default spacing between periodic checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Result of checking one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationEntry {
    pub account_id: AccountId,
    pub stored: Decimal,
    pub computed: Decimal,
    pub consistent: bool,
}

/// Result of one full reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub entries: Vec<ReconciliationEntry>,
    pub consistent: usize,
    pub inconsistent: usize,
    /// Accounts that could not be checked this pass.
    pub skipped: usize,
}

impl ReconciliationReport {
    /// Entries whose stored balance disagrees with the history.
    pub fn drifted(&self) -> impl Iterator<Item = &ReconciliationEntry> {
        self.entries.iter().filter(|entry| !entry.consistent)
    }
}

/// Periodic balance auditor.
pub struct Reconciler<S> {
    store: Arc<S>,
    metrics: Arc<LedgerMetrics>,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(store: Arc<S>, metrics: Arc<LedgerMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Checks every account once.
    ///
    /// A store failure for one account skips that account only; a failure
    /// listing the accounts aborts the pass with an empty report.
    pub async fn check_all(&self) -> ReconciliationReport {
        let started = Instant::now();
        let accounts = match self.store.all_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(
                    operation = "balance_check",
                    status = "error",
                    reason = %err,
                    "balance check aborted, could not list accounts"
                );
                return ReconciliationReport::default();
            }
        };

        let mut report = ReconciliationReport::default();
        for account in accounts {
            match self.computed_balance(account.id).await {
                Ok(computed) => {
                    // Exact decimal comparison, both sides in the same
                    // fixed-precision representation
                    let consistent = computed == account.balance;
                    if consistent {
                        report.consistent += 1;
                        debug!(
                            operation = "balance_check",
                            status = "consistent",
                            account_id = %account.id,
                            balance = %account.balance,
                        );
                    } else {
                        report.inconsistent += 1;
                        self.metrics.record_balance_drift();
                        warn!(
                            operation = "balance_check",
                            status = "inconsistent",
                            account_id = %account.id,
                            stored = %account.balance,
                            computed = %computed,
                            "balance drift detected"
                        );
                    }
                    report.entries.push(ReconciliationEntry {
                        account_id: account.id,
                        stored: account.balance,
                        computed,
                        consistent,
                    });
                }
                Err(err) => {
                    report.skipped += 1;
                    error!(
                        operation = "balance_check",
                        status = "error",
                        account_id = %account.id,
                        reason = %err,
                        "skipping account"
                    );
                }
            }
        }

        info!(
            operation = "balance_check",
            consistent = report.consistent,
            inconsistent = report.inconsistent,
            skipped = report.skipped,
            duration_ms = started.elapsed().as_millis() as u64,
            "balance verification completed"
        );
        report
    }

    /// `sum(completed deposits) - sum(completed withdrawals)` for one account.
    async fn computed_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        let transactions = self.store.all_transactions().await?;
        let mut balance = Decimal::ZERO;
        for tx in transactions
            .iter()
            .filter(|tx| tx.account_id == id && tx.status == TransactionStatus::Completed)
        {
            match tx.kind {
                TransactionKind::Deposit => balance += tx.amount,
                TransactionKind::Withdrawal => balance -= tx.amount,
            }
        }
        Ok(balance)
    }

    /// Drives [`check_all`](Self::check_all) forever on a fixed interval.
    ///
    /// For deployments without an external scheduler. The first pass runs
    /// immediately, then every `every`.
    pub async fn run(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.check_all().await;
        }
    }
}
