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

//! Process-wide transaction metrics.
//!
//! Counters live outside the transactional core and are updated with relaxed
//! atomics; readers take a point-in-time [`MetricsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of operation counters.
#[derive(Debug, Default)]
pub struct LedgerMetrics {
    deposits: AtomicU64,
    deposit_failures: AtomicU64,
    withdrawals: AtomicU64,
    withdrawal_failures: AtomicU64,
    insufficient_funds: AtomicU64,
    lock_conflicts: AtomicU64,
    replays: AtomicU64,
    balance_drift: AtomicU64,
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&self) {
        self.deposits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deposit_failure(&self) {
        self.deposit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_withdrawal(&self) {
        self.withdrawals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_withdrawal_failure(&self) {
        self.withdrawal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insufficient_funds(&self) {
        self.insufficient_funds.fetch_add(1, Ordering::Relaxed);
        self.withdrawal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_conflict(&self) {
        self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_balance_drift(&self) {
        self.balance_drift.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deposits: self.deposits.load(Ordering::Relaxed),
            deposit_failures: self.deposit_failures.load(Ordering::Relaxed),
            withdrawals: self.withdrawals.load(Ordering::Relaxed),
            withdrawal_failures: self.withdrawal_failures.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
            lock_conflicts: self.lock_conflicts.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            balance_drift: self.balance_drift.load(Ordering::Relaxed),
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.deposits.store(0, Ordering::Relaxed);
        self.deposit_failures.store(0, Ordering::Relaxed);
        self.withdrawals.store(0, Ordering::Relaxed);
        self.withdrawal_failures.store(0, Ordering::Relaxed);
        self.insufficient_funds.store(0, Ordering::Relaxed);
        self.lock_conflicts.store(0, Ordering::Relaxed);
        self.replays.store(0, Ordering::Relaxed);
        self.balance_drift.store(0, Ordering::Relaxed);
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deposits: u64,
    pub deposit_failures: u64,
    pub withdrawals: u64,
    pub withdrawal_failures: u64,
    pub insufficient_funds: u64,
    pub lock_conflicts: u64,
    pub replays: u64,
    pub balance_drift: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = LedgerMetrics::new();
        metrics.record_deposit();
        metrics.record_deposit();
        metrics.record_withdrawal();
        metrics.record_insufficient_funds();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deposits, 2);
        assert_eq!(snapshot.withdrawals, 1);
        assert_eq!(snapshot.insufficient_funds, 1);
        // An insufficient-funds rejection is also a withdrawal failure
        assert_eq!(snapshot.withdrawal_failures, 1);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = LedgerMetrics::new();
        metrics.record_deposit();
        metrics.record_lock_conflict();
        metrics.record_balance_drift();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
